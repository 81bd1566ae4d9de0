use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use galatea::application::{
    chrome::{ChromeCodes, ChromeService},
    cms::CmsService,
    pool::{Condition, ObjectPool, PoolError, Query, Record, RecordId},
    sitemap::SitemapService,
    thumbnails::{ThumbnailConfig, ThumbnailService},
};
use galatea::domain::{
    locale::{Language, LocalePolicy},
    thumbnail::{Quality, SourceId},
    visitor::PricePolicy,
};
use galatea::infra::{
    http::{GuestSessions, HttpState, build_router},
    media::MediaCache,
};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const PLACEHOLDER: &str = "/static/images/no-image.png";

#[derive(Default)]
struct MemoryPool {
    rows: Vec<(&'static str, Value)>,
    languages: Mutex<Vec<Option<String>>>,
}

impl MemoryPool {
    fn with(mut self, model: &'static str, row: Value) -> Self {
        self.rows.push((model, row));
        self
    }

    fn matching(&self, model: &str, query: &Query) -> Vec<Record> {
        self.languages
            .lock()
            .expect("languages lock")
            .push(query.language.clone());
        let mut rows: Vec<Record> = self
            .rows
            .iter()
            .filter(|(name, _)| *name == model)
            .map(|(_, row)| Record::from_value(row.clone()).expect("object row"))
            .filter(|record| query.domain.iter().all(|cond| matches(record, cond)))
            .collect();
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        rows
    }
}

fn matches(record: &Record, condition: &Condition) -> bool {
    let actual = record.get(&condition.field).cloned().unwrap_or(Value::Null);
    match condition.operator {
        "=" => actual == condition.value,
        "in" => condition
            .value
            .as_array()
            .is_some_and(|values| values.contains(&actual)),
        _ => false,
    }
}

#[async_trait]
impl ObjectPool for MemoryPool {
    async fn search(&self, model: &str, query: &Query) -> Result<Vec<RecordId>, PoolError> {
        Ok(self
            .matching(model, query)
            .iter()
            .filter_map(Record::id)
            .collect())
    }

    async fn search_read(
        &self,
        model: &str,
        query: &Query,
        _fields: &[&str],
    ) -> Result<Vec<Record>, PoolError> {
        Ok(self.matching(model, query))
    }
}

struct UnreachablePool;

#[async_trait]
impl ObjectPool for UnreachablePool {
    async fn search(&self, _model: &str, _query: &Query) -> Result<Vec<RecordId>, PoolError> {
        Err(PoolError::Transport("connection refused".to_string()))
    }

    async fn search_read(
        &self,
        _model: &str,
        _query: &Query,
        _fields: &[&str],
    ) -> Result<Vec<Record>, PoolError> {
        Err(PoolError::Transport("connection refused".to_string()))
    }
}

fn shop_pool() -> MemoryPool {
    MemoryPool::default()
        .with("galatea.cms.menu", json!({"id": 1, "code": "main", "parent": null, "name": "Main"}))
        .with("galatea.cms.menu", json!({"id": 2, "parent": 1, "name": "Shop", "slug": "shop", "sequence": 1}))
        .with("galatea.cms.menu", json!({"id": 3, "parent": 1, "name": "Staff", "slug": "staff", "manager": true}))
        .with("galatea.cms.article", json!({"id": 1, "slug": "hello", "active": true}))
        .with("galatea.cms.article", json!({"id": 2, "slug": "draft", "active": false}))
}

struct Harness {
    _root: TempDir,
    router: Router,
    thumbnails: ThumbnailService,
}

fn harness(pool: Arc<dyn ObjectPool>) -> Harness {
    let root = TempDir::new().expect("tempdir");
    let lang = |tag| Language::from_tag(tag).expect("valid tag");
    let locales = Arc::new(LocalePolicy::new(lang("en_US"), vec![lang("es_ES")]));

    let codes = ChromeCodes {
        main_menu: "main".to_string(),
        ..Default::default()
    };
    let chrome = ChromeService::new(CmsService::new(pool.clone()), PricePolicy::default(), codes);
    let sitemap = SitemapService::new(pool, locales.clone(), "http://shop.test");
    let thumbnails = ThumbnailService::new(ThumbnailConfig {
        source_root: root.path().join("store"),
        cache_dir: root.path().join("cache"),
        cache_url: "/media/cache".to_string(),
        placeholder_url: PLACEHOLDER.to_string(),
        default_quality: Quality::default(),
        max_dimension: 1024,
    })
    .expect("cache dir");
    let media = MediaCache::new(root.path().join("cache"));

    let router = build_router(HttpState {
        chrome: Arc::new(chrome),
        sitemap: Arc::new(sitemap),
        thumbnails: thumbnails.clone(),
        media: Arc::new(media),
        locales,
        sessions: Arc::new(GuestSessions),
        site_title: Arc::from("Galatea Shop"),
    });

    Harness {
        _root: root,
        router,
        thumbnails,
    }
}

async fn get(router: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .expect("ascii location")
}

#[tokio::test]
async fn root_renders_home_in_default_language() {
    let h = harness(Arc::new(shop_pool()));

    let response = get(&h.router, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<html lang=\"en\">"));
    assert!(html.contains("href=\"/en/shop\""));
    assert!(!html.contains("staff"), "manager-only entries stay hidden");
    assert!(html.contains("Galatea Shop"));
}

#[tokio::test]
async fn language_prefix_selects_backend_context() {
    let pool = Arc::new(shop_pool());
    let h = harness(pool.clone());

    for uri in ["/es/", "/es"] {
        let response = get(&h.router, uri).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let html = body_text(response).await;
        assert!(html.contains("<html lang=\"es\">"));
        assert!(html.contains("href=\"/es/shop\""));
    }

    let languages = pool.languages.lock().expect("languages lock");
    assert!(!languages.is_empty());
    assert!(
        languages
            .iter()
            .all(|language| language.as_deref() == Some("es_ES"))
    );
}

#[tokio::test]
async fn unknown_language_and_paths_render_not_found() {
    let h = harness(Arc::new(shop_pool()));

    for uri in ["/fr/", "/fr", "/es/article/missing/extra"] {
        let response = get(&h.router, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert!(body_text(response).await.contains("Page Not Found"));
    }
}

#[tokio::test]
async fn backend_failures_render_the_error_page() {
    let h = harness(Arc::new(UnreachablePool));

    let response = get(&h.router, "/").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("Something Went Wrong"));
}

#[tokio::test]
async fn sitemap_lists_homes_and_active_articles() {
    let h = harness(Arc::new(shop_pool()));

    let response = get(&h.router, "/sitemap.xml").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).expect("content type"),
        "application/xml"
    );
    let xml = body_text(response).await;
    assert!(xml.contains("<loc>http://shop.test/en/</loc>"));
    assert!(xml.contains("<loc>http://shop.test/es/</loc>"));
    assert!(xml.contains("<loc>http://shop.test/en/article/hello</loc>"));
    assert!(xml.contains("<loc>http://shop.test/es/article/hello</loc>"));
    assert!(!xml.contains("draft"));
}

#[tokio::test]
async fn robots_points_at_the_sitemap() {
    let h = harness(Arc::new(shop_pool()));

    let response = get(&h.router, "/robots.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("User-agent: *"));
    assert!(body.contains("Sitemap: http://shop.test/sitemap.xml"));
}

#[tokio::test]
async fn cached_media_is_served_and_traversal_rejected() {
    let h = harness(Arc::new(shop_pool()));
    fs::write(h.thumbnails.artifact_path("logo_10x10.png"), b"png-bytes").expect("artifact");

    let response = get(&h.router, "/media/cache/logo_10x10.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).expect("content type"),
        "image/png"
    );
    assert_eq!(body_text(response).await, "png-bytes");

    let missing = get(&h.router, "/media/cache/nothing.png").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let traversal = get(&h.router, "/media/cache/..%2F..%2Fetc%2Fpasswd").await;
    assert_eq!(traversal.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn thumbnail_route_redirects_to_rendered_artifact() {
    let h = harness(Arc::new(shop_pool()));
    let source = SourceId::parse("ab12cd34ef")
        .expect("valid id")
        .store_path(&h.thumbnails.config().source_root);
    fs::create_dir_all(source.parent().expect("parent")).expect("store dirs");
    DynamicImage::ImageRgba8(RgbaImage::new(40, 20))
        .save_with_format(&source, ImageFormat::Png)
        .expect("source written");

    let response = get(&h.router, "/media/thumbnail/ab12cd34ef/photo.png?size=10x10&crop=fit").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/media/cache/photo_10x10_fit.png");

    let artifact = get(&h.router, "/media/cache/photo_10x10_fit.png").await;
    assert_eq!(artifact.status(), StatusCode::OK);
}

#[tokio::test]
async fn thumbnail_route_uses_placeholder_for_missing_sources() {
    let h = harness(Arc::new(shop_pool()));

    let response = get(&h.router, "/media/thumbnail/ffff0000/photo.jpg?size=10x10").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), PLACEHOLDER);
}

#[tokio::test]
async fn thumbnail_route_rejects_malformed_parameters() {
    let h = harness(Arc::new(shop_pool()));

    for uri in [
        "/media/thumbnail/ab12cd34ef/photo.jpg",
        "/media/thumbnail/ab12cd34ef/photo.jpg?size=10by10",
        "/media/thumbnail/ab12cd34ef/photo.jpg?size=10x10&crop=stretch",
        "/media/thumbnail/ab12cd34ef/photo.jpg?size=10x10&quality=high",
        "/media/thumbnail/ab12cd34ef/photo.jpg?size=10x10&quality=101",
        "/media/thumbnail/ab12cd34ef/photo.jpg?size=5000x10",
        "/media/thumbnail/ab1/photo.jpg?size=10x10",
    ] {
        let response = get(&h.router, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}
