use std::sync::Arc;

use axum::{
    Extension, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::error;

use crate::{
    application::{
        chrome::ChromeService,
        error::{AppError, HttpError},
        sitemap::SitemapService,
        thumbnails::{ThumbnailError, ThumbnailService},
    },
    domain::{
        locale::{Language, LocalePolicy},
        visitor::Visitor,
    },
    infra::media::{CachedMedia, MediaCache, MediaError},
    presentation::views::{IndexTemplate, render_not_found_response, render_template_response},
};

use super::middleware::{
    RequestLocale, SessionResolver, log_responses, resolve_locale, resolve_visitor,
    set_request_context,
};

#[derive(Clone)]
pub struct HttpState {
    pub chrome: Arc<ChromeService>,
    pub sitemap: Arc<SitemapService>,
    pub thumbnails: ThumbnailService,
    pub media: Arc<MediaCache>,
    pub locales: Arc<LocalePolicy>,
    pub sessions: Arc<dyn SessionResolver>,
    pub site_title: Arc<str>,
}

pub fn build_router(state: HttpState) -> Router {
    let locales = state.locales.clone();
    let sessions = state.sessions.clone();

    Router::new()
        .route("/", get(index))
        .route("/sitemap.xml", get(sitemap))
        .route("/robots.txt", get(robots_txt))
        .route("/media/cache/{filename}", get(serve_cached_media))
        .route(
            "/media/thumbnail/{source_id}/{display_name}",
            get(thumbnail_redirect),
        )
        .route("/{lang}", get(language_index))
        .route("/{lang}/", get(language_index))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(sessions, resolve_visitor))
        .layer(middleware::from_fn_with_state(locales, resolve_locale))
        .layer(middleware::from_fn(set_request_context))
}

async fn index(
    State(state): State<HttpState>,
    Extension(RequestLocale(language)): Extension<RequestLocale>,
    Extension(visitor): Extension<Visitor>,
) -> Response {
    render_home(&state, &visitor, &language).await
}

async fn language_index(
    State(state): State<HttpState>,
    Path(lang): Path<String>,
    Extension(visitor): Extension<Visitor>,
) -> Response {
    match state.locales.lookup(&lang) {
        Some(language) => render_home(&state, &visitor, language).await,
        None => AppError::NotFound.into_response(),
    }
}

async fn render_home(state: &HttpState, visitor: &Visitor, language: &Language) -> Response {
    match state.chrome.home(visitor, language).await {
        Ok(home) => render_template_response(
            IndexTemplate::new(&state.site_title, home, &state.locales),
            StatusCode::OK,
        ),
        Err(err) => AppError::from(err).into_response(),
    }
}

async fn fallback() -> Response {
    render_not_found_response()
}

async fn sitemap(State(state): State<HttpState>) -> Response {
    match state.sitemap.sitemap_xml().await {
        Ok(body) => xml_response(body, "application/xml"),
        Err(err) => HttpError::from_error(
            "infra::http::public::sitemap",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate sitemap",
            &err,
        )
        .into_response(),
    }
}

async fn robots_txt(State(state): State<HttpState>) -> Response {
    plain_response(state.sitemap.robots_txt())
}

async fn serve_cached_media(
    State(state): State<HttpState>,
    Path(filename): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_cached_media";

    match state.media.read(&filename).await {
        Ok(media) => build_media_response(media),
        Err(MediaError::InvalidPath | MediaError::NotFound) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            format!("no cached artifact named `{filename}`"),
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                filename = %filename,
                error = %err,
                "failed to read cached media"
            );
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read cached media",
                &err,
            )
            .into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThumbnailQuery {
    size: Option<String>,
    crop: Option<String>,
    bg: Option<String>,
    quality: Option<String>,
}

async fn thumbnail_redirect(
    State(state): State<HttpState>,
    Path((source_id, display_name)): Path<(String, String)>,
    Query(query): Query<ThumbnailQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::public::thumbnail_redirect";

    let Some(size) = query.size.as_deref() else {
        return HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid thumbnail parameters",
            "missing `size` parameter",
        )
        .into_response();
    };
    let quality = match query.quality.as_deref().map(str::parse::<u16>).transpose() {
        Ok(quality) => quality,
        Err(err) => {
            return HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid thumbnail parameters",
                &err,
            )
            .into_response();
        }
    };

    let request = match state.thumbnails.request(
        &source_id,
        &display_name,
        size,
        query.crop.as_deref(),
        query.bg.as_deref(),
        quality,
    ) {
        Ok(request) => request,
        Err(err) => return HttpError::from(err).into_response(),
    };

    match state.thumbnails.render(request).await {
        Ok(url) => see_other(&url),
        Err(ThumbnailError::Spec(err)) => HttpError::from(err).into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                source_id = %source_id,
                display_name = %display_name,
                error = %err,
                "thumbnail rendering failed; redirecting to placeholder"
            );
            see_other(&state.thumbnails.config().placeholder_url)
        }
    }
}

fn see_other(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = StatusCode::SEE_OTHER.into_response();
            response.headers_mut().insert(LOCATION, value);
            response
        }
        Err(err) => HttpError::from_error(
            "infra::http::public::see_other",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Invalid redirect target",
            &err,
        )
        .into_response(),
    }
}

fn build_media_response(media: CachedMedia) -> Response {
    let length = media.body.len();
    let mut response = Response::new(Body::from(media.body));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&media.content_type) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

fn xml_response(body: String, content_type: &str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn plain_response(body: String) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
