//! Sitemap service for sitemap.xml and robots.txt generation.

use std::sync::Arc;

use thiserror::Error;

use crate::application::pool::{Condition, Direction, ObjectPool, PoolError, Query};
use crate::domain::locale::LocalePolicy;
use crate::util::html::escape;

const ARTICLE: &str = "galatea.cms.article";

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("failed to list articles: {0}")]
    Articles(#[from] PoolError),
}

#[derive(Clone)]
pub struct SitemapService {
    pool: Arc<dyn ObjectPool>,
    locales: Arc<LocalePolicy>,
    base_url: String,
}

impl SitemapService {
    pub fn new(pool: Arc<dyn ObjectPool>, locales: Arc<LocalePolicy>, base_url: &str) -> Self {
        Self {
            pool,
            locales,
            base_url: normalize_public_site_url(base_url),
        }
    }

    /// Home page per language, then every active article per language.
    pub async fn sitemap_xml(&self) -> Result<String, SitemapError> {
        let mut entries = Vec::new();

        for language in self.locales.accepted() {
            entries.push(sitemap_entry(&self.base_url, &format!("/{}/", language.code())));
        }

        for language in self.locales.accepted() {
            let query = Query::filter(Condition::eq("active", true))
                .order_by("id", Direction::Asc)
                .in_language(language.tag());
            let articles = self.pool.search_read(ARTICLE, &query, &["slug"]).await?;
            for article in &articles {
                if let Some(slug) = article.str("slug") {
                    entries.push(sitemap_entry(
                        &self.base_url,
                        &format!("/{}/article/{slug}", language.code()),
                    ));
                }
            }
        }

        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
        );
        for entry in entries {
            xml.push_str(&entry);
        }
        xml.push_str("</urlset>\n");
        Ok(xml)
    }

    pub fn robots_txt(&self) -> String {
        let sitemap_url = format!("{}sitemap.xml", self.base_url);
        format!("User-agent: *\nAllow: /\nSitemap: {sitemap_url}\n")
    }
}

fn normalize_public_site_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    format!("{trimmed}/")
}

fn sitemap_entry(base: &str, path: &str) -> String {
    let loc = format!("{}{path}", base.trim_end_matches('/'));
    format!("  <url><loc>{}</loc></url>\n", escape(&loc))
}
