//! CMS lookups for page chrome: menus, blocks and carousels.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::pool::{Condition, Direction, ObjectPool, PoolError, Query, Record, RecordId};
use crate::domain::block::{CmsBlock, ImageAttributes};
use crate::domain::carousel::{Carousel, CarouselItem};
use crate::domain::locale::Language;
use crate::domain::menu::{MenuEntry, MenuNode, MenuVisibility, build_tree};
use crate::domain::visitor::Visitor;

const CMS_MENU: &str = "galatea.cms.menu";
const CATALOG_MENU: &str = "esale.catalog.menu";
const CMS_BLOCK: &str = "galatea.cms.block";
const STATIC_FILE: &str = "galatea.static.file";
const CMS_CAROUSEL: &str = "galatea.cms.carousel";
const CMS_CAROUSEL_ITEM: &str = "galatea.cms.carousel.item";

const MENU_FIELDS: &[&str] = &["id", "parent", "name", "slug", "login", "manager"];
const BLOCK_FIELDS: &[&str] = &[
    "type",
    "file",
    "remote_image_url",
    "custom_code",
    "height",
    "width",
    "alternative_text",
    "click_url",
];

#[derive(Debug, Error)]
pub enum CmsError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("{model} record is missing `{field}`")]
    Incomplete {
        model: &'static str,
        field: &'static str,
    },
}

#[derive(Clone)]
pub struct CmsService {
    pool: Arc<dyn ObjectPool>,
}

impl CmsService {
    pub fn new(pool: Arc<dyn ObjectPool>) -> Self {
        Self { pool }
    }

    /// Children of the CMS menu `code`, filtered for `visitor`.
    pub async fn menu(
        &self,
        code: &str,
        visitor: &Visitor,
        language: &Language,
    ) -> Result<Vec<MenuNode>, CmsError> {
        self.menu_tree(CMS_MENU, "code", code, MenuVisibility::For(*visitor), language)
            .await
    }

    /// Children of the catalogue menu `slug`. Catalogue menus are public.
    pub async fn catalog_menu(
        &self,
        slug: &str,
        language: &Language,
    ) -> Result<Vec<MenuNode>, CmsError> {
        self.menu_tree(CATALOG_MENU, "slug", slug, MenuVisibility::All, language)
            .await
    }

    async fn menu_tree(
        &self,
        model: &'static str,
        key: &str,
        value: &str,
        visibility: MenuVisibility,
        language: &Language,
    ) -> Result<Vec<MenuNode>, CmsError> {
        if value.is_empty() {
            return Ok(Vec::new());
        }

        let roots = self
            .pool
            .search(
                model,
                &Query::filter(Condition::eq(key, value))
                    .limit(1)
                    .in_language(language.tag()),
            )
            .await?;
        let Some(&root) = roots.first() else {
            debug!(target = "galatea::cms", model, key, value, "menu not found");
            return Ok(Vec::new());
        };

        let mut seen: HashSet<RecordId> = HashSet::from([root]);
        let mut frontier = vec![root];
        let mut entries = Vec::new();

        while !frontier.is_empty() {
            let query = Query::filter(Condition::within("parent", &frontier))
                .order_by("sequence", Direction::Asc)
                .in_language(language.tag());
            let records = self.pool.search_read(model, &query, MENU_FIELDS).await?;

            frontier = Vec::new();
            for record in records {
                let entry = menu_entry(model, &record)?;
                if seen.insert(entry.id) {
                    frontier.push(entry.id);
                    entries.push(entry);
                }
            }
        }

        Ok(build_tree(root, &entries, visibility))
    }

    /// The CMS block `code`, or `None` when it does not exist.
    pub async fn block(&self, code: &str, language: &Language) -> Result<Option<CmsBlock>, CmsError> {
        if code.is_empty() {
            return Ok(None);
        }

        let query = Query::filter(Condition::eq("code", code))
            .limit(1)
            .in_language(language.tag());
        let blocks = self.pool.search_read(CMS_BLOCK, &query, BLOCK_FIELDS).await?;
        let Some(record) = blocks.into_iter().next() else {
            debug!(target = "galatea::cms", code, "block not found");
            return Ok(None);
        };

        let attributes = ImageAttributes {
            alternative_text: record.text("alternative_text"),
            width: record.text("width"),
            height: record.text("height"),
            click_url: record.text("click_url"),
        };

        let block = match record.str("type") {
            Some("image") => {
                let file_url = match record.i64("file") {
                    Some(file) => self.static_file_url(file, language).await?,
                    None => None,
                };
                CmsBlock::Image {
                    file_url: file_url.unwrap_or_default(),
                    attributes,
                }
            }
            Some("remote_image") => CmsBlock::RemoteImage {
                url: record.text("remote_image_url").unwrap_or_default(),
                attributes,
            },
            Some("custom_code") => {
                CmsBlock::CustomCode(record.text("custom_code").unwrap_or_default())
            }
            other => {
                debug!(target = "galatea::cms", code, kind = ?other, "unsupported block type");
                return Ok(None);
            }
        };
        Ok(Some(block))
    }

    /// HTML for the block `code`; empty when there is none.
    pub async fn block_html(&self, code: &str, language: &Language) -> Result<String, CmsError> {
        Ok(self
            .block(code, language)
            .await?
            .map(|block| block.to_html())
            .unwrap_or_default())
    }

    async fn static_file_url(
        &self,
        file: RecordId,
        language: &Language,
    ) -> Result<Option<String>, CmsError> {
        let query = Query::filter(Condition::eq("id", file))
            .limit(1)
            .in_language(language.tag());
        let files = self.pool.search_read(STATIC_FILE, &query, &["url"]).await?;
        Ok(files.first().and_then(|record| record.text("url")))
    }

    /// The carousel `code` with its active items in sequence order.
    pub async fn carousel(
        &self,
        code: &str,
        language: &Language,
    ) -> Result<Option<Carousel>, CmsError> {
        if code.is_empty() {
            return Ok(None);
        }

        let query = Query::filter(Condition::eq("code", code))
            .limit(1)
            .in_language(language.tag());
        let carousels = self
            .pool
            .search_read(CMS_CAROUSEL, &query, &["id", "name", "code"])
            .await?;
        let Some(record) = carousels.into_iter().next() else {
            return Ok(None);
        };
        let id = record.id().ok_or(CmsError::Incomplete {
            model: CMS_CAROUSEL,
            field: "id",
        })?;

        let query = Query::filter(Condition::eq("carousel", id))
            .and(Condition::eq("active", true))
            .order_by("sequence", Direction::Asc)
            .in_language(language.tag());
        let items = self
            .pool
            .search_read(
                CMS_CAROUSEL_ITEM,
                &query,
                &["name", "link", "image", "description"],
            )
            .await?
            .iter()
            .map(|item| CarouselItem {
                name: item.text("name").unwrap_or_default(),
                link: item.text("link"),
                image: item.text("image"),
                description: item.text("description"),
            })
            .collect();

        Ok(Some(Carousel {
            code: code.to_string(),
            name: record.text("name").unwrap_or_default(),
            items,
        }))
    }
}

fn menu_entry(model: &'static str, record: &Record) -> Result<MenuEntry, CmsError> {
    let id = record
        .id()
        .ok_or(CmsError::Incomplete { model, field: "id" })?;
    Ok(MenuEntry {
        id,
        parent: record.i64("parent"),
        name: record.text("name").unwrap_or_default(),
        slug: record.text("slug").unwrap_or_default(),
        login: record.bool("login"),
        manager: record.bool("manager"),
    })
}
