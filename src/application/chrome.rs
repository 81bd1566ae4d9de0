use tracing::debug;

use crate::application::cms::{CmsError, CmsService};
use crate::domain::carousel::Carousel;
use crate::domain::locale::Language;
use crate::domain::menu::MenuNode;
use crate::domain::visitor::{PricePolicy, Visitor};

/// CMS codes the layout pulls content from. Empty codes are skipped.
#[derive(Debug, Clone, Default)]
pub struct ChromeCodes {
    pub main_menu: String,
    pub footer_menu: String,
    pub catalog_menu: String,
    pub home_carousel: String,
    pub home_blocks: Vec<String>,
}

/// Everything the shared layout needs for one request.
#[derive(Debug, Clone)]
pub struct PageChrome {
    pub language: Language,
    pub main_menu: Vec<MenuNode>,
    pub footer_menu: Vec<MenuNode>,
    pub catalog_menu: Vec<MenuNode>,
    pub show_price: bool,
}

#[derive(Debug, Clone)]
pub struct HomeContent {
    pub chrome: PageChrome,
    pub carousel: Option<Carousel>,
    /// Rendered block HTML, in configuration order, empty blocks dropped.
    pub blocks: Vec<String>,
}

#[derive(Clone)]
pub struct ChromeService {
    cms: CmsService,
    prices: PricePolicy,
    codes: ChromeCodes,
}

impl ChromeService {
    pub fn new(cms: CmsService, prices: PricePolicy, codes: ChromeCodes) -> Self {
        Self { cms, prices, codes }
    }

    pub fn show_price(&self, visitor: &Visitor) -> bool {
        self.prices.shows_price(visitor)
    }

    pub async fn load(&self, visitor: &Visitor, language: &Language) -> Result<PageChrome, CmsError> {
        let (main_menu, footer_menu, catalog_menu) = tokio::try_join!(
            self.cms.menu(&self.codes.main_menu, visitor, language),
            self.cms.menu(&self.codes.footer_menu, visitor, language),
            self.cms.catalog_menu(&self.codes.catalog_menu, language),
        )?;

        Ok(PageChrome {
            language: language.clone(),
            main_menu,
            footer_menu,
            catalog_menu,
            show_price: self.show_price(visitor),
        })
    }

    pub async fn home(&self, visitor: &Visitor, language: &Language) -> Result<HomeContent, CmsError> {
        let chrome = self.load(visitor, language).await?;
        let carousel = self
            .cms
            .carousel(&self.codes.home_carousel, language)
            .await?
            .filter(|carousel| !carousel.is_empty());

        let mut blocks = Vec::with_capacity(self.codes.home_blocks.len());
        for code in &self.codes.home_blocks {
            let html = self.cms.block_html(code, language).await?;
            if html.is_empty() {
                debug!(target = "galatea::chrome", code = %code, "home block is empty");
                continue;
            }
            blocks.push(html);
        }

        Ok(HomeContent {
            chrome,
            carousel,
            blocks,
        })
    }
}
