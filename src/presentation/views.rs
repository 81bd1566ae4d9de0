use crate::application::chrome::{HomeContent, PageChrome};
use crate::application::error::{ErrorReport, HttpError};
use crate::domain::carousel::Carousel;
use crate::domain::locale::LocalePolicy;
use crate::domain::menu::{MenuNode, flatten};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use super::i18n::{UiStrings, catalogue};

/// Template-side names for the helpers in [`crate::presentation::filters`].
/// Filters producing markup are meant to be followed by `|safe`.
mod filters {
    use std::borrow::Borrow;
    use std::fmt::Display;

    use askama::{Result, Values};
    use time::{Date, PrimitiveDateTime};

    use crate::presentation::filters as helpers;

    #[askama::filter_fn]
    pub fn price<T: Borrow<f64>>(value: T, _: &dyn Values) -> Result<String> {
        Ok(helpers::price(*value.borrow()))
    }

    #[askama::filter_fn]
    pub fn quantity<T: Borrow<f64>>(value: T, _: &dyn Values) -> Result<String> {
        Ok(helpers::quantity(*value.borrow()))
    }

    #[askama::filter_fn]
    pub fn nl2br<T: Display>(text: T, _: &dyn Values) -> Result<String> {
        Ok(helpers::nl2br(&text.to_string()))
    }

    #[askama::filter_fn]
    pub fn state<T: Display>(key: T, _: &dyn Values, language: &str) -> Result<String> {
        Ok(helpers::state(&key.to_string(), language))
    }

    #[askama::filter_fn]
    pub fn video<T: Display>(url: T, _: &dyn Values) -> Result<String> {
        Ok(helpers::video(&url.to_string()))
    }

    #[askama::filter_fn]
    pub fn wikimarkup<T: Display>(text: T, _: &dyn Values, show_toc: bool) -> Result<String> {
        Ok(helpers::wikimarkup(&text.to_string(), show_toc))
    }

    #[askama::filter_fn]
    pub fn dateformat<T: Borrow<Date>>(
        value: T,
        _: &dyn Values,
        format: &str,
        language: &str,
    ) -> Result<String> {
        Ok(helpers::dateformat(*value.borrow(), format, language))
    }

    #[askama::filter_fn]
    pub fn datetimeformat<T: Borrow<PrimitiveDateTime>>(
        value: T,
        _: &dyn Values,
        format: &str,
        language: &str,
    ) -> Result<String> {
        Ok(helpers::datetimeformat(*value.borrow(), format, language))
    }

    /// `{{ source_id|thumbnail_path(name, "100x100") }}`, with optional crop
    /// and background; empty strings leave them out.
    #[askama::filter_fn]
    pub fn thumbnail_path<T: Display>(
        source_id: T,
        _: &dyn Values,
        display_name: &str,
        size: &str,
        #[optional("")] crop: &str,
        #[optional("")] background: &str,
    ) -> Result<String> {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        Ok(helpers::thumbnail_path(
            &source_id.to_string(),
            display_name,
            size,
            non_empty(crop).as_deref(),
            non_empty(background).as_deref(),
        ))
    }
}

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response() -> Response {
    let mut response = render_template_response(
        ErrorTemplate {
            view: ErrorPageView::not_found(),
        },
        StatusCode::NOT_FOUND,
    );
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

pub fn render_server_error_response() -> Response {
    let mut response = render_template_response(
        ErrorTemplate {
            view: ErrorPageView::server_error(),
        },
        StatusCode::INTERNAL_SERVER_ERROR,
    );
    ErrorReport::from_message(
        "presentation::views::render_server_error_response",
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct MenuItemView {
    pub depth: usize,
    pub label: String,
    pub href: String,
    pub has_children: bool,
}

#[derive(Clone)]
pub struct LanguageLinkView {
    pub code: String,
    pub href: String,
    pub is_active: bool,
}

/// Shared layout data: site title, language switcher and menus.
pub struct LayoutContext<T> {
    pub site_title: String,
    pub language: String,
    pub home_href: String,
    pub languages: Vec<LanguageLinkView>,
    pub main_menu: Vec<MenuItemView>,
    pub footer_menu: Vec<MenuItemView>,
    pub catalog_menu: Vec<MenuItemView>,
    pub show_price: bool,
    pub ui: &'static UiStrings,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(site_title: &str, chrome: &PageChrome, locales: &LocalePolicy, content: T) -> Self {
        let code = chrome.language.code();
        let languages = locales
            .accepted()
            .iter()
            .map(|language| LanguageLinkView {
                code: language.code().to_string(),
                href: format!("/{}/", language.code()),
                is_active: language.code() == code,
            })
            .collect();

        Self {
            site_title: site_title.to_string(),
            language: code.to_string(),
            home_href: format!("/{code}/"),
            languages,
            main_menu: menu_items(code, "", &chrome.main_menu),
            footer_menu: menu_items(code, "", &chrome.footer_menu),
            catalog_menu: menu_items(code, "catalog/", &chrome.catalog_menu),
            show_price: chrome.show_price,
            ui: &catalogue(code).ui,
            content,
        }
    }
}

fn menu_items(code: &str, section: &str, nodes: &[MenuNode]) -> Vec<MenuItemView> {
    flatten(nodes)
        .into_iter()
        .map(|item| MenuItemView {
            depth: item.depth,
            href: menu_href(code, section, &item.slug),
            label: item.name,
            has_children: item.has_children,
        })
        .collect()
}

/// Absolute and already-rooted slugs are used verbatim; the rest live under the language.
fn menu_href(code: &str, section: &str, slug: &str) -> String {
    let slug = slug.trim();
    if slug.starts_with('/') || slug.starts_with("http://") || slug.starts_with("https://") {
        slug.to_string()
    } else if slug.is_empty() {
        format!("/{code}/")
    } else {
        format!("/{code}/{section}{slug}")
    }
}

pub struct CarouselItemView {
    pub name: String,
    pub link: Option<String>,
    pub image: Option<String>,
    /// Wiki markup, rendered by the template.
    pub description: String,
}

pub struct CarouselView {
    pub code: String,
    pub name: String,
    pub items: Vec<CarouselItemView>,
}

impl From<Carousel> for CarouselView {
    fn from(carousel: Carousel) -> Self {
        let items = carousel
            .items
            .into_iter()
            .map(|item| CarouselItemView {
                description: item.description.unwrap_or_default(),
                name: item.name,
                link: item.link,
                image: item.image,
            })
            .collect();

        Self {
            code: carousel.code,
            name: carousel.name,
            items,
        }
    }
}

pub struct HomeView {
    pub carousel: Option<CarouselView>,
    pub blocks: Vec<String>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<HomeView>,
}

impl IndexTemplate {
    pub fn new(site_title: &str, home: HomeContent, locales: &LocalePolicy) -> Self {
        let HomeContent {
            chrome,
            carousel,
            blocks,
        } = home;
        let content = HomeView {
            carousel: carousel.map(CarouselView::from),
            blocks,
        };
        Self {
            view: LayoutContext::new(site_title, &chrome, locales, content),
        }
    }
}

pub struct ErrorPageView {
    pub status: u16,
    pub title: String,
    pub message: String,
    pub action: ErrorAction,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        let ui = &catalogue("en").ui;
        Self {
            status: StatusCode::NOT_FOUND.as_u16(),
            title: ui.not_found_title.to_string(),
            message: ui.not_found_message.to_string(),
            action: ErrorAction::home(ui),
        }
    }

    pub fn server_error() -> Self {
        let ui = &catalogue("en").ui;
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            title: ui.server_error_title.to_string(),
            message: ui.server_error_message.to_string(),
            action: ErrorAction::home(ui),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home(ui: &UiStrings) -> Self {
        Self {
            href: "/".to_string(),
            label: ui.back_home.to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: ErrorPageView,
}
