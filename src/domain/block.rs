//! CMS content blocks and their HTML rendering.

use crate::util::html::escape;

/// Presentation attributes shared by image-like blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageAttributes {
    pub alternative_text: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub click_url: Option<String>,
}

/// A block as configured in the CMS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmsBlock {
    /// Image stored in the backend's static file area.
    Image {
        file_url: String,
        attributes: ImageAttributes,
    },
    /// Image hosted elsewhere.
    RemoteImage {
        url: String,
        attributes: ImageAttributes,
    },
    /// Editor-supplied HTML, emitted verbatim.
    CustomCode(String),
}

impl CmsBlock {
    pub fn to_html(&self) -> String {
        match self {
            CmsBlock::Image {
                file_url,
                attributes,
            } => image_html(file_url, attributes),
            CmsBlock::RemoteImage { url, attributes } => image_html(url, attributes),
            CmsBlock::CustomCode(code) => code.clone(),
        }
    }
}

fn image_html(src: &str, attributes: &ImageAttributes) -> String {
    let field = |value: &Option<String>| escape(value.as_deref().unwrap_or_default());
    let image = format!(
        "<img src=\"{}\" alt=\"{}\" width=\"{}\" height=\"{}\"/>",
        escape(src),
        field(&attributes.alternative_text),
        field(&attributes.width),
        field(&attributes.height),
    );

    match attributes.click_url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => format!("<a href=\"{}\">{image}</a>", escape(url)),
        None => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_block_fills_missing_attributes_with_empty_strings() {
        let block = CmsBlock::Image {
            file_url: "/static/banner.png".to_string(),
            attributes: ImageAttributes::default(),
        };
        assert_eq!(
            block.to_html(),
            r#"<img src="/static/banner.png" alt="" width="" height=""/>"#
        );
    }

    #[test]
    fn click_url_wraps_image_in_link() {
        let block = CmsBlock::RemoteImage {
            url: "https://cdn.example.com/a.jpg".to_string(),
            attributes: ImageAttributes {
                alternative_text: Some("Summer \"sale\"".to_string()),
                width: Some("300".to_string()),
                height: Some("120".to_string()),
                click_url: Some("/es/offers".to_string()),
            },
        };
        assert_eq!(
            block.to_html(),
            concat!(
                r#"<a href="/es/offers">"#,
                r#"<img src="https://cdn.example.com/a.jpg" alt="Summer &#34;sale&#34;" width="300" height="120"/>"#,
                "</a>"
            )
        );
    }

    #[test]
    fn custom_code_is_verbatim() {
        let block = CmsBlock::CustomCode("<script>track()</script>".to_string());
        assert_eq!(block.to_html(), "<script>track()</script>");
    }
}
