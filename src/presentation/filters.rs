//! Formatting helpers exposed to templates.
//!
//! Templates reach these through the askama filters declared in
//! `presentation::views`. Helpers returning HTML fragments are emitted with
//! `|safe`.

use url::Url;

use super::i18n::catalogue;
use crate::util::html::escape;

pub use super::dates::{dateformat, datetimeformat};
pub use super::wiki::wikimarkup;

/// `1234.5` → `1234<span class="price-decimals">.50</span>`; zero renders nothing.
pub fn price(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return String::new();
    }
    let rounded = format!("{value:.2}");
    match rounded.split_once('.') {
        Some((int, decimals)) => {
            format!("{int}<span class=\"price-decimals\">.{decimals}</span>")
        }
        None => rounded,
    }
}

pub fn quantity(value: f64) -> String {
    let rounded = format!("{value:.0}");
    if rounded == "-0" { "0".to_string() } else { rounded }
}

/// Paragraphs for blank-line separated blocks, `<br/>` for single breaks.
pub fn nl2br(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in normalized.split('\n') {
        if !line.is_empty() {
            current.push(line);
        } else if !current.is_empty() {
            paragraphs.push(paragraph(&current));
            current.clear();
        }
    }
    if !current.is_empty() {
        paragraphs.push(paragraph(&current));
    }

    paragraphs.join("\n\n")
}

fn paragraph(lines: &[&str]) -> String {
    let body = lines
        .iter()
        .map(|line| escape(line))
        .collect::<Vec<_>>()
        .join("<br/>\n");
    format!("<p>{body}</p>")
}

/// Translated label for a document state; unknown keys pass through.
pub fn state(key: &str, language: &str) -> String {
    catalogue(language)
        .state_label(key)
        .map(str::to_string)
        .unwrap_or_else(|| key.to_string())
}

/// Responsive embed for YouTube and Vimeo links, a plain link otherwise.
pub fn video(url: &str) -> String {
    match embed_url(url) {
        Some(src) => format!(
            "<div class=\"video-embed\"><iframe src=\"{}\" width=\"560\" height=\"315\" \
             frameborder=\"0\" allowfullscreen></iframe></div>",
            escape(&src)
        ),
        None => {
            let escaped = escape(url);
            format!("<a href=\"{escaped}\">{escaped}</a>")
        }
    }
}

fn embed_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let mut segments = parsed.path_segments()?.filter(|segment| !segment.is_empty());

    match host {
        "youtube.com" => {
            let id = match segments.next()? {
                "watch" => parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned())?,
                "embed" | "shorts" => segments.next()?.to_string(),
                _ => return None,
            };
            valid_video_id(&id).then(|| format!("https://www.youtube.com/embed/{id}"))
        }
        "youtu.be" => {
            let id = segments.next()?;
            valid_video_id(id).then(|| format!("https://www.youtube.com/embed/{id}"))
        }
        "vimeo.com" => {
            let id = segments.next()?;
            (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
                .then(|| format!("https://player.vimeo.com/video/{id}"))
        }
        "player.vimeo.com" => {
            if segments.next()? != "video" {
                return None;
            }
            let id = segments.next()?;
            (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
                .then(|| format!("https://player.vimeo.com/video/{id}"))
        }
        _ => None,
    }
}

fn valid_video_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// URL of the thumbnail redirect route for a stored file.
pub fn thumbnail_path(
    source_id: &str,
    display_name: &str,
    size: &str,
    crop: Option<&str>,
    background: Option<&str>,
) -> String {
    let mut path = format!(
        "/media/thumbnail/{}/{}?size={}",
        urlencoding::encode(source_id),
        urlencoding::encode(display_name),
        urlencoding::encode(size)
    );
    if let Some(crop) = crop {
        path.push_str("&crop=");
        path.push_str(&urlencoding::encode(crop));
    }
    if let Some(background) = background {
        path.push_str("&bg=");
        path.push_str(&urlencoding::encode(background));
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_splits_decimals() {
        assert_eq!(price(1234.5), "1234<span class=\"price-decimals\">.50</span>");
        assert_eq!(price(9.999), "10<span class=\"price-decimals\">.00</span>");
        assert_eq!(price(0.0), "");
    }

    #[test]
    fn quantity_rounds_to_units() {
        assert_eq!(quantity(2.0), "2");
        assert_eq!(quantity(2.6), "3");
        assert_eq!(quantity(-0.2), "0");
    }

    #[test]
    fn nl2br_builds_paragraphs_and_breaks() {
        assert_eq!(
            nl2br("first line\nsecond <line>\n\n\nnext\r\nlast"),
            "<p>first line<br/>\nsecond &lt;line&gt;</p>\n\n<p>next<br/>\nlast</p>"
        );
        assert_eq!(nl2br(""), "");
    }

    #[test]
    fn state_labels_translate_or_pass_through() {
        assert_eq!(state("cancel", "en"), "Canceled");
        assert_eq!(state("done", "es"), "Realizado");
        assert_eq!(state("shipped", "ca"), "shipped");
    }

    #[test]
    fn video_embeds_known_hosts() {
        assert!(
            video("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
                .contains("src=\"https://www.youtube.com/embed/dQw4w9WgXcQ\"")
        );
        assert!(
            video("https://youtu.be/dQw4w9WgXcQ")
                .contains("src=\"https://www.youtube.com/embed/dQw4w9WgXcQ\"")
        );
        assert!(
            video("https://vimeo.com/76979871")
                .contains("src=\"https://player.vimeo.com/video/76979871\"")
        );
    }

    #[test]
    fn video_falls_back_to_links() {
        assert_eq!(
            video("https://example.com/clip?a=1&b=2"),
            "<a href=\"https://example.com/clip?a=1&amp;b=2\">https://example.com/clip?a=1&amp;b=2</a>"
        );
        assert!(video("https://vimeo.com/channels").starts_with("<a "));
    }

    #[test]
    fn thumbnail_path_encodes_parts() {
        assert_eq!(
            thumbnail_path("ab12cd34", "my photo.jpg", "100x100", Some("fit"), None),
            "/media/thumbnail/ab12cd34/my%20photo.jpg?size=100x100&crop=fit"
        );
        assert_eq!(
            thumbnail_path("ab12cd34", "a.png", "200x", None, Some("ffffff")),
            "/media/thumbnail/ab12cd34/a.png?size=200x&bg=ffffff"
        );
    }
}
