//! MediaWiki-flavoured markup used by CMS descriptions.
//!
//! Supported: `=` to `======` headings, `'''bold'''`, `''italic''`,
//! `[[Page]]` / `[[Page|label]]`, `[http://url label]`, `*` / `#` lists,
//! `----` rules and blank-line separated paragraphs. Everything else is text.
//! The generated HTML is passed through ammonia before it is returned.

use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use once_cell::sync::Lazy;

use crate::util::html::escape;

/// Minimum number of headings before a table of contents is worth showing.
const TOC_MIN_HEADINGS: usize = 4;

static SANITIZER: Lazy<AmmoniaBuilder<'static>> = Lazy::new(build_sanitizer);

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a", "b", "br", "div", "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "li", "ol",
        "p", "span", "strong", "ul",
    ]);
    builder.tags(tags);
    builder.generic_attributes(HashSet::from(["class", "id"]));
    builder.link_rel(None);
    builder.add_tag_attributes("a", &["rel"]);
    builder
}

struct Heading {
    level: usize,
    anchor: String,
    html: String,
}

/// Render `text` to sanitised HTML, with a table of contents when `show_toc`
/// is set and the text has enough headings.
pub fn wikimarkup(text: &str, show_toc: bool) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut blocks: Vec<String> = Vec::new();
    let mut headings: Vec<Heading> = Vec::new();
    let mut first_heading_block: Option<usize> = None;
    let mut anchors: HashSet<String> = HashSet::new();
    let mut paragraph: Vec<String> = Vec::new();
    let mut list = ListState::default();

    for line in normalized.lines() {
        let trimmed = line.trim_end();

        if let Some((prefix, content)) = list_item(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            list.item(prefix, &inline(content.trim()));
            continue;
        }
        if let Some(html) = list.finish() {
            blocks.push(html);
        }

        if trimmed.trim().is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
        } else if let Some((level, content)) = heading(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let anchor = unique_anchor(content, &mut anchors);
            let html = inline(content);
            first_heading_block.get_or_insert(blocks.len());
            blocks.push(format!("<h{level} id=\"{anchor}\">{html}</h{level}>"));
            headings.push(Heading {
                level,
                anchor,
                html,
            });
        } else if trimmed.len() >= 4 && trimmed.chars().all(|c| c == '-') {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push("<hr/>".to_string());
        } else {
            paragraph.push(inline(trimmed.trim_start()));
        }
    }
    if let Some(html) = list.finish() {
        blocks.push(html);
    }
    flush_paragraph(&mut paragraph, &mut blocks);

    if show_toc && headings.len() >= TOC_MIN_HEADINGS {
        let at = first_heading_block.unwrap_or(0);
        blocks.insert(at, table_of_contents(&headings));
    }

    SANITIZER.clean(&blocks.join("\n")).to_string()
}

fn flush_paragraph(paragraph: &mut Vec<String>, blocks: &mut Vec<String>) {
    if !paragraph.is_empty() {
        blocks.push(format!("<p>{}</p>", paragraph.join("\n")));
        paragraph.clear();
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let line = line.trim();
    let leading = line.len() - line.trim_start_matches('=').len();
    let trailing = line.len() - line.trim_end_matches('=').len();
    if leading == 0 || trailing == 0 || leading + trailing >= line.len() {
        return None;
    }
    let level = leading.min(trailing).min(6);
    let content = line[level..line.len() - level].trim_matches('=').trim();
    (!content.is_empty()).then_some((level, content))
}

fn list_item(line: &str) -> Option<(&str, &str)> {
    let depth = line.len() - line.trim_start_matches(['*', '#']).len();
    (depth > 0).then(|| line.split_at(depth))
}

#[derive(Default)]
struct ListState {
    stack: Vec<char>,
    html: String,
}

impl ListState {
    fn item(&mut self, prefix: &str, content: &str) {
        let wanted: Vec<char> = prefix.chars().collect();
        let common = self
            .stack
            .iter()
            .zip(&wanted)
            .take_while(|(open, want)| open == want)
            .count();

        while self.stack.len() > common {
            self.close_list();
        }
        if !self.stack.is_empty() && self.stack.len() == wanted.len() {
            self.html.push_str("</li>\n<li>");
        } else {
            for &kind in &wanted[self.stack.len()..] {
                if !self.stack.is_empty() {
                    self.html.push('\n');
                }
                self.html.push_str(if kind == '#' { "<ol>\n<li>" } else { "<ul>\n<li>" });
                self.stack.push(kind);
            }
        }
        self.html.push_str(content);
    }

    fn close_list(&mut self) {
        if let Some(kind) = self.stack.pop() {
            self.html
                .push_str(if kind == '#' { "</li>\n</ol>\n" } else { "</li>\n</ul>\n" });
        }
    }

    fn finish(&mut self) -> Option<String> {
        if self.stack.is_empty() {
            return None;
        }
        while !self.stack.is_empty() {
            self.close_list();
        }
        Some(std::mem::take(&mut self.html).trim_end().to_string())
    }
}

fn unique_anchor(text: &str, taken: &mut HashSet<String>) -> String {
    let base: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();
    let base = if base.is_empty() { "section".to_string() } else { base };

    let mut anchor = base.clone();
    let mut n = 2;
    while !taken.insert(anchor.clone()) {
        anchor = format!("{base}_{n}");
        n += 1;
    }
    anchor
}

fn table_of_contents(headings: &[Heading]) -> String {
    let mut html = String::from("<div id=\"toc\" class=\"toc\">\n");
    let mut levels: Vec<usize> = Vec::new();

    for heading in headings {
        match levels.last().copied() {
            None => {
                html.push_str("<ul>\n<li>");
                levels.push(heading.level);
            }
            Some(last) if heading.level > last => {
                html.push_str("\n<ul>\n<li>");
                levels.push(heading.level);
            }
            Some(_) => {
                while levels.len() > 1 && levels.last().is_some_and(|last| *last > heading.level) {
                    levels.pop();
                    html.push_str("</li>\n</ul>\n");
                }
                if levels.last().is_some_and(|last| *last < heading.level) {
                    html.push_str("\n<ul>\n<li>");
                    levels.push(heading.level);
                } else {
                    html.push_str("</li>\n<li>");
                }
            }
        }
        html.push_str(&format!(
            "<a href=\"#{}\"><span class=\"toctext\">{}</span></a>",
            heading.anchor, heading.html
        ));
    }
    while levels.pop().is_some() {
        html.push_str("</li>\n</ul>\n");
    }
    html.push_str("</div>");
    html
}

/// Inline markup: emphasis and links. Text is escaped as it is copied.
fn inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut bold = false;
    let mut italic = false;
    let mut rest = text;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("'''") {
            out.push_str(if bold { "</strong>" } else { "<strong>" });
            bold = !bold;
            rest = after;
        } else if let Some(after) = rest.strip_prefix("''") {
            out.push_str(if italic { "</em>" } else { "<em>" });
            italic = !italic;
            rest = after;
        } else if let Some((html, after)) = internal_link(rest).or_else(|| external_link(rest)) {
            out.push_str(&html);
            rest = after;
        } else {
            let ch = rest.chars().next().unwrap_or_default();
            let len = ch.len_utf8();
            out.push_str(&escape(&rest[..len]));
            rest = &rest[len..];
        }
    }

    if italic {
        out.push_str("</em>");
    }
    if bold {
        out.push_str("</strong>");
    }
    out
}

fn internal_link(text: &str) -> Option<(String, &str)> {
    let body = text.strip_prefix("[[")?;
    let end = body.find("]]")?;
    let (target, label) = match body[..end].split_once('|') {
        Some((target, label)) => (target.trim(), label.trim()),
        None => (body[..end].trim(), body[..end].trim()),
    };
    if target.is_empty() {
        return None;
    }
    let href = target.replace(' ', "_");
    let html = format!("<a href=\"{}\">{}</a>", escape(&href), escape(label));
    Some((html, &body[end + 2..]))
}

fn external_link(text: &str) -> Option<(String, &str)> {
    let body = text.strip_prefix('[')?;
    if !(body.starts_with("http://") || body.starts_with("https://") || body.starts_with("mailto:")) {
        return None;
    }
    let end = body.find(']')?;
    let inner = &body[..end];
    let (url, label) = match inner.split_once(char::is_whitespace) {
        Some((url, label)) if !label.trim().is_empty() => (url, label.trim()),
        _ => (inner.trim(), inner.trim()),
    };
    let html = format!(
        "<a href=\"{}\" class=\"external\" rel=\"nofollow\">{}</a>",
        escape(url),
        escape(label)
    );
    Some((html, &body[end + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emphasis_and_paragraphs() {
        let html = wikimarkup("Some '''bold''' and ''italic'' text.\n\nSecond", false);
        assert_eq!(
            html,
            "<p>Some <strong>bold</strong> and <em>italic</em> text.</p>\n<p>Second</p>"
        );
    }

    #[test]
    fn headings_get_anchors() {
        let html = wikimarkup("== Shipping costs ==\nFree over 50.", false);
        assert!(html.contains("<h2 id=\"Shipping_costs\">Shipping costs</h2>"));
        assert!(html.contains("<p>Free over 50.</p>"));
    }

    #[test]
    fn links_render_internal_and_external() {
        let html = wikimarkup("See [[Main Page|home]] or [https://example.com docs].", false);
        assert!(html.contains("<a href=\"Main_Page\">home</a>"));
        assert!(html.contains(
            "<a href=\"https://example.com\" class=\"external\" rel=\"nofollow\">docs</a>"
        ));
    }

    #[test]
    fn nested_lists() {
        let html = wikimarkup("* one\n** one.a\n* two\n# first", false);
        assert_eq!(
            html,
            "<ul>\n<li>one\n<ul>\n<li>one.a</li>\n</ul>\n</li>\n<li>two</li>\n</ul>\n<ol>\n<li>first</li>\n</ol>"
        );
    }

    #[test]
    fn raw_html_is_neutralised() {
        let html = wikimarkup("<script>alert(1)</script> ok", false);
        assert!(!html.contains("<script>"));
        assert!(html.contains("ok"));
    }

    #[test]
    fn toc_needs_four_headings() {
        let three = "= A =\n= B =\n= C =";
        assert!(!wikimarkup(three, true).contains("class=\"toc\""));

        let four = "Intro\n= A =\n== A1 ==\n= B =\n= C =";
        let html = wikimarkup(four, true);
        let toc = html.find("class=\"toc\"").expect("toc present");
        assert!(html.find("<p>Intro</p>").expect("intro") < toc);
        assert!(toc < html.find("<h1").expect("heading"));
        assert!(html.contains("<a href=\"#A1\"><span class=\"toctext\">A1</span></a>"));
        assert!(!wikimarkup(four, false).contains("class=\"toc\""));
    }

    #[test]
    fn horizontal_rule() {
        assert!(wikimarkup("above\n----\nbelow", false).contains("<hr>"));
    }

    #[test]
    fn duplicate_headings_get_distinct_anchors() {
        let html = wikimarkup("== Notes ==\n== Notes ==", false);
        assert!(html.contains("id=\"Notes\""));
        assert!(html.contains("id=\"Notes_2\""));
    }
}
