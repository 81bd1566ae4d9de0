//! Language selection from the request path.

use std::fmt;

/// A two-letter language code plus the backend locale tag it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language {
    code: String,
    tag: String,
}

impl Language {
    /// Build from a locale tag such as `es_ES`; the code is the part before `_`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        let code = tag.split(['_', '-']).next().unwrap_or_default();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(Self {
            code: code.to_ascii_lowercase(),
            tag: tag.to_string(),
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Locale tag forwarded to the backend as context (`es_ES`).
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Accepted languages and the fallback used for everything else.
#[derive(Debug, Clone)]
pub struct LocalePolicy {
    default: Language,
    accepted: Vec<Language>,
}

impl LocalePolicy {
    /// The default language is always accepted, even if not listed.
    pub fn new(default: Language, accepted: Vec<Language>) -> Self {
        let mut unique: Vec<Language> = Vec::with_capacity(accepted.len() + 1);
        for language in std::iter::once(default.clone()).chain(accepted) {
            if !unique.iter().any(|known| known.code == language.code) {
                unique.push(language);
            }
        }
        unique.sort_by(|a, b| {
            (a.code != default.code)
                .cmp(&(b.code != default.code))
                .then_with(|| a.code.cmp(&b.code))
        });
        Self {
            default,
            accepted: unique,
        }
    }

    pub fn default_language(&self) -> &Language {
        &self.default
    }

    /// Accepted languages, default first.
    pub fn accepted(&self) -> &[Language] {
        &self.accepted
    }

    pub fn lookup(&self, code: &str) -> Option<&Language> {
        self.accepted.iter().find(|language| language.code == code)
    }

    /// The first path segment selects the language when it is accepted.
    pub fn resolve_path(&self, path: &str) -> &Language {
        let first = path
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default();
        self.lookup(first).unwrap_or(&self.default)
    }
}
