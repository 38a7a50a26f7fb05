//! URL splitting, used to compute the `Host` header for absolute
//! request targets.
//!
//! This is a collaborator service with an explicit lifecycle, injected
//! into the connection rather than living in a module-global: the parse
//! cache is bounded and cleared wholesale when full, so repeated
//! requests to the same handful of URLs never re-parse but a runaway
//! caller cannot grow it without limit.

use std::collections::HashMap;

use tracing::trace;

/// Bound on the parse cache; reaching it clears the whole cache.
const MAX_CACHE_SIZE: usize = 20;

/// A URL decomposed into `<scheme>://<netloc>/<path>?<query>#<fragment>`.
///
/// Components are not broken down further and percent-escapes are not
/// expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitUrl {
    pub scheme: String,
    pub netloc: String,
    pub path: String,
    pub query: String,
    pub fragment: String,
}

/// Splitting service with a bounded cache.
#[derive(Debug, Default)]
pub struct UrlSplitter {
    cache: HashMap<String, SplitUrl>,
}

impl UrlSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every cached parse.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Splits a URL, consulting and populating the cache.
    pub fn split(&mut self, url: &str) -> SplitUrl {
        if let Some(cached) = self.cache.get(url) {
            return cached.clone();
        }
        if self.cache.len() >= MAX_CACHE_SIZE {
            // avoid runaway growth
            trace!("url parse cache full, clearing");
            self.cache.clear();
        }
        let split = split_url(url);
        self.cache.insert(url.to_string(), split.clone());
        split
    }
}

fn is_scheme_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')
}

fn split_url(url: &str) -> SplitUrl {
    let mut scheme = String::new();
    let mut rest = url;

    if let Some(pos) = rest.find(':') {
        if pos > 0 && rest[..pos].chars().all(is_scheme_char) {
            scheme = rest[..pos].to_ascii_lowercase();
            rest = &rest[pos + 1..];
        }
    }

    let mut netloc = "";
    if let Some(after) = rest.strip_prefix("//") {
        let end = after.find(['/', '?', '#']).unwrap_or(after.len());
        netloc = &after[..end];
        rest = &after[end..];
    }

    let mut fragment = "";
    if let Some(pos) = rest.find('#') {
        fragment = &rest[pos + 1..];
        rest = &rest[..pos];
    }

    let mut query = "";
    if let Some(pos) = rest.find('?') {
        query = &rest[pos + 1..];
        rest = &rest[..pos];
    }

    SplitUrl {
        scheme,
        netloc: netloc.to_string(),
        path: rest.to_string(),
        query: query.to_string(),
        fragment: fragment.to_string(),
    }
}
