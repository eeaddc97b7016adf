use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

use crate::cache::derive_filename;
use crate::models::Manifest;

/// Prefix marking an alias as a regular expression over the whole request URL.
pub const PATTERN_PREFIX: &str = "re:";

#[derive(Debug, Clone)]
struct PatternKey {
    ordinal: usize,
    regex: Regex,
    filename: String,
}

/// Request URL → mirror filename, derived from a `Manifest`.
///
/// Keys are registered in manifest order (canonical URL first, then its
/// aliases) and the first registered key that matches wins. Plain keys are
/// a hash lookup. Pattern aliases (`re:<regex>`) are tried one by one, so
/// lookup cost grows linearly with the number of pattern aliases.
#[derive(Debug, Clone, Default)]
pub struct AliasIndex {
    exact: HashMap<String, (usize, String)>,
    patterns: Vec<PatternKey>,
}

impl AliasIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rebuild(manifest: &Manifest) -> Self {
        let mut index = Self::default();
        let mut ordinal = 0;

        for entry in manifest {
            let filename = derive_filename(&entry.canonical_url);
            index.register_exact(&entry.canonical_url, ordinal, &filename);
            ordinal += 1;

            for alias in &entry.aliases {
                match alias.strip_prefix(PATTERN_PREFIX) {
                    Some(pattern) => match Regex::new(&format!("^(?:{})$", pattern)) {
                        Ok(regex) => index.patterns.push(PatternKey {
                            ordinal,
                            regex,
                            filename: filename.clone(),
                        }),
                        Err(e) => {
                            warn!(url = %entry.canonical_url, alias = %alias, error = %e, "Skipping invalid pattern alias");
                        }
                    },
                    None => index.register_exact(alias, ordinal, &filename),
                }
                ordinal += 1;
            }
        }

        index
    }

    fn register_exact(&mut self, key: &str, ordinal: usize, filename: &str) {
        self.exact
            .entry(key.to_string())
            .or_insert_with(|| (ordinal, filename.to_string()));
    }

    /// Filename for `request_url`, or `None` when nothing matches.
    pub fn resolve(&self, request_url: &str) -> Option<&str> {
        let exact = self.exact.get(request_url);
        let limit = exact.map(|(ordinal, _)| *ordinal).unwrap_or(usize::MAX);

        self.patterns
            .iter()
            .take_while(|p| p.ordinal < limit)
            .find(|p| p.regex.is_match(request_url))
            .map(|p| p.filename.as_str())
            .or_else(|| exact.map(|(_, filename)| filename.as_str()))
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceEntry;

    fn manifest(entries: Vec<ResourceEntry>) -> Manifest {
        let mut m = Manifest::new();
        for e in entries {
            m.upsert(e);
        }
        m
    }

    #[test]
    fn test_canonical_and_alias_resolve_to_same_file() {
        let index = AliasIndex::rebuild(&manifest(vec![ResourceEntry::new(
            "https://a.com/x.js",
            "h1",
        )
        .with_aliases(["https://cdn.a.com/x.js", "https://a.com/x.min.js"])]));

        let expected = Some("___a_com_x_js");
        assert_eq!(index.resolve("https://a.com/x.js"), expected);
        assert_eq!(index.resolve("https://cdn.a.com/x.js"), expected);
        assert_eq!(index.resolve("https://a.com/x.min.js"), expected);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_unknown_url_resolves_to_none() {
        let index = AliasIndex::rebuild(&manifest(vec![ResourceEntry::new("https://a.com/x.js", "h1")]));
        assert_eq!(index.resolve("https://a.com/other.js"), None);
        assert_eq!(AliasIndex::empty().resolve("https://a.com/x.js"), None);
    }

    #[test]
    fn test_pattern_alias_matches_whole_url() {
        let index = AliasIndex::rebuild(&manifest(vec![ResourceEntry::new(
            "https://a.com/app.js",
            "h1",
        )
        .with_aliases([r"re:https://a\.com/app\.js\?v=\d+"])]));

        assert_eq!(index.resolve("https://a.com/app.js?v=42"), Some("___a_com_app_js"));
        assert_eq!(index.resolve("https://a.com/app.js?v=x"), None);
        assert_eq!(index.resolve("prefix https://a.com/app.js?v=1"), None);
        assert_eq!(index.pattern_count(), 1);
    }

    #[test]
    fn test_first_registered_key_wins() {
        // The earlier entry's pattern shadows a later exact alias.
        let index = AliasIndex::rebuild(&manifest(vec![
            ResourceEntry::new("https://a.com/one.js", "h1").with_aliases([r"re:https://b\.com/.*"]),
            ResourceEntry::new("https://a.com/two.js", "h2").with_aliases(["https://b.com/two.js"]),
        ]));
        assert_eq!(index.resolve("https://b.com/two.js"), Some("___a_com_one_js"));

        // A later pattern never shadows an earlier exact key.
        let index = AliasIndex::rebuild(&manifest(vec![
            ResourceEntry::new("https://a.com/one.js", "h1").with_aliases(["https://b.com/x.js"]),
            ResourceEntry::new("https://a.com/two.js", "h2").with_aliases([r"re:https://b\.com/.*"]),
        ]));
        assert_eq!(index.resolve("https://b.com/x.js"), Some("___a_com_one_js"));
        assert_eq!(index.resolve("https://b.com/y.js"), Some("___a_com_two_js"));
    }

    #[test]
    fn test_duplicate_exact_alias_keeps_first_owner() {
        let index = AliasIndex::rebuild(&manifest(vec![
            ResourceEntry::new("https://a.com/one.js", "h1").with_aliases(["https://shared/x.js"]),
            ResourceEntry::new("https://a.com/two.js", "h2").with_aliases(["https://shared/x.js"]),
        ]));
        assert_eq!(index.resolve("https://shared/x.js"), Some("___a_com_one_js"));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let index = AliasIndex::rebuild(&manifest(vec![ResourceEntry::new(
            "https://a.com/x.js",
            "h1",
        )
        .with_aliases(["re:([unclosed"])]));
        assert_eq!(index.pattern_count(), 0);
        assert_eq!(index.resolve("https://a.com/x.js"), Some("___a_com_x_js"));
    }
}
