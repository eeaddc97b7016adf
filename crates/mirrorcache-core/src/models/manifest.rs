//! Manifest data model.
//!
//! `RemoteEntry` is the JSON shape shared by the remote version manifest and
//! the persisted manifest file. `Manifest` is the in-memory, insertion-ordered
//! form keyed by canonical URL.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One element of a manifest JSON array: `{url, hash, alias?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub url: String,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<Vec<String>>,
}

impl RemoteEntry {
    /// Entries without a url or hash can never be mirrored.
    pub fn is_valid(&self) -> bool {
        !self.url.trim().is_empty() && !self.hash.trim().is_empty()
    }

    pub fn aliases(&self) -> Vec<String> {
        dedup_aliases(self.alias.clone().unwrap_or_default())
    }
}

/// A tracked resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub canonical_url: String,
    pub content_hash: String,
    /// Ordered, duplicate-free.
    pub aliases: Vec<String>,
}

impl ResourceEntry {
    pub fn new(canonical_url: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            canonical_url: canonical_url.into(),
            content_hash: content_hash.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = dedup_aliases(aliases.into_iter().map(Into::into).collect());
        self
    }
}

impl From<RemoteEntry> for ResourceEntry {
    fn from(remote: RemoteEntry) -> Self {
        let aliases = remote.aliases();
        Self {
            canonical_url: remote.url,
            content_hash: remote.hash,
            aliases,
        }
    }
}

impl From<ResourceEntry> for RemoteEntry {
    fn from(entry: ResourceEntry) -> Self {
        Self {
            url: entry.canonical_url,
            hash: entry.content_hash,
            alias: if entry.aliases.is_empty() {
                None
            } else {
                Some(entry.aliases)
            },
        }
    }
}

fn dedup_aliases(aliases: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(aliases.len());
    for alias in aliases {
        if !alias.is_empty() && !out.contains(&alias) {
            out.push(alias);
        }
    }
    out
}

/// Canonical URL → entry, iterated in insertion order.
///
/// Serialized as a JSON array of `RemoteEntry`. When the array repeats a URL,
/// the later element replaces the earlier one but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RemoteEntry>", into = "Vec<RemoteEntry>")]
pub struct Manifest {
    entries: Vec<ResourceEntry>,
    index: HashMap<String, usize>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, url: &str) -> Option<&ResourceEntry> {
        self.index.get(url).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    /// Insert or replace the entry for `entry.canonical_url`.
    /// A replaced entry keeps its original position.
    pub fn upsert(&mut self, entry: ResourceEntry) {
        match self.index.get(&entry.canonical_url) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(entry.canonical_url.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.entries.iter()
    }
}

impl From<Vec<RemoteEntry>> for Manifest {
    fn from(remote: Vec<RemoteEntry>) -> Self {
        let mut manifest = Manifest::new();
        for entry in remote {
            manifest.upsert(entry.into());
        }
        manifest
    }
}

impl From<Manifest> for Vec<RemoteEntry> {
    fn from(manifest: Manifest) -> Self {
        manifest.entries.into_iter().map(RemoteEntry::from).collect()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ResourceEntry;
    type IntoIter = std::slice::Iter<'a, ResourceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
