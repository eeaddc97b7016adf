//! Request interception.
//!
//! The host's request pipeline calls `Interceptor::intercept` for every
//! outgoing resource request. `Some` means "serve these bytes"; `None` means
//! "load from the network as if nothing happened". Interception only reads:
//! it never touches the manifest, never writes to the mirror and never waits
//! on a running reconciliation.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::cache::LocalMirror;
use crate::resolve::classify;
use crate::sync::{Snapshot, SnapshotCell};

/// Where intercepted bytes were read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Memory,
    Disk,
}

/// A locally served response.
#[derive(Debug, Clone)]
pub struct InterceptedResource {
    pub bytes: Arc<[u8]>,
    pub content_type: &'static str,
    pub filename: String,
    pub source: ServedFrom,
}

/// Resolve `request_url` against one snapshot.
pub fn intercept(
    snapshot: &Snapshot,
    mirror: &LocalMirror,
    request_url: &str,
) -> Option<InterceptedResource> {
    let filename = snapshot.aliases.resolve(request_url)?;

    let cached = snapshot.memory.as_ref().and_then(|memory| memory.get(filename));
    let (bytes, source) = match cached {
        Some(bytes) => (bytes, ServedFrom::Memory),
        None => match mirror.read(filename) {
            Ok(bytes) => (Arc::from(bytes), ServedFrom::Disk),
            Err(e) => {
                debug!(url = request_url, file = filename, error = %e, "Mirror miss, passing through");
                return None;
            }
        },
    };

    Some(InterceptedResource {
        bytes,
        content_type: classify(filename),
        filename: filename.to_string(),
        source,
    })
}

/// Cloneable handle the host keeps on its request path.
#[derive(Clone)]
pub struct Interceptor {
    cell: Arc<SnapshotCell>,
    mirror: LocalMirror,
    prefix: Arc<RwLock<Option<String>>>,
}

impl Interceptor {
    pub fn new(cell: Arc<SnapshotCell>, mirror: LocalMirror, prefix: Option<String>) -> Self {
        Self {
            cell,
            mirror,
            prefix: Arc::new(RwLock::new(prefix)),
        }
    }

    /// Only URLs starting with `prefix` are considered; `None` considers all.
    pub fn set_prefix(&self, prefix: Option<String>) {
        *self.prefix.write() = prefix;
    }

    pub fn prefix(&self) -> Option<String> {
        self.prefix.read().clone()
    }

    pub fn intercept(&self, request_url: &str) -> Option<InterceptedResource> {
        if let Some(prefix) = self.prefix.read().as_deref() {
            if !request_url.starts_with(prefix) {
                return None;
            }
        }
        let snapshot = self.cell.load();
        intercept(&snapshot, &self.mirror, request_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{derive_filename, MemoryCache};
    use crate::models::{Manifest, ResourceEntry};
    use crate::resolve::AliasIndex;

    async fn fixture(memory: bool) -> (tempfile::TempDir, LocalMirror, Snapshot) {
        let root = tempfile::tempdir().unwrap();
        let mirror = LocalMirror::open(root.path()).unwrap();

        let mut manifest = Manifest::new();
        manifest.upsert(
            ResourceEntry::new("https://a.com/app.js", "h1").with_aliases(["https://cdn.a.com/app.js"]),
        );
        manifest.upsert(ResourceEntry::new("https://a.com/gone.css", "h2"));
        mirror
            .write(&derive_filename("https://a.com/app.js"), b"let a = 1;")
            .await
            .unwrap();

        let snapshot = Snapshot {
            aliases: AliasIndex::rebuild(&manifest),
            memory: memory.then(|| MemoryCache::rebuild(&mirror).unwrap()),
            manifest: Arc::new(manifest),
            generation: 1,
        };
        (root, mirror, snapshot)
    }

    #[tokio::test]
    async fn test_unresolvable_url_passes_through() {
        let (_root, mirror, snapshot) = fixture(false).await;
        assert!(intercept(&snapshot, &mirror, "https://elsewhere.com/x.js").is_none());
    }

    #[tokio::test]
    async fn test_resolved_but_missing_file_passes_through() {
        let (_root, mirror, snapshot) = fixture(true).await;
        assert!(intercept(&snapshot, &mirror, "https://a.com/gone.css").is_none());
    }

    #[tokio::test]
    async fn test_alias_serves_same_bytes_with_content_type() {
        let (_root, mirror, snapshot) = fixture(false).await;
        let hit = intercept(&snapshot, &mirror, "https://cdn.a.com/app.js").expect("served");
        assert_eq!(&*hit.bytes, b"let a = 1;");
        assert_eq!(hit.content_type, "application/javascript");
        assert_eq!(hit.filename, "___a_com_app_js");
    }

    #[tokio::test]
    async fn test_memory_cache_disabled_reads_disk_only() {
        let (_root, mirror, snapshot) = fixture(false).await;
        let hit = intercept(&snapshot, &mirror, "https://a.com/app.js").expect("served");
        assert_eq!(hit.source, ServedFrom::Disk);
    }

    #[tokio::test]
    async fn test_memory_cache_enabled_serves_from_memory() {
        let (_root, mirror, snapshot) = fixture(true).await;
        // Remove the file: the warmed cache still serves it.
        std::fs::remove_file(mirror.path_for("___a_com_app_js")).unwrap();
        let hit = intercept(&snapshot, &mirror, "https://a.com/app.js").expect("served");
        assert_eq!(hit.source, ServedFrom::Memory);
        assert_eq!(&*hit.bytes, b"let a = 1;");
    }

    #[tokio::test]
    async fn test_prefix_filters_requests() {
        let (_root, mirror, snapshot) = fixture(false).await;
        let cell = Arc::new(SnapshotCell::new(snapshot));
        let interceptor = Interceptor::new(cell, mirror, Some("https://a.com/".to_string()));

        assert!(interceptor.intercept("https://a.com/app.js").is_some());
        assert!(interceptor.intercept("https://cdn.a.com/app.js").is_none());

        interceptor.set_prefix(None);
        assert!(interceptor.intercept("https://cdn.a.com/app.js").is_some());
    }
}
