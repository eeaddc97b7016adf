use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::models::Manifest;

/// Manifest file name in the cache root
pub const MANIFEST_FILE: &str = "manifest.json";

/// Durable home of the `Manifest`.
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(cache_root: &Path) -> Self {
        Self {
            path: cache_root.join(MANIFEST_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted manifest.
    ///
    /// An absent, unreadable or malformed file yields an empty manifest.
    pub fn load(&self) -> Manifest {
        let contents = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No manifest on disk, starting empty");
                return Manifest::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read manifest, starting empty");
                return Manifest::new();
            }
        };

        match serde_json::from_slice::<Manifest>(&contents) {
            Ok(manifest) => {
                debug!(entries = manifest.len(), "Manifest loaded");
                manifest
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Malformed manifest, starting empty");
                Manifest::new()
            }
        }
    }

    /// Persist the full entry set.
    ///
    /// Written to a sibling temp file then renamed over the manifest, so a
    /// concurrent `load` sees either the old or the new file.
    pub fn save(&self, manifest: &Manifest) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_vec_pretty(manifest)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(entries = manifest.len(), path = %self.path.display(), "Manifest saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceEntry;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_malformed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path());
        std::fs::write(store.path(), b"[{\"url\": 42").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path());

        let mut manifest = Manifest::new();
        manifest.upsert(ResourceEntry::new("https://a.com/x.js", "h1"));
        manifest.upsert(
            ResourceEntry::new("https://a.com/y.css", "h2")
                .with_aliases(["https://cdn.a.com/y.css", "re:https://a\\.com/y\\.css\\?.*"]),
        );

        store.save(&manifest).unwrap();
        let loaded = store.load();

        let mut expected: Vec<_> = manifest.iter().cloned().collect();
        let mut actual: Vec<_> = loaded.iter().cloned().collect();
        expected.sort_by(|a, b| a.canonical_url.cmp(&b.canonical_url));
        actual.sort_by(|a, b| a.canonical_url.cmp(&b.canonical_url));
        assert_eq!(expected, actual);

        // Saving what was loaded reproduces the same file.
        let first = std::fs::read(store.path()).unwrap();
        store.save(&loaded).unwrap();
        assert_eq!(first, std::fs::read(store.path()).unwrap());
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path());
        store.save(&Manifest::new()).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![MANIFEST_FILE.to_string()]);
    }

    #[test]
    fn test_save_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("root");
        let store = ManifestStore::new(&root);
        store.save(&Manifest::new()).unwrap();
        assert!(store.path().exists());
    }
}
