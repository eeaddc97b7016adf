use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::MemoryCache;
use crate::models::Manifest;
use crate::resolve::AliasIndex;

/// Immutable derived state published to readers as one unit.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub manifest: Arc<Manifest>,
    pub aliases: AliasIndex,
    /// `Some` only while the memory cache is enabled.
    pub memory: Option<MemoryCache>,
    pub generation: u64,
}

/// Single version pointer to the current `Snapshot`.
///
/// Readers clone the `Arc` and keep a consistent view for as long as they
/// hold it; the writer replaces the pointer wholesale. The lock is only ever
/// held long enough to clone or swap the `Arc`.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotCell {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn load(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Swap in a new snapshot, stamping it with the next generation.
    /// Returns the generation assigned.
    pub fn publish(&self, mut snapshot: Snapshot) -> u64 {
        let mut current = self.current.write();
        snapshot.generation = current.generation + 1;
        let generation = snapshot.generation;
        *current = Arc::new(snapshot);
        generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceEntry;

    #[test]
    fn test_reader_keeps_old_snapshot_after_publish() {
        let cell = SnapshotCell::default();
        let before = cell.load();
        assert_eq!(before.generation, 0);

        let mut manifest = Manifest::new();
        manifest.upsert(ResourceEntry::new("https://a.com/x.js", "h1"));
        let aliases = AliasIndex::rebuild(&manifest);
        let generation = cell.publish(Snapshot {
            manifest: Arc::new(manifest),
            aliases,
            memory: None,
            generation: 0,
        });

        assert_eq!(generation, 1);
        assert!(before.manifest.is_empty());
        assert_eq!(before.aliases.resolve("https://a.com/x.js"), None);

        let after = cell.load();
        assert_eq!(after.generation, 1);
        assert_eq!(after.aliases.resolve("https://a.com/x.js"), Some("___a_com_x_js"));
    }
}
