use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::LocalMirror;

/// In-memory copy of the local mirror, filename → bytes.
///
/// Built in one pass and never mutated afterwards; it is only as fresh as
/// the last `rebuild`.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    files: HashMap<String, Arc<[u8]>>,
    total_bytes: usize,
}

impl MemoryCache {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read every file currently in the mirror.
    ///
    /// A file that disappears or fails to read mid-rebuild is skipped; the
    /// interceptor falls back to disk for it.
    pub fn rebuild(mirror: &LocalMirror) -> std::io::Result<Self> {
        let mut files: HashMap<String, Arc<[u8]>> = HashMap::new();
        let mut total_bytes = 0;

        for name in mirror.list()? {
            match mirror.read(&name) {
                Ok(bytes) => {
                    total_bytes += bytes.len();
                    files.insert(name, Arc::from(bytes));
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Skipping unreadable mirror file");
                }
            }
        }

        debug!(files = files.len(), total_bytes, "Memory cache rebuilt");
        Ok(Self { files, total_bytes })
    }

    pub fn get(&self, filename: &str) -> Option<Arc<[u8]>> {
        self.files.get(filename).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}
