//! The mirror cache as a whole.
//!
//! `MirrorCache` owns the manifest store, the local mirror, the HTTP client
//! and the snapshot pointer. Reconciliations run one at a time; a second
//! request while one is in flight is rejected. Every run is tied to the
//! cache's cancellation token: `shutdown`, or dropping the cache, stops it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::MirrorClient;
use crate::cache::{LocalMirror, ManifestStore, MemoryCache};
use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::interceptor::{InterceptedResource, Interceptor};
use crate::models::Manifest;
use crate::resolve::AliasIndex;
use crate::sync::{ReconcileReport, Reconciler, Snapshot, SnapshotCell};

/// Completion handle for a background reconciliation.
#[derive(Debug)]
pub struct UpdateHandle {
    join: JoinHandle<Result<ReconcileReport>>,
    cancel: CancellationToken,
}

impl UpdateHandle {
    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<ReconcileReport> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(MirrorError::Cancelled),
        }
    }

    /// Ask the run to stop at its next await point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// State shared between the cache and its background runs.
///
/// Spawned runs hold only this, never the `MirrorCache` itself, so dropping
/// the owner still cancels them.
struct Inner {
    store: ManifestStore,
    mirror: LocalMirror,
    client: MirrorClient,
    snapshots: Arc<SnapshotCell>,
    use_memory_cache: AtomicBool,
    max_concurrent_downloads: usize,
    /// Held for the whole of a reconciliation.
    in_flight: Arc<AsyncMutex<()>>,
    /// Serializes snapshot publication.
    publish: Mutex<()>,
}

impl Inner {
    fn uses_memory_cache(&self) -> bool {
        self.use_memory_cache.load(Ordering::SeqCst)
    }

    /// Build derived state and publish it.
    ///
    /// `manifest` of `None` republishes whatever is current at the time the
    /// publish lock is taken. `memory` is a cache the caller already built;
    /// it is used only while the memory cache is enabled, and built here if
    /// enabled but missing.
    fn install(&self, manifest: Option<Arc<Manifest>>, memory: Option<MemoryCache>) -> u64 {
        let _publish = self.publish.lock();
        let manifest = manifest.unwrap_or_else(|| Arc::clone(&self.snapshots.load().manifest));
        let aliases = AliasIndex::rebuild(&manifest);
        let memory = if self.uses_memory_cache() {
            memory.or_else(|| self.build_memory_cache())
        } else {
            None
        };
        let generation = self.snapshots.publish(Snapshot {
            manifest,
            aliases,
            memory,
            generation: 0,
        });
        debug!(generation, "Snapshot published");
        generation
    }

    fn build_memory_cache(&self) -> Option<MemoryCache> {
        match MemoryCache::rebuild(&self.mirror) {
            Ok(memory) => Some(memory),
            Err(e) => {
                warn!(error = %e, "Failed to build memory cache, serving from disk");
                None
            }
        }
    }

    fn try_begin(&self) -> Result<OwnedMutexGuard<()>> {
        Arc::clone(&self.in_flight)
            .try_lock_owned()
            .map_err(|_| MirrorError::ReconcileInProgress)
    }

    async fn reconcile_locked(
        &self,
        manifest_url: &str,
        cancel: &CancellationToken,
        _guard: OwnedMutexGuard<()>,
    ) -> Result<ReconcileReport> {
        let current = Arc::clone(&self.snapshots.load().manifest);
        let reconciler = Reconciler::new(&self.client, &self.store, &self.mirror)
            .with_max_concurrent(self.max_concurrent_downloads);
        let (next, report) = reconciler.run(manifest_url, &current, cancel).await?;

        // Built off to the side, then swapped in whole.
        let memory = if self.uses_memory_cache() {
            let mirror = self.mirror.clone();
            match tokio::task::spawn_blocking(move || MemoryCache::rebuild(&mirror)).await {
                Ok(Ok(memory)) => Some(memory),
                Ok(Err(e)) => {
                    warn!(error = %e, "Failed to rebuild memory cache");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Memory cache rebuild task failed");
                    None
                }
            }
        } else {
            None
        };
        self.install(Some(Arc::new(next)), memory);
        Ok(report)
    }
}

pub struct MirrorCache {
    root: PathBuf,
    inner: Arc<Inner>,
    interceptor: Interceptor,
    cancel: CancellationToken,
}

impl MirrorCache {
    /// Open the cache described by `config`: create the cache root if
    /// missing, load the manifest, warm the memory cache when enabled and
    /// publish the first snapshot.
    pub fn open(config: &MirrorConfig) -> Result<Self> {
        let client = MirrorClient::new(config.request_timeout())?;
        Self::open_with_client(config, client)
    }

    pub fn open_with_client(config: &MirrorConfig, client: MirrorClient) -> Result<Self> {
        let root = config.cache_root();
        std::fs::create_dir_all(&root).map_err(|e| MirrorError::filesystem(&root, e))?;
        let mirror = LocalMirror::open(&root)
            .map_err(|e| MirrorError::filesystem(root.join(crate::cache::mirror::MIRROR_DIR), e))?;
        let store = ManifestStore::new(&root);

        let manifest = store.load();
        let snapshots = Arc::new(SnapshotCell::default());
        let interceptor = Interceptor::new(
            Arc::clone(&snapshots),
            mirror.clone(),
            config.intercept_prefix.clone(),
        );

        let inner = Arc::new(Inner {
            store,
            mirror,
            client,
            snapshots,
            use_memory_cache: AtomicBool::new(config.use_memory_cache),
            max_concurrent_downloads: config.max_concurrent_downloads,
            in_flight: Arc::new(AsyncMutex::new(())),
            publish: Mutex::new(()),
        });
        inner.install(Some(Arc::new(manifest)), None);

        let cache = Self {
            root,
            inner,
            interceptor,
            cancel: CancellationToken::new(),
        };
        info!(
            root = %cache.root.display(),
            entries = cache.manifest().len(),
            memory_cache = cache.uses_memory_cache(),
            "Mirror cache opened"
        );
        Ok(cache)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mirror(&self) -> &LocalMirror {
        &self.inner.mirror
    }

    /// Current snapshot; stays consistent for as long as it is held.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshots.load()
    }

    pub fn manifest(&self) -> Arc<Manifest> {
        Arc::clone(&self.snapshot().manifest)
    }

    /// Handle for the host's request pipeline.
    pub fn interceptor(&self) -> Interceptor {
        self.interceptor.clone()
    }

    pub fn intercept(&self, request_url: &str) -> Option<InterceptedResource> {
        self.interceptor.intercept(request_url)
    }

    pub fn set_intercept_prefix(&self, prefix: Option<String>) {
        self.interceptor.set_prefix(prefix);
    }

    pub fn uses_memory_cache(&self) -> bool {
        self.inner.uses_memory_cache()
    }

    /// Enable or disable the memory cache. Enabling warms it from the
    /// mirror; disabling drops it so reads go straight to disk.
    pub fn set_use_memory_cache(&self, enabled: bool) {
        let previous = self.inner.use_memory_cache.swap(enabled, Ordering::SeqCst);
        if previous == enabled {
            return;
        }
        debug!(enabled, "Memory cache toggled");
        self.inner.install(None, None);
    }

    /// Token for a group of runs that can be cancelled together without
    /// shutting the cache down. Cancelled with the cache as well.
    pub fn cancel_scope(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Run one reconciliation against `manifest_url` on the current task.
    pub async fn reconcile(&self, manifest_url: &str) -> Result<ReconcileReport> {
        let guard = self.inner.try_begin()?;
        let cancel = self.cancel.child_token();
        self.inner.reconcile_locked(manifest_url, &cancel, guard).await
    }

    /// Start a reconciliation in the background.
    ///
    /// Fails immediately with `ReconcileInProgress` if one is running, or
    /// `Configuration` when called outside a tokio runtime.
    pub fn spawn_update(&self, manifest_url: impl Into<String>) -> Result<UpdateHandle> {
        self.spawn_update_with(&self.cancel, manifest_url)
    }

    /// Like `spawn_update`, with the run cancelled when `scope` is.
    ///
    /// `scope` should come from `cancel_scope` so the run also stops when
    /// the cache is dropped.
    pub fn spawn_update_with(
        &self,
        scope: &CancellationToken,
        manifest_url: impl Into<String>,
    ) -> Result<UpdateHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| MirrorError::Configuration("no async runtime available".to_string()))?;
        let guard = self.inner.try_begin()?;
        let cancel = scope.child_token();
        let manifest_url = manifest_url.into();
        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();

        let join = runtime.spawn(async move {
            inner.reconcile_locked(&manifest_url, &task_cancel, guard).await
        });
        Ok(UpdateHandle { join, cancel })
    }

    /// Cancel any running reconciliation. Later runs are cancelled too.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for MirrorCache {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
