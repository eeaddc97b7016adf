//! Embedding API for a host browser view.
//!
//! The host owns the actual web view and its request pipeline. It drives a
//! `MirrorView` through the same calls it would make on a boosted view:
//! configure the manifest URL, trigger `check_for_updates`, `load` a page,
//! route every resource request through `intercept`, and report
//! `page_finished` to get the page load time delivered to its callback.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{validate_manifest_url, MirrorConfig};
use crate::error::Result;
use crate::interceptor::InterceptedResource;
use crate::manager::{MirrorCache, UpdateHandle};

/// Receives the page load time in milliseconds.
pub type PageLoadCallback = Box<dyn Fn(u64) + Send + Sync>;

struct Navigation {
    url: String,
    started: Instant,
}

/// A host view over a `MirrorCache`. Several views may share one cache;
/// dropping a view cancels only the updates it started.
pub struct MirrorView {
    cache: Arc<MirrorCache>,
    cancel: CancellationToken,
    manifest_url: Option<String>,
    on_page_load_time: Option<PageLoadCallback>,
    navigation: Option<Navigation>,
}

impl MirrorView {
    pub fn new(cache: Arc<MirrorCache>) -> Self {
        let cancel = cache.cancel_scope();
        Self {
            cache,
            cancel,
            manifest_url: None,
            on_page_load_time: None,
            navigation: None,
        }
    }

    /// Open the cache from `config` and carry over its manifest URL.
    pub fn from_config(config: &MirrorConfig) -> Result<Self> {
        let cache = Arc::new(MirrorCache::open(config)?);
        let mut view = Self::new(cache);
        view.manifest_url = config.manifest_url.clone();
        Ok(view)
    }

    pub fn cache(&self) -> &Arc<MirrorCache> {
        &self.cache
    }

    pub fn set_manifest_url(&mut self, url: impl Into<String>) {
        self.manifest_url = Some(url.into());
    }

    pub fn manifest_url(&self) -> Option<&str> {
        self.manifest_url.as_deref()
    }

    pub fn set_use_memory_cache(&self, enabled: bool) {
        self.cache.set_use_memory_cache(enabled);
    }

    pub fn set_intercept_prefix(&self, prefix: Option<String>) {
        self.cache.set_intercept_prefix(prefix);
    }

    pub fn set_on_page_load_time_callback<F>(&mut self, callback: F)
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.on_page_load_time = Some(Box::new(callback));
    }

    /// Start a background reconciliation against the configured manifest.
    ///
    /// Fails fast with `MirrorError::Configuration` when no valid manifest
    /// URL is set, and with `ReconcileInProgress` when one is already running.
    pub fn check_for_updates(&self) -> Result<UpdateHandle> {
        let url = validate_manifest_url(self.manifest_url.as_deref())?;
        info!(url = url, "Checking for updates");
        self.cache.spawn_update_with(&self.cancel, url)
    }

    /// Begin navigating to `url`; interception is active until `page_finished`.
    pub fn load(&mut self, url: impl Into<String>) {
        let url = url.into();
        debug!(url = %url, "Navigation started");
        self.navigation = Some(Navigation {
            url,
            started: Instant::now(),
        });
    }

    pub fn current_url(&self) -> Option<&str> {
        self.navigation.as_ref().map(|n| n.url.as_str())
    }

    /// Serve a resource request for the current page, or `None` to let it
    /// go to the network.
    pub fn intercept(&self, request_url: &str) -> Option<InterceptedResource> {
        self.navigation.as_ref()?;
        self.cache.intercept(request_url)
    }

    /// End the current navigation and report its load time.
    pub fn page_finished(&mut self) -> Option<u64> {
        let navigation = self.navigation.take()?;
        let elapsed_ms = navigation.started.elapsed().as_millis() as u64;
        debug!(url = %navigation.url, elapsed_ms, "Page finished");
        if let Some(ref callback) = self.on_page_load_time {
            callback(elapsed_ms);
        }
        Some(elapsed_ms)
    }
}

impl Drop for MirrorView {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MirrorError;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn view(dir: &std::path::Path) -> MirrorView {
        let config = MirrorConfig {
            cache_dir: Some(dir.to_path_buf()),
            ..MirrorConfig::default()
        };
        MirrorView::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_check_for_updates_without_manifest_url() {
        let dir = tempfile::tempdir().unwrap();
        let view = view(dir.path());
        let err = view.check_for_updates().unwrap_err();
        assert!(matches!(err, MirrorError::Configuration(_)));
    }

    #[test]
    fn test_intercept_requires_navigation() {
        let dir = tempfile::tempdir().unwrap();
        let mut view = view(dir.path());
        assert!(view.intercept("https://a.com/x.js").is_none());
        view.load("https://a.com/");
        assert_eq!(view.current_url(), Some("https://a.com/"));
        // Nothing mirrored: still passes through.
        assert!(view.intercept("https://a.com/x.js").is_none());
    }

    #[test]
    fn test_page_finished_reports_load_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut view = view(dir.path());
        let reported = Arc::new(AtomicU64::new(u64::MAX));
        let sink = Arc::clone(&reported);
        view.set_on_page_load_time_callback(move |ms| sink.store(ms, Ordering::SeqCst));

        assert_eq!(view.page_finished(), None);
        view.load("https://a.com/");
        let elapsed = view.page_finished().expect("navigation was active");
        assert_eq!(reported.load(Ordering::SeqCst), elapsed);
        assert!(view.current_url().is_none());
    }
}
