//! Reconciliation of the local mirror against the remote version manifest.
//!
//! A run fetches the remote manifest, downloads every resource whose hash
//! changed (or whose entry or file is missing), and persists the updated
//! manifest. Entries are processed independently: a resource that fails to
//! download keeps its previous state and is listed in the report, and the
//! rest of the run carries on. Local entries missing from the remote
//! manifest are kept as they are.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::MirrorClient;
use crate::cache::{derive_filename, LocalMirror, ManifestStore};
use crate::error::{MirrorError, Result};
use crate::models::{Manifest, ResourceEntry};
use crate::utils::{format_bytes, format_duration_ms};

/// Default number of resources downloaded concurrently.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 4;

/// Why a single entry was not brought up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The resource could not be fetched.
    Download(String),
    /// The fetched bytes could not be written to the mirror.
    Write(String),
    /// Another URL already owns the derived filename.
    Collision { filename: String, owner: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Download(e) => write!(f, "download failed: {}", e),
            FailureReason::Write(e) => write!(f, "write failed: {}", e),
            FailureReason::Collision { filename, owner } => {
                write!(f, "filename {} already belongs to {}", filename, owner)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub url: String,
    pub reason: FailureReason,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub remote_entries: usize,
    pub downloaded: Vec<String>,
    pub bytes_downloaded: u64,
    pub unchanged: usize,
    pub aliases_updated: usize,
    pub invalid: usize,
    pub failures: Vec<EntryFailure>,
    pub manifest_saved: bool,
}

impl ReconcileReport {
    fn begin() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            remote_entries: 0,
            downloaded: Vec::new(),
            bytes_downloaded: 0,
            unchanged: 0,
            aliases_updated: 0,
            invalid: 0,
            failures: Vec::new(),
            manifest_saved: false,
        }
    }

    /// Number of resources fetched and written during the run.
    pub fn downloads(&self) -> usize {
        self.downloaded.len()
    }

    /// True when at least one entry could not be brought up to date.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn elapsed_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} remote entries: {} downloaded ({}), {} unchanged, {} alias updates, {} invalid, {} failed in {}",
            self.remote_entries,
            self.downloads(),
            format_bytes(self.bytes_downloaded),
            self.unchanged,
            self.aliases_updated,
            self.invalid,
            self.failures.len(),
            format_duration_ms(self.elapsed_ms()),
        )
    }
}

/// One reconciliation pass over borrowed storage.
pub struct Reconciler<'a> {
    client: &'a MirrorClient,
    store: &'a ManifestStore,
    mirror: &'a LocalMirror,
    max_concurrent: usize,
}

struct PendingDownload {
    entry: ResourceEntry,
    filename: String,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a MirrorClient, store: &'a ManifestStore, mirror: &'a LocalMirror) -> Self {
        Self {
            client,
            store,
            mirror,
            max_concurrent: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Bring the mirror up to date with the manifest at `manifest_url`.
    ///
    /// Returns the manifest as it now stands on disk together with the run
    /// report. A failed or malformed manifest fetch aborts before anything is
    /// touched; cancellation stops the run before the manifest is persisted.
    pub async fn run(
        &self,
        manifest_url: &str,
        current: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<(Manifest, ReconcileReport)> {
        let mut report = ReconcileReport::begin();
        info!(url = manifest_url, local_entries = current.len(), "Reconciliation started");

        let remote_entries = tokio::select! {
            _ = cancel.cancelled() => return Err(MirrorError::Cancelled),
            fetched = self.client.fetch_manifest(manifest_url) => fetched?,
        };
        report.remote_entries = remote_entries.len();

        let (valid, invalid): (Vec<_>, Vec<_>) = remote_entries.into_iter().partition(|e| e.is_valid());
        report.invalid = invalid.len();
        let remote = Manifest::from(valid);

        let mut next = current.clone();
        let mut changed = false;
        let mut owners: HashMap<String, String> = current
            .iter()
            .map(|e| (derive_filename(&e.canonical_url), e.canonical_url.clone()))
            .collect();
        let mut pending = Vec::new();

        for entry in remote.iter() {
            let filename = derive_filename(&entry.canonical_url);
            if filename.is_empty() {
                report.invalid += 1;
                continue;
            }

            match owners.get(&filename) {
                Some(owner) if owner != &entry.canonical_url => {
                    warn!(url = %entry.canonical_url, owner = %owner, file = %filename, "Filename collision, skipping entry");
                    report.failures.push(EntryFailure {
                        url: entry.canonical_url.clone(),
                        reason: FailureReason::Collision {
                            filename,
                            owner: owner.clone(),
                        },
                    });
                    continue;
                }
                Some(_) => {}
                None => {
                    owners.insert(filename.clone(), entry.canonical_url.clone());
                }
            }

            let existing = current.get(&entry.canonical_url);
            let stale = existing.map_or(true, |e| e.content_hash != entry.content_hash);
            if stale || !self.mirror.contains(&filename) {
                pending.push(PendingDownload {
                    entry: entry.clone(),
                    filename,
                });
            } else if existing.map(|e| &e.aliases) != Some(&entry.aliases) {
                next.upsert(entry.clone());
                report.aliases_updated += 1;
                changed = true;
            } else {
                report.unchanged += 1;
            }
        }

        debug!(downloads = pending.len(), "Diff complete");

        for chunk in pending.chunks(self.max_concurrent) {
            let downloads: Vec<_> = chunk
                .iter()
                .map(|p| async move { (p, self.download(p).await) })
                .collect();

            let results = tokio::select! {
                _ = cancel.cancelled() => return Err(MirrorError::Cancelled),
                results = futures::future::join_all(downloads) => results,
            };

            for (p, result) in results {
                match result {
                    Ok(bytes) => {
                        next.upsert(p.entry.clone());
                        report.downloaded.push(p.entry.canonical_url.clone());
                        report.bytes_downloaded += bytes;
                        changed = true;
                    }
                    Err(reason) => {
                        warn!(url = %p.entry.canonical_url, %reason, "Entry not updated");
                        report.failures.push(EntryFailure {
                            url: p.entry.canonical_url.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(MirrorError::Cancelled);
        }

        if changed {
            self.store
                .save(&next)
                .map_err(|e| MirrorError::filesystem(self.store.path(), e))?;
            report.manifest_saved = true;
        }

        report.finished_at = Utc::now();
        if report.is_partial() {
            warn!(summary = %report, "Reconciliation finished with failures");
        } else {
            info!(summary = %report, "Reconciliation finished");
        }
        Ok((next, report))
    }

    async fn download(&self, pending: &PendingDownload) -> std::result::Result<u64, FailureReason> {
        let url = &pending.entry.canonical_url;
        let bytes = self
            .client
            .fetch_resource(url)
            .await
            .map_err(|e| {
                debug!(url = %url, status = ?e.status(), "Resource fetch failed");
                FailureReason::Download(e.to_string())
            })?;
        self.mirror
            .write(&pending.filename, &bytes)
            .await
            .map_err(|e| FailureReason::Write(e.to_string()))?;
        debug!(url = %url, file = %pending.filename, bytes = bytes.len(), "Resource mirrored");
        Ok(bytes.len() as u64)
    }
}
