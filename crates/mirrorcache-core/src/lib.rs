//! Local mirror cache for remote web resources.
//!
//! Keeps a filesystem copy of the resources listed in a remote version
//! manifest and serves them to a host browser view in place of network
//! loads.
//!
//! - `cache`: manifest store, local mirror, memory cache
//! - `resolve`: alias index and MIME classification
//! - `sync`: reconciler and snapshot publication
//! - `interceptor`: the per-request serve-or-pass-through decision
//! - `manager`: `MirrorCache`, which owns all of the above
//! - `view`: `MirrorView`, the embedding API for a host

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod manager;
pub mod models;
pub mod resolve;
pub mod sync;
pub mod utils;
pub mod view;

pub use config::MirrorConfig;
pub use error::MirrorError;
pub use interceptor::{InterceptedResource, Interceptor, ServedFrom};
pub use manager::{MirrorCache, UpdateHandle};
pub use models::{Manifest, RemoteEntry, ResourceEntry};
pub use sync::{EntryFailure, FailureReason, ReconcileReport};
pub use view::MirrorView;
