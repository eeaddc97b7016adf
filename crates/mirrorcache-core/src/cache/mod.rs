//! Local storage for mirrored resources.
//!
//! This module provides:
//! - `ManifestStore`: the persisted manifest at `<root>/manifest.json`
//! - `LocalMirror`: resource bytes under `<root>/files/`, one file per URL
//! - `MemoryCache`: optional in-memory copy of the mirror
//!
//! Mirror filenames come from `derive_filename`.

pub mod memory;
pub mod mirror;
pub mod store;

pub use memory::MemoryCache;
pub use mirror::{derive_filename, LocalMirror};
pub use store::ManifestStore;
