//! Data models for tracked resources.
//!
//! - `RemoteEntry`: wire shape of a manifest element (remote and persisted)
//! - `ResourceEntry`: a tracked resource with its hash and aliases
//! - `Manifest`: insertion-ordered set of `ResourceEntry` keyed by URL

pub mod manifest;

pub use manifest::{Manifest, RemoteEntry, ResourceEntry};
