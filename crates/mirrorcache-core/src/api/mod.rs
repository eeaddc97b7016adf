//! HTTP access to the remote version manifest and resource origins.
//!
//! This module provides the `MirrorClient` used by the reconciler and the
//! `ApiError` type that classifies failed responses.

pub mod client;
pub mod error;

pub use client::{MirrorClient, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
