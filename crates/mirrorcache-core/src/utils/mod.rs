//! Utility functions for formatting.

pub mod format;

pub use format::{format_bytes, format_duration_ms, truncate_string};
