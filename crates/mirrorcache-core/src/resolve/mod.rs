//! Request URL resolution.
//!
//! `AliasIndex` maps a request URL (canonical, alias or `re:` pattern alias)
//! to a mirror filename; `mime::classify` maps that filename to a content type.

pub mod alias;
pub mod mime;

pub use alias::{AliasIndex, PATTERN_PREFIX};
pub use mime::{classify, DEFAULT_CONTENT_TYPE};
