//! Permset Core
//!
//! Data model and merge engine for role permission sets. A base permission
//! document is combined with an ordered list of override documents into one
//! canonical, deterministically ordered document.

pub mod category;
pub mod document;
pub mod error;
pub mod merge;
pub mod validate;

pub use category::{Category, DefaultField, KeyKind};
pub use document::{CodePermission, IdPermission, PermissionDocument, PermissionEntry};
pub use error::{MergeError, MergeResult};
pub use merge::{DedupPolicy, Merger, canonicalize, merge, merge_json};
pub use validate::validate_document;
