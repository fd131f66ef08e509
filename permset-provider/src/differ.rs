//! Differ - Compare a stored permission set with the desired one
//!
//! Both sides are canonicalized before comparison, so whitespace, key order,
//! entry order and duplicate entries never show up as changes.

use permset_core::{Category, DedupPolicy, DefaultField, PermissionDocument, canonicalize};

use crate::provider::{ProviderError, ProviderResult};

/// Result of comparing two permission sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDiff {
    /// Semantically identical documents
    NoChange,
    /// Documents differ in the named JSON fields (wire order)
    Update { changed_fields: Vec<String> },
}

impl PermissionDiff {
    /// Returns whether this diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, PermissionDiff::NoChange)
    }
}

/// Compare two typed documents
pub fn diff_documents(current: &PermissionDocument, desired: &PermissionDocument) -> PermissionDiff {
    let current = canonicalize(current.clone(), DedupPolicy::LastWriteWins);
    let desired = canonicalize(desired.clone(), DedupPolicy::LastWriteWins);

    let mut changed_fields = Vec::new();

    for field in DefaultField::ALL {
        if current.default_value(field) != desired.default_value(field) {
            changed_fields.push(field.json_field().to_string());
        }
    }

    for category in Category::ALL {
        if current.collection(category).pairs() != desired.collection(category).pairs() {
            changed_fields.push(category.collection_field().to_string());
        }
    }

    if changed_fields.is_empty() {
        PermissionDiff::NoChange
    } else {
        PermissionDiff::Update { changed_fields }
    }
}

/// Compare two permission sets given as JSON text
pub fn diff_permission_sets(current: &str, desired: &str) -> ProviderResult<PermissionDiff> {
    let current = PermissionDocument::from_json(current)
        .map_err(|e| ProviderError::new("Stored permission set is not valid JSON").with_cause(e))?;
    let desired = PermissionDocument::from_json(desired)
        .map_err(|e| ProviderError::new("Desired permission set is not valid JSON").with_cause(e))?;

    Ok(diff_documents(&current, &desired))
}
