//! Validation of default and access values against category vocabularies

use crate::category::{Category, DefaultField};
use crate::document::PermissionDocument;
use crate::error::MergeError;

/// Check every default and entry access value of a document
///
/// Collects all violations instead of stopping at the first one. Unset
/// defaults are always valid; entry access values must be non-empty members
/// of the category's vocabulary.
pub fn validate_document(doc: &PermissionDocument) -> Result<(), Vec<MergeError>> {
    let mut errors = Vec::new();

    for field in DefaultField::ALL {
        if let Some(value) = doc.default_value(field)
            && !field.is_valid(value)
        {
            errors.push(MergeError::invalid_enum_value(
                field.json_field(),
                value,
                field.allowed_values(),
            ));
        }
    }

    for category in Category::ALL {
        for (key, access) in doc.collection(category).pairs() {
            if !category.is_valid_access(access) {
                errors.push(MergeError::invalid_enum_value(
                    format!("{}[{}].access", category.collection_field(), key),
                    access,
                    category.access_values(),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
