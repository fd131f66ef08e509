//! Error types for parsing, validating and merging permission documents

use thiserror::Error;

/// Errors raised by the merge engine
#[derive(Debug, Error)]
pub enum MergeError {
    /// The base document could not be parsed
    #[error("Malformed base permission set: {0}")]
    MalformedBase(#[source] serde_json::Error),

    /// An override document could not be parsed
    #[error("Malformed override permission set at index {index}: {cause}")]
    MalformedOverride {
        index: usize,
        #[source]
        cause: serde_json::Error,
    },

    /// A default or access value is outside its category's vocabulary
    #[error("Invalid value '{value}' for {field}, expected one of: {}", expected.join(", "))]
    InvalidEnumValue {
        field: String,
        value: String,
        expected: Vec<String>,
    },

    /// An override failed validation
    #[error("Override permission set at index {index} is invalid: {source}")]
    InvalidOverride {
        index: usize,
        source: Box<MergeError>,
    },

    /// The merged document could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl MergeError {
    pub fn invalid_enum_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: &[&str],
    ) -> Self {
        Self::InvalidEnumValue {
            field: field.into(),
            value: value.into(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Position of the offending override, if the error concerns one
    pub fn override_index(&self) -> Option<usize> {
        match self {
            Self::MalformedOverride { index, .. } | Self::InvalidOverride { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }
}

/// Result type for merge operations
pub type MergeResult<T> = Result<T, MergeError>;
