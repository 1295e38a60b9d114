use std::fmt;

use crate::resource::ResourceType;

/// Error type shared by the store, cache, buffer and client layers.
///
/// "Not found" is not an error anywhere in this crate: single-resource
/// reads return `Option` and absence is a normal result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A variant clone was rejected: the target already exists and no
    /// overwrite was requested, or the protected initial variant was
    /// targeted.
    CloneConflict {
        status: u16,
        code: String,
        title: String,
    },
    /// A backend/transport failure. Propagated unmodified; this layer
    /// never retries (a blind retry of a create or update could duplicate
    /// effects).
    Backend(String),
    /// A resource builder was finalized without a required attribute.
    MissingAttribute {
        kind: ResourceType,
        attribute: &'static str,
    },
    /// An internal lock was poisoned by a panicking thread.
    LockPoisoned(&'static str),
    /// A payload failed to (de)serialize.
    Serde(String),
    /// An extension payload name with no registered type.
    UnknownExtension(String),
    /// A type-erased collection lookup resolved to the wrong attribute
    /// type for the given kind tag. Indicates a wiring defect.
    TypeMismatch { kind: ResourceType },
}

impl StoreError {
    /// A 409 clone conflict with the given code and title.
    pub fn clone_conflict(code: impl Into<String>, title: impl Into<String>) -> Self {
        StoreError::CloneConflict {
            status: 409,
            code: code.into(),
            title: title.into(),
        }
    }

    /// A backend failure with the given message.
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend(message.into())
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::CloneConflict {
                status,
                code,
                title,
            } => {
                write!(f, "variant clone conflict ({}, {}): {}", status, code, title)
            }
            StoreError::Backend(message) => write!(f, "backend failure: {}", message),
            StoreError::MissingAttribute { kind, attribute } => {
                write!(f, "{} resource is missing required '{}'", kind, attribute)
            }
            StoreError::LockPoisoned(operation) => {
                write!(f, "lock poisoned during {}", operation)
            }
            StoreError::Serde(message) => write!(f, "serialization error: {}", message),
            StoreError::UnknownExtension(name) => {
                write!(f, "no extension type registered under '{}'", name)
            }
            StoreError::TypeMismatch { kind } => {
                write!(f, "collection for {} holds an unexpected attribute type", kind)
            }
        }
    }
}

impl std::error::Error for StoreError {}
