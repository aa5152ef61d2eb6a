//! Error taxonomy for the photo pipeline
//!
//! Validation and codec failures are caller/data errors and are never
//! retried. Backend failures are transient from the orchestrator's point of
//! view: they trigger fallback to the next configured adapter and only
//! surface once the whole chain is exhausted.

use thiserror::Error;

use crate::storage::StorageKind;

/// Caller-side validation failure. Reported verbatim, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{filename} is not an image file")]
    NotAnImage { filename: String },

    #[error("file type not supported for {filename}. Use JPG, PNG, GIF, or WebP")]
    UnsupportedExtension { filename: String },

    #[error("{filename} is too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },

    #[error("cannot upload more than {max_photos} photos ({existing} stored, {incoming} new)")]
    TooManyPhotos {
        max_photos: usize,
        existing: usize,
        incoming: usize,
    },
}

/// Image codec failure. Non-retryable; inside an adapter it counts as that
/// adapter's failure and triggers fallback.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed image payload: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),
}

/// Failure raised by a single storage adapter.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("{kind} backend error: {message}")]
    Backend { kind: StorageKind, message: String },
}

impl StorageError {
    /// Wrap an arbitrary backend failure, tagged with the adapter it came from.
    pub fn backend(kind: StorageKind, err: impl std::fmt::Display) -> Self {
        StorageError::Backend {
            kind,
            message: err.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StorageError::Validation(_))
    }
}
