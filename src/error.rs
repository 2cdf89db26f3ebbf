//! Error types for citadel-vds.
//!
//! Every fallible operation in the crate returns [`Result`], and every failure
//! is one of the typed variants of [`VdsError`]. Nothing is logged and
//! swallowed: the façade performs compensating actions and then hands the
//! error back to the caller.

use std::io;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, VdsError>;

/// The main error type for vector and metadata storage operations.
#[derive(Error, Debug)]
pub enum VdsError {
    /// A vector's length differs from the collection's dimensionality.
    #[error("dimension mismatch in collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// A fingerprint that is already live was inserted again.
    #[error("duplicate fingerprint '{fingerprint}'")]
    DuplicateFingerprint { fingerprint: String },

    /// Operation on an unknown fingerprint.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation on a collection that was never created.
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// Persisted index and fingerprint map do not form a valid pair.
    #[error("corrupt persisted state: {0}")]
    CorruptPersistedState(String),

    /// Metadata and vector records disagree at read time.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// The metadata half of an add failed after the vector half succeeded.
    /// The vector insertion has been rolled back when this is returned.
    #[error("metadata write for fingerprint '{fingerprint}' failed, vector insert rolled back: {source}")]
    MetadataWrite {
        fingerprint: String,
        #[source]
        source: Box<VdsError>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VdsError {
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        VdsError::NotFound(msg.into())
    }

    pub fn collection_not_found<S: Into<String>>(name: S) -> Self {
        VdsError::CollectionNotFound(name.into())
    }

    pub fn duplicate<S: Into<String>>(fingerprint: S) -> Self {
        VdsError::DuplicateFingerprint {
            fingerprint: fingerprint.into(),
        }
    }

    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        VdsError::CorruptPersistedState(msg.into())
    }

    pub fn consistency<S: Into<String>>(msg: S) -> Self {
        VdsError::Consistency(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        VdsError::InvalidArgument(msg.into())
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        VdsError::InvalidConfig(msg.into())
    }

    pub fn dimension_mismatch<S: Into<String>>(collection: S, expected: usize, actual: usize) -> Self {
        VdsError::DimensionMismatch {
            collection: collection.into(),
            expected,
            actual,
        }
    }

    /// Whether this error reports an unknown fingerprint or collection.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VdsError::NotFound(_) | VdsError::CollectionNotFound(_))
    }
}
