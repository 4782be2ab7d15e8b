//! Error types shared across Tessera.
//!
//! Failures are grouped by subsystem ([`IndexError`], [`CacheError`],
//! [`StorageError`]) and wrapped by the crate-wide [`Error`].
//!
//! A cache that cannot make room for an object is not an error: the object
//! is handed back uncached and the caller carries on with it.

use thiserror::Error;

/// Result type alias using the crate-wide [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Error, Debug)]
pub enum Error {
    /// Index-level failure.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Object cache failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Persistence failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A feature the model deliberately does not support.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant broken.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised by attribute indices.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// A unique index already maps the key to an object.
    #[error("unique constraint violated on index '{index}' for key {key}")]
    UniqueConstraintViolation {
        /// Index name.
        index: String,
        /// Rendered key.
        key: String,
    },

    /// The requested index type is not registered.
    #[error("index type '{requested}' is not available (known: {available})")]
    IndexTypeMismatch {
        /// Requested type tag.
        requested: String,
        /// Comma-separated registered tags.
        available: String,
    },

    /// A key does not match the index's key definition.
    #[error("key has {found} components but the index defines {expected}")]
    KeyArity {
        /// Components in the definition.
        expected: usize,
        /// Components in the supplied key.
        found: usize,
    },

    /// Operation on an index that was never initialized.
    #[error("index '{0}' is not initialized")]
    NotInitialized(String),

    /// Operation on a dropped index.
    #[error("index '{0}' has been dropped")]
    Dropped(String),

    /// No index with that name.
    #[error("index '{0}' not found")]
    NotFound(String),

    /// An index with that name already exists.
    #[error("index '{0}' already exists")]
    AlreadyExists(String),

    /// Index configuration is invalid.
    #[error("invalid index configuration: {0}")]
    InvalidConfig(String),

    /// The attribute resolver does not know the attribute.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),
}

/// Errors raised by the object cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No object exists at the location.
    #[error("no object found at location '{0}'")]
    LocatorNotFound(String),

    /// The loader failed to materialize a shard.
    #[error("failed to load shard at '{location}': {cause}")]
    ShardLoadFailed {
        /// Location that was being loaded.
        location: String,
        /// Underlying failure.
        #[source]
        cause: Box<Error>,
    },
}

/// Errors raised by persistence backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Persisted bytes failed validation.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// Nothing is persisted at the location.
    #[error("nothing stored at '{0}'")]
    NotFound(String),

    /// A non-overwriting store hit an existing object.
    #[error("object already stored at '{0}'")]
    AlreadyExists(String),

    /// The location cannot be mapped onto the backend.
    #[error("invalid storage location '{0}'")]
    InvalidLocation(String),
}

impl Error {
    /// Returns true if this is a uniqueness violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Index(IndexError::UniqueConstraintViolation { .. })
        )
    }
}
