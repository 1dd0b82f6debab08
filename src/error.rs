//! Error types for nocturne-memory.

use thiserror::Error;

/// Result type alias using nocturne-memory's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during memory and review operations.
#[derive(Error, Debug)]
pub enum Error {
    /// URI, session or snapshot does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A path with this URI already exists
    #[error("URI already exists: {uri}")]
    DuplicateUri { uri: String },

    /// Title segment violates the allowed charset
    #[error("Invalid title '{title}': only lowercase letters, digits, '_' and '-' are allowed")]
    InvalidTitle { title: String },

    /// URI could not be parsed or names an unknown domain
    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Patch `old_string` does not occur in the content
    #[error("old_string not found in {uri}")]
    NoMatch { uri: String },

    /// Patch `old_string` occurs more than once
    #[error("old_string occurs {count} times in {uri}; it must be unique")]
    AmbiguousMatch { uri: String, count: usize },

    /// Creation parent does not exist
    #[error("Parent not found: {0}")]
    ParentNotFound(String),

    /// Alias target does not exist
    #[error("Alias target not found: {0}")]
    TargetNotFound(String),

    /// Argument combination is not valid for the operation
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Mutation targeted a read-only system view
    #[error("{0} is a read-only system view")]
    ReadOnly(String),

    /// Underlying SQLite failure
    #[error("Memory storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store invariants were violated; the data needs operator attention
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a duplicate URI error.
    pub fn duplicate_uri(uri: impl Into<String>) -> Self {
        Self::DuplicateUri { uri: uri.into() }
    }

    /// Create an invalid title error.
    pub fn invalid_title(title: impl Into<String>) -> Self {
        Self::InvalidTitle {
            title: title.into(),
        }
    }

    /// Create an invalid URI error.
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid arguments error.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments(message.into())
    }

    /// Whether the error was caused by the caller's input rather than a fault
    /// in the store.
    pub fn is_caller_error(&self) -> bool {
        !matches!(
            self,
            Self::Storage(_) | Self::Serialization(_) | Self::Integrity(_) | Self::Internal(_)
        )
    }

    /// Short machine-readable kind, used by the tool surface.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::DuplicateUri { .. } => "duplicate_uri",
            Self::InvalidTitle { .. } => "invalid_title",
            Self::InvalidUri { .. } => "invalid_uri",
            Self::NoMatch { .. } => "no_match",
            Self::AmbiguousMatch { .. } => "ambiguous_match",
            Self::ParentNotFound(_) => "parent_not_found",
            Self::TargetNotFound(_) => "target_not_found",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::ReadOnly(_) => "read_only",
            Self::Storage(_) => "storage",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
            Self::Integrity(_) => "integrity",
            Self::Internal(_) => "internal",
        }
    }
}
