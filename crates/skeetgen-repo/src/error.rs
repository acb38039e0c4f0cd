//! Error types for repository decoding

use std::error::Error;
use std::fmt;

/// Boxed error type for error sources
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result type alias for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

/// Repository decoding error with rich diagnostics
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub struct RepoError {
    kind: RepoErrorKind,
    #[source]
    source: Option<BoxError>,
    #[help]
    help: Option<String>,
    context: Option<String>,
}

/// Error categories for repository decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoErrorKind {
    /// Block referenced by CID is not in the store
    NotFound,
    /// CAR root commit block is absent
    MissingRoot,
    /// CAR header does not have exactly one root
    UnexpectedRootCount,
    /// Invalid MST structure
    InvalidMst,
    /// Invalid commit structure
    InvalidCommit,
    /// Invalid record key format
    InvalidKey,
    /// Block bytes do not match their CID
    InvalidCid,
    /// Serialization/deserialization failed
    Serialization,
    /// CAR file operation failed
    Car,
    /// Operation was cancelled
    Cancelled,
}

impl RepoError {
    /// Create a new error with the given kind and optional source
    pub fn new(kind: RepoErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            help: None,
            context: None,
        }
    }

    /// Add a help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add context information to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> &RepoErrorKind {
        &self.kind
    }

    /// Create a not found error for a block
    pub fn cid_not_found(cid: impl fmt::Display) -> Self {
        Self::new(RepoErrorKind::NotFound, None).with_context(format!("cid not found: {}", cid))
    }

    /// Create a missing root error
    pub fn missing_root(cid: impl fmt::Display) -> Self {
        Self::new(RepoErrorKind::MissingRoot, None)
            .with_context(format!("root commit block not in CAR: {}", cid))
            .with_help("The repository export is incomplete")
    }

    /// Create an unexpected root count error
    pub fn unexpected_root_count(found: usize) -> Self {
        Self::new(RepoErrorKind::UnexpectedRootCount, None)
            .with_context(format!("expected 1 root commit, found {}", found))
            .with_help("Repository exports must have exactly one root CID pointing to the commit")
    }

    /// Create an invalid commit error
    pub fn invalid_commit(msg: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::InvalidCommit, Some(msg.into().into()))
    }

    /// Create an invalid key error
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::InvalidKey, None)
            .with_help("Record keys have the form <collection>/<rkey>")
            .with_context(format!("key: {}", key.into()))
    }

    /// Create an invalid CID error
    pub fn invalid_cid(msg: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::InvalidCid, Some(msg.into().into()))
    }

    /// Create a serialization error
    pub fn serialization(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(RepoErrorKind::Serialization, Some(Box::new(source)))
    }

    /// Create a CAR file error
    pub fn car(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(RepoErrorKind::Car, Some(Box::new(source)))
    }

    /// Create a CAR parse error (alias for car)
    pub fn car_parse(source: impl Error + Send + Sync + 'static) -> Self {
        Self::car(source).with_context("Failed to parse CAR file".to_string())
    }

    /// Create a cancellation error
    pub fn cancelled() -> Self {
        Self::new(RepoErrorKind::Cancelled, None)
    }
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;

        if let Some(ctx) = &self.context {
            write!(f, ": {}", ctx)?;
        }

        if let Some(src) = &self.source {
            write!(f, ": {}", src)?;
        }

        Ok(())
    }
}

// Internal granular errors

/// MST-specific errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum MstError {
    /// Prefix length points past the end of the previous key
    #[error("Prefix length {prefix_len} exceeds previous key length {previous_len}")]
    PrefixOutOfRange {
        /// Prefix length stored in the entry
        prefix_len: usize,
        /// Length of the previous key in the node
        previous_len: usize,
    },

    /// Reconstructed key is not UTF-8
    #[error("Invalid UTF-8 in reconstructed key")]
    InvalidUtf8(#[source] std::string::FromUtf8Error),

    /// Node structure invalid
    #[error("Node structure invalid: {0}")]
    InvalidNode(String),
}

impl From<MstError> for RepoError {
    fn from(e: MstError) -> Self {
        RepoError::new(RepoErrorKind::InvalidMst, Some(Box::new(e)))
            .with_help("MST nodes must follow protocol structure")
    }
}
