//! Pipeline errors

use skeetgen_repo::{RepoError, RepoErrorKind};
use skeetgen_tar::ArchiveError;
use std::error::Error as StdError;
use std::io;

/// Boxed error type for error sources
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the archive pipelines
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    /// Input or output archive is malformed, or its stream failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] ArchiveError),

    /// Repository could not be decoded
    #[error(transparent)]
    #[diagnostic(transparent)]
    Repo(RepoError),

    /// An entry every export must contain is absent
    #[error("{name} not found inside the archive")]
    #[diagnostic(
        code(skeetgen::missing_entry),
        help("Inputs must contain both did.json and repo.car at the top level")
    )]
    MissingRequiredEntry {
        /// Entry name
        name: &'static str,
    },

    /// did.json is not a DID document
    #[error("failed to read did document")]
    #[diagnostic(code(skeetgen::invalid_did_document))]
    InvalidDidDocument(#[source] Option<serde_json::Error>),

    /// Configuration file is invalid
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(skeetgen::config))]
    Config(String),

    /// Output record could not be encoded
    #[error("failed to encode {path}")]
    #[diagnostic(code(skeetgen::encode))]
    Encode {
        /// Archive path of the entry being written
        path: String,
        /// Underlying encoder error
        #[source]
        source: BoxError,
    },

    /// Filesystem access failed
    #[error("I/O error")]
    #[diagnostic(code(skeetgen::io))]
    Io(#[from] io::Error),

    /// The operation was cancelled
    #[error("operation cancelled")]
    #[diagnostic(code(skeetgen::cancelled))]
    Cancelled,
}

impl Error {
    /// Create an encode error for the entry at `path`
    pub fn encode(path: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Error::Encode {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error stems from cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<RepoError> for Error {
    fn from(e: RepoError) -> Self {
        match e.kind() {
            RepoErrorKind::Cancelled => Error::Cancelled,
            _ => Error::Repo(e),
        }
    }
}
