//! Error types for archive encoding and decoding

use std::io;

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Archive codec error with diagnostics
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ArchiveError {
    /// The underlying byte stream or sink failed
    #[error("I/O error")]
    #[diagnostic(code(tar::io))]
    Io(#[from] io::Error),

    /// Header checksum does not match the header contents
    #[error("Invalid checksum, expected {expected:?} got {actual}")]
    #[diagnostic(
        code(tar::checksum_mismatch),
        help("The archive is corrupt or is not a tar archive")
    )]
    ChecksumMismatch {
        /// Checksum embedded in the header, if it could be parsed
        expected: Option<u64>,
        /// Checksum computed over the header
        actual: u64,
    },

    /// Header magic is not `ustar`
    #[error("Unsupported archive format: {magic:?}")]
    #[diagnostic(
        code(tar::unsupported_format),
        help("Only ustar archives are supported")
    )]
    UnsupportedFormat {
        /// The magic found in the header
        magic: String,
    },

    /// Stream ended partway through a header record
    #[error("Truncated header: got {len} of 512 bytes")]
    #[diagnostic(code(tar::truncated_header))]
    TruncatedHeader {
        /// Number of header bytes that were available
        len: usize,
    },

    /// Numeric header field is not valid octal
    #[error("Invalid octal value in {field} field")]
    #[diagnostic(code(tar::invalid_octal))]
    InvalidOctal {
        /// Header field name
        field: &'static str,
    },

    /// Stream ended before an entry's declared payload was read
    #[error("Unexpected end of archive inside entry payload")]
    #[diagnostic(code(tar::unexpected_eof))]
    UnexpectedEof,

    /// Filename cannot be represented with a ustar name/prefix split
    #[error("Filename is too long ({len})")]
    #[diagnostic(
        code(tar::name_too_long),
        help("Names over 100 bytes need a '/' leaving at most 100 bytes after it and 155 before it")
    )]
    NameTooLong {
        /// Length of the filename in bytes
        len: usize,
    },

    /// Value does not fit its fixed-width header field
    #[error("Value does not fit in the {field} field")]
    #[diagnostic(code(tar::field_overflow))]
    FieldOverflow {
        /// Header field name
        field: &'static str,
    },
}

impl ArchiveError {
    /// Whether this error comes from a malformed or unsupported header.
    ///
    /// Format errors are fatal for the whole decode.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ArchiveError::ChecksumMismatch { .. }
                | ArchiveError::UnsupportedFormat { .. }
                | ArchiveError::TruncatedHeader { .. }
                | ArchiveError::InvalidOctal { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_errors_are_classified() {
        assert!(ArchiveError::TruncatedHeader { len: 12 }.is_format_error());
        assert!(
            ArchiveError::UnsupportedFormat {
                magic: "gnu".into()
            }
            .is_format_error()
        );
        assert!(!ArchiveError::NameTooLong { len: 300 }.is_format_error());
        assert!(!ArchiveError::UnexpectedEof.is_format_error());
    }

    #[test]
    fn checksum_message() {
        let err = ArchiveError::ChecksumMismatch {
            expected: Some(100),
            actual: 256,
        };
        assert_eq!(err.to_string(), "Invalid checksum, expected Some(100) got 256");
    }
}
