//! Error types for the signing pipeline.
//!
//! Every failure the pipeline can produce is a variant of [`Error`]. The
//! variants are fine-grained so messages stay precise, and [`Error::kind`]
//! folds them into the five kinds a caller acts on.

/// Result type alias for signing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while signing a document.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// The key container could not be opened with the supplied password,
    /// or it is not a well-formed container.
    #[error("Cannot open key container: {0}")]
    Authentication(String),

    /// The key container holds no private-key entry.
    #[error("Key container has no private key entry")]
    NoKeyEntry,

    /// The document cannot be used as a signing target.
    #[error("Invalid document structure: {0}")]
    DocumentStructure(String),

    /// Producing the signature container failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The coarse error classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong container password or malformed container.
    Authentication,
    /// No usable private-key entry in the container.
    NoKeyEntry,
    /// Unreadable document or field reservation conflict.
    DocumentStructure,
    /// Algorithm mismatch or signature container overflow.
    Signing,
    /// Filesystem failure on one of the file handles.
    Io,
}

impl ErrorKind {
    /// Stable lowercase name, used by the command line front end.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::NoKeyEntry => "no-key-entry",
            ErrorKind::DocumentStructure => "document-structure",
            ErrorKind::Signing => "signing",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication(_) => ErrorKind::Authentication,
            Error::NoKeyEntry => ErrorKind::NoKeyEntry,
            Error::Signing(_) => ErrorKind::Signing,
            Error::Io(_) => ErrorKind::Io,
            Error::DocumentStructure(_)
            | Error::InvalidHeader(_)
            | Error::ParseError { .. }
            | Error::InvalidXref
            | Error::ObjectNotFound(..)
            | Error::InvalidObjectType { .. }
            | Error::Decode(_) => ErrorKind::DocumentStructure,
        }
    }

    pub(crate) fn structure(message: impl Into<String>) -> Self {
        Error::DocumentStructure(message.into())
    }
}
