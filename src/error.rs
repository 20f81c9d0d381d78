//! Error types shared by every module.

use thiserror::Error;

/// Represents errors that can occur while building subjects, requests,
/// certificates and CA hierarchies.
///
/// Every variant carries a human readable message. No error is recovered
/// internally; they all propagate to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaError {
    /// A subject field violates its length or character-class constraint,
    /// or a required field is blank when the name is built.
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// PEM input is empty or holds an object of the wrong kind.
    #[error("Invalid PEM input: {0}")]
    FormatError(String),

    /// The signer cannot be constructed for the requested algorithm and key,
    /// or a signature does not verify.
    #[error("Signing error: {0}")]
    SigningError(String),

    /// An X.509 extension value cannot be encoded.
    #[error("Extension error: {0}")]
    ExtensionError(String),

    /// The underlying writer or reader failed.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// The declared CA hierarchy cannot be ordered.
    #[error("Hierarchy error: {0}")]
    HierarchyError(String),
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, CaError>;

impl From<der::Error> for CaError {
    /// Converts a `der::Error` into a `CaError`.
    fn from(err: der::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<x509_cert::spki::Error> for CaError {
    fn from(err: x509_cert::spki::Error) -> Self {
        CaError::EncodingError(err.to_string())
    }
}

impl From<pkcs8::Error> for CaError {
    fn from(err: pkcs8::Error) -> Self {
        CaError::EncodingError(err.to_string())
    }
}

impl From<rsa::Error> for CaError {
    fn from(err: rsa::Error) -> Self {
        CaError::KeyGenerationError(err.to_string())
    }
}

impl From<pem::PemError> for CaError {
    fn from(err: pem::PemError) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<std::io::Error> for CaError {
    fn from(err: std::io::Error) -> Self {
        CaError::IoError(err.to_string())
    }
}
