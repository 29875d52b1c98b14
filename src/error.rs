//!
//! [Error] enum definition
//!
use std::{fmt, io};

use x509_parser::error::{PEMError, X509Error};

use crate::object::ObjectKind;

/// Possible errors for codec, issuance and store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IoError(#[from] io::Error),

    #[error(transparent)]
    DerError(#[from] der::Error),

    #[error(transparent)]
    PemError(#[from] PEMError),

    #[error("PEM encoding error: {0}")]
    PemEncodeError(der::pem::Error),

    #[error(transparent)]
    X509Error(#[from] x509_parser::nom::Err<X509Error>),

    #[error("Content is not valid UTF-8")]
    InvalidEncoding,

    #[error("Unrecognized PEM label: {0}")]
    UnrecognizedLabel(String),

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Encrypted private key requires a password")]
    MissingPassword,

    #[error("Failed to decrypt private key: {0}")]
    DecryptionFailed(pkcs8::Error),

    #[error("Expected {expected}, found {found}")]
    TypeMismatch { expected: ObjectKind, found: ObjectKind },

    #[error("Expected exactly one {expected}, found {found}")]
    Cardinality { expected: ObjectKind, found: usize },

    #[error("Unknown object type: {0}")]
    UnknownObjectType(String),

    #[error("Attribute not found: {0}")]
    AttributeNotFound(&'static str),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Signature error: {0}")]
    SignatureError(#[from] signature::Error),

    #[error(transparent)]
    BuilderError(#[from] x509_cert::builder::Error),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Validity period of {0:?} is out of range")]
    ValidityOutOfRange(std::time::Duration),

    #[error("Invalid length")]
    InvalidLength,

    #[error("Private key entry '{0}' requires a certificate")]
    MissingCertificate(String),

    #[error("Alias '{0}' is already used by a different entry type")]
    DuplicateAlias(String),

    #[error("Alias must not be empty")]
    EmptyAlias,

    #[error("Cannot access key entry '{0}': wrong password")]
    KeyStoreAccess(String),

    #[error("TLS context initialization failed: {0}")]
    ContextInit(String),

    #[error(transparent)]
    TlsError(#[from] rustls::Error),
}

/// Error categories reported by [Error::kind]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    Io,
    Format,
    TypeMismatch,
    Cardinality,
    UnknownObjectType,
    AttributeNotFound,
    UnsupportedType,
    Signature,
    Provider,
    MissingCertificate,
    DuplicateAlias,
    KeyStoreAccess,
    ContextInit,
}

impl Error {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::IoError(_) => ErrorKind::Io,
            Error::DerError(_)
            | Error::PemError(_)
            | Error::PemEncodeError(_)
            | Error::X509Error(_)
            | Error::InvalidEncoding
            | Error::UnrecognizedLabel(_)
            | Error::InvalidPrivateKey
            | Error::InvalidPublicKey
            | Error::MissingPassword
            | Error::DecryptionFailed(_)
            | Error::EmptyAlias
            | Error::ValidityOutOfRange(_) => ErrorKind::Format,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::Cardinality { .. } => ErrorKind::Cardinality,
            Error::UnknownObjectType(_) => ErrorKind::UnknownObjectType,
            Error::AttributeNotFound(_) => ErrorKind::AttributeNotFound,
            Error::UnsupportedType(_) => ErrorKind::UnsupportedType,
            Error::SignatureError(_) => ErrorKind::Signature,
            Error::BuilderError(x509_cert::builder::Error::Signature(_)) => ErrorKind::Signature,
            Error::BuilderError(_) => ErrorKind::Format,
            Error::KeyGeneration(_) | Error::InvalidLength => ErrorKind::Provider,
            Error::MissingCertificate(_) => ErrorKind::MissingCertificate,
            Error::DuplicateAlias(_) => ErrorKind::DuplicateAlias,
            Error::KeyStoreAccess(_) => ErrorKind::KeyStoreAccess,
            Error::ContextInit(_) | Error::TlsError(_) => ErrorKind::ContextInit,
        }
    }
}

impl From<der::pem::Error> for Error {
    fn from(e: der::pem::Error) -> Self {
        Error::PemEncodeError(e)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
