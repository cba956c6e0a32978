//! Error types for device identifier attestation.
//!
//! Every failed call yields exactly one [`AttestationError`]. Permission
//! failures keep their own variant so callers can tell "not allowed" apart
//! from "attestation did not work".

use std::fmt;
use thiserror::Error;

use crate::id_type::IdentifierType;
use crate::keymaster::KeystoreErrorCode;
use crate::source::SourceError;

/// Errors that can occur while attesting device identifiers.
#[derive(Debug, Error)]
pub enum AttestationError {
    /// Caller lacks the rights to read device identifiers
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Unknown identifier type or otherwise unusable input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Identifier source unreachable or returned nothing
    #[error("Unable to retrieve {0}")]
    IdentifierUnavailable(UnavailableIdentifier),

    /// A stale key under the freshly derived alias could not be removed
    #[error("Unable to remove temporary key '{alias}'")]
    TemporaryKeyRemoval { alias: String },

    /// Keystore rejected key generation or attestation
    #[error("Unable to {operation}: {code}")]
    Keystore {
        operation: KeystoreOperation,
        code: KeystoreErrorCode,
    },

    /// Certificate chain too short or undecodable
    #[error("Malformed attestation chain: {0}")]
    MalformedChain(String),
}

impl AttestationError {
    /// Keystore status carried by this error, if any.
    pub fn keystore_code(&self) -> Option<KeystoreErrorCode> {
        match self {
            Self::Keystore { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<SourceError> for AttestationError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::PermissionDenied(reason) => Self::PermissionDenied(reason),
        }
    }
}

/// What could not be retrieved from the identifier source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableIdentifier {
    TelephonyService,
    Identifier(IdentifierType),
}

impl fmt::Display for UnavailableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TelephonyService => f.write_str("telephony service"),
            Self::Identifier(id_type) => write!(f, "{id_type}"),
        }
    }
}

/// Keystore step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeystoreOperation {
    Generate,
    Attest,
}

impl fmt::Display for KeystoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate => f.write_str("create temporary key"),
            Self::Attest => f.write_str("perform attestation"),
        }
    }
}

/// Result type for attestation operations.
pub type Result<T> = std::result::Result<T, AttestationError>;
