//! Hardware-backed attestation of device identifiers.
//!
//! This crate asks a secure keystore to attest a device's serial number,
//! IMEI or MEID, bound to a caller-supplied challenge, using a temporary key
//! that never outlives the call.
//!
//! # Core Concepts
//!
//! - **Identifier Types**: closed set of attestable identifiers (serial, IMEI, MEID)
//! - **Ephemeral Key**: RSA-2048 verify-only key, created and destroyed per call
//! - **Key Alias**: `<prefix>-<pid>-<seq>`, unique across concurrent calls
//! - **Attestation Chain**: decoded certificates, leaf first, leaf carrying the ids
//!
//! # Security Model
//!
//! - The temporary key is deleted on every exit path, including panics
//! - Permission denials are reported as their own error, never wrapped
//! - Chains are structurally validated; they are not cryptographically verified
//!
//! # Integration Points
//!
//! Hosts provide a [`Keystore`], a [`DeviceIdSource`] and optionally a
//! [`CertificateDecoder`]; the default decoder is backed by `x509-parser`.

pub mod attestation;
pub mod chain;
pub mod error;
pub mod id_type;
pub mod key_description;
pub mod keymaster;
pub mod keystore;
pub mod source;

pub use attestation::{ephemeral_key_params, DeviceIdAttestor};
pub use chain::{
    decode_chain, AttestationCertificate, AttestationChain, CertificateDecoder, DecodeError,
    X509ChainDecoder, MIN_CHAIN_LENGTH,
};
pub use error::{AttestationError, KeystoreOperation, Result, UnavailableIdentifier};
pub use id_type::{
    AttestationRequest, IdentifierType, ID_TYPE_IMEI, ID_TYPE_MEID, ID_TYPE_SERIAL,
};
pub use key_description::{KeyDescription, SecurityLevel, ANDROID_KEY_ATTESTATION_OID};
pub use keymaster::{
    AttestationIdTag, AuthorizationSet, KeyCharacteristics, KeyParam, KeystoreErrorCode, Tag,
};
pub use keystore::{KeyAlias, Keystore};
pub use source::{BuildProperties, DeviceIdSource, SourceError, StaticDeviceIds, TelephonyService};

// Re-export the settings type the attestor is configured with
pub use devid_core::AttestationSettings;
