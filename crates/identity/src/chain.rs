//! Attestation certificate chains.
//!
//! A keystore returns the chain as separate DER blobs. They are concatenated
//! and decoded as one stream of certificates, leaf first.

use std::sync::Arc;
use thiserror::Error;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::error::AttestationError;
use crate::key_description::{KeyDescription, ANDROID_KEY_ATTESTATION_OID};

/// Minimum number of certificates in an attestation chain (leaf + issuer).
pub const MIN_CHAIN_LENGTH: usize = 2;

/// Decoder failure. Never surfaced to callers directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty certificate stream")]
    Empty,

    #[error("X.509 parse failure at offset {offset}: {reason}")]
    Parse { offset: usize, reason: String },
}

/// Decodes a concatenated DER stream into certificates, in stream order.
pub trait CertificateDecoder {
    fn decode(&self, stream: &[u8]) -> Result<Vec<AttestationCertificate>, DecodeError>;
}

impl<T: CertificateDecoder + ?Sized> CertificateDecoder for Arc<T> {
    fn decode(&self, stream: &[u8]) -> Result<Vec<AttestationCertificate>, DecodeError> {
        (**self).decode(stream)
    }
}

/// Default decoder backed by `x509-parser`.
#[derive(Debug, Clone, Copy, Default)]
pub struct X509ChainDecoder;

impl CertificateDecoder for X509ChainDecoder {
    fn decode(&self, stream: &[u8]) -> Result<Vec<AttestationCertificate>, DecodeError> {
        if stream.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut certificates = Vec::new();
        let mut rest = stream;
        while !rest.is_empty() {
            let offset = stream.len() - rest.len();
            let (remaining, parsed) =
                X509Certificate::from_der(rest).map_err(|e| DecodeError::Parse {
                    offset,
                    reason: e.to_string(),
                })?;
            let consumed = rest.len() - remaining.len();
            certificates.push(AttestationCertificate::from_parsed(
                &rest[..consumed],
                &parsed,
            ));
            rest = remaining;
        }
        Ok(certificates)
    }
}

/// Owned view of one decoded certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationCertificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    serial: String,
    attestation_extension: Option<Vec<u8>>,
}

impl AttestationCertificate {
    fn from_parsed(der: &[u8], cert: &X509Certificate<'_>) -> Self {
        let attestation_extension = cert
            .extensions()
            .iter()
            .find(|ext| {
                ext.oid
                    .iter()
                    .map(|arcs| arcs.eq(ANDROID_KEY_ATTESTATION_OID.iter().copied()))
                    .unwrap_or(false)
            })
            .map(|ext| ext.value.to_vec());

        Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: hex::encode(cert.raw_serial()),
            attestation_extension,
        }
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Serial number as lowercase hex.
    pub fn serial_hex(&self) -> &str {
        &self.serial
    }

    /// Raw payload of the Android key attestation extension.
    pub fn attestation_extension(&self) -> Option<&[u8]> {
        self.attestation_extension.as_deref()
    }

    /// Parse the attestation extension to see what was attested.
    pub fn key_description(&self) -> crate::Result<KeyDescription> {
        let payload = self.attestation_extension().ok_or_else(|| {
            AttestationError::MalformedChain("missing key attestation extension".to_string())
        })?;
        KeyDescription::from_der(payload).map_err(|reason| {
            AttestationError::MalformedChain(format!("malformed key attestation extension: {reason}"))
        })
    }
}

/// Decoded attestation chain, leaf first. Always holds at least
/// [`MIN_CHAIN_LENGTH`] certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationChain {
    certificates: Vec<AttestationCertificate>,
}

impl AttestationChain {
    fn new(certificates: Vec<AttestationCertificate>) -> crate::Result<Self> {
        if certificates.len() < MIN_CHAIN_LENGTH {
            return Err(AttestationError::MalformedChain(format!(
                "decoded chain contained {} certificates; at least {MIN_CHAIN_LENGTH} are required",
                certificates.len()
            )));
        }
        Ok(Self { certificates })
    }

    /// Certificate carrying the attested identifiers.
    pub fn leaf(&self) -> &AttestationCertificate {
        &self.certificates[0]
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttestationCertificate> {
        self.certificates.iter()
    }

    pub fn into_vec(self) -> Vec<AttestationCertificate> {
        self.certificates
    }
}

impl IntoIterator for AttestationChain {
    type Item = AttestationCertificate;
    type IntoIter = std::vec::IntoIter<AttestationCertificate>;

    fn into_iter(self) -> Self::IntoIter {
        self.certificates.into_iter()
    }
}

/// Validate the raw chain shape, concatenate, and decode.
///
/// Short chains are rejected before the decoder runs; decoder errors are
/// folded into [`AttestationError::MalformedChain`].
pub fn decode_chain<D: CertificateDecoder + ?Sized>(
    decoder: &D,
    raw_chain: &[Vec<u8>],
) -> crate::Result<AttestationChain> {
    if raw_chain.len() < MIN_CHAIN_LENGTH {
        return Err(AttestationError::MalformedChain(format!(
            "Attestation certificate chain contained {} entries. At least two are required.",
            raw_chain.len()
        )));
    }

    let stream = raw_chain.concat();
    let certificates = decoder.decode(&stream).map_err(|e| {
        AttestationError::MalformedChain(format!("Unable to construct certificate chain: {e}"))
    })?;
    AttestationChain::new(certificates)
}
