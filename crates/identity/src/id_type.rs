//! Identifier types and the immutable attestation request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::AttestationError;
use crate::keymaster::AttestationIdTag;

/// Raw code requesting the device serial number.
pub const ID_TYPE_SERIAL: i32 = 1;
/// Raw code requesting the IMEI.
pub const ID_TYPE_IMEI: i32 = 2;
/// Raw code requesting the MEID.
pub const ID_TYPE_MEID: i32 = 3;

/// Device identifier that can be attested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IdentifierType {
    Serial,
    Imei,
    Meid,
}

impl IdentifierType {
    pub const ALL: [IdentifierType; 3] = [Self::Serial, Self::Imei, Self::Meid];

    pub fn code(self) -> i32 {
        match self {
            Self::Serial => ID_TYPE_SERIAL,
            Self::Imei => ID_TYPE_IMEI,
            Self::Meid => ID_TYPE_MEID,
        }
    }

    /// Attestation tag the identifier bytes are attached to.
    pub fn attestation_tag(self) -> AttestationIdTag {
        match self {
            Self::Serial => AttestationIdTag::Serial,
            Self::Imei => AttestationIdTag::Imei,
            Self::Meid => AttestationIdTag::Meid,
        }
    }

    /// IMEI and MEID are served by the telephony service.
    pub fn requires_telephony(self) -> bool {
        matches!(self, Self::Imei | Self::Meid)
    }
}

impl TryFrom<i32> for IdentifierType {
    type Error = AttestationError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            ID_TYPE_SERIAL => Ok(Self::Serial),
            ID_TYPE_IMEI => Ok(Self::Imei),
            ID_TYPE_MEID => Ok(Self::Meid),
            other => Err(AttestationError::InvalidArgument(format!(
                "Unknown device ID type {other}"
            ))),
        }
    }
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Serial => "serial number",
            Self::Imei => "IMEI",
            Self::Meid => "MEID",
        })
    }
}

/// Identifier types to attest plus the caller's challenge.
///
/// Duplicate types collapse; iteration order is the enum order. An empty
/// challenge is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRequest {
    id_types: BTreeSet<IdentifierType>,
    challenge: Vec<u8>,
}

impl AttestationRequest {
    pub fn new(
        id_types: impl IntoIterator<Item = IdentifierType>,
        challenge: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id_types: id_types.into_iter().collect(),
            challenge: challenge.into(),
        }
    }

    /// Build a request from raw identifier codes, rejecting unknown ones.
    pub fn from_codes(codes: &[i32], challenge: &[u8]) -> crate::Result<Self> {
        let id_types = codes
            .iter()
            .map(|&code| IdentifierType::try_from(code))
            .collect::<crate::Result<BTreeSet<_>>>()?;
        Ok(Self {
            id_types,
            challenge: challenge.to_vec(),
        })
    }

    pub fn identifier_types(&self) -> impl Iterator<Item = IdentifierType> + '_ {
        self.id_types.iter().copied()
    }

    pub fn contains(&self, id_type: IdentifierType) -> bool {
        self.id_types.contains(&id_type)
    }

    pub fn challenge(&self) -> &[u8] {
        &self.challenge
    }

    pub fn requires_telephony(&self) -> bool {
        self.id_types.iter().any(|t| t.requires_telephony())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for id_type in IdentifierType::ALL {
            assert_eq!(IdentifierType::try_from(id_type.code()).unwrap(), id_type);
        }
    }

    #[test]
    fn unknown_code_is_invalid_argument() {
        let err = IdentifierType::try_from(4).unwrap_err();
        assert!(matches!(err, AttestationError::InvalidArgument(ref m) if m.contains('4')));
        assert!(IdentifierType::try_from(0).is_err());
        assert!(IdentifierType::try_from(-1).is_err());
    }

    #[test]
    fn request_collapses_duplicates() {
        let request = AttestationRequest::from_codes(
            &[ID_TYPE_MEID, ID_TYPE_SERIAL, ID_TYPE_MEID, ID_TYPE_SERIAL],
            b"",
        )
        .unwrap();

        let types: Vec<_> = request.identifier_types().collect();
        assert_eq!(types, vec![IdentifierType::Serial, IdentifierType::Meid]);
        assert!(request.requires_telephony());
        assert!(request.challenge().is_empty());
    }

    #[test]
    fn request_rejects_any_unknown_code() {
        assert!(matches!(
            AttestationRequest::from_codes(&[ID_TYPE_SERIAL, 99], b"c"),
            Err(AttestationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn serial_only_needs_no_telephony() {
        let request = AttestationRequest::new([IdentifierType::Serial], b"nonce".to_vec());
        assert!(!request.requires_telephony());
        assert!(request.contains(IdentifierType::Serial));
        assert!(!request.contains(IdentifierType::Imei));
    }
}
