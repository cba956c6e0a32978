//! Keymaster parameter model shared with keystore backends.
//!
//! Tags carry their keymaster numeric value (type bits | tag number) so a
//! backend can serialise an [`AuthorizationSet`] without a second mapping.

use serde::{Deserialize, Serialize};
use std::fmt;

const KM_ENUM: u32 = 1 << 28;
const KM_ENUM_REP: u32 = 2 << 28;
const KM_UINT: u32 = 3 << 28;
const KM_ULONG: u32 = 5 << 28;
const KM_BOOL: u32 = 7 << 28;
const KM_BYTES: u32 = 9 << 28;

/// Size of the ephemeral attestation key in bits.
pub const RSA_KEY_SIZE: u32 = 2048;

/// RSA public exponent F4.
pub const RSA_F4: u64 = 65537;

/// Keymaster tags used on the attestation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Tag {
    Purpose = KM_ENUM_REP | 1,
    Algorithm = KM_ENUM | 2,
    KeySize = KM_UINT | 3,
    Digest = KM_ENUM_REP | 5,
    Padding = KM_ENUM_REP | 6,
    RsaPublicExponent = KM_ULONG | 200,
    NoAuthRequired = KM_BOOL | 503,
    AttestationChallenge = KM_BYTES | 708,
    AttestationIdBrand = KM_BYTES | 710,
    AttestationIdDevice = KM_BYTES | 711,
    AttestationIdProduct = KM_BYTES | 712,
    AttestationIdSerial = KM_BYTES | 713,
    AttestationIdImei = KM_BYTES | 714,
    AttestationIdMeid = KM_BYTES | 715,
    AttestationIdManufacturer = KM_BYTES | 716,
    AttestationIdModel = KM_BYTES | 717,
}

impl Tag {
    /// Full keymaster tag value including the type bits.
    pub fn value(self) -> u32 {
        self as u32
    }

    /// Tag number without type bits; this is the context tag used in the
    /// attestation extension's authorization lists.
    pub fn number(self) -> u32 {
        self.value() & 0x0fff_ffff
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPurpose {
    Encrypt = 0,
    Decrypt = 1,
    Sign = 2,
    Verify = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    Rsa = 1,
    Ec = 3,
    Aes = 32,
    Hmac = 128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaddingMode {
    None = 1,
    RsaOaep = 2,
    RsaPss = 3,
    RsaPkcs115Encrypt = 4,
    RsaPkcs115Sign = 5,
    Pkcs7 = 64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Digest {
    None = 0,
    Md5 = 1,
    Sha1 = 2,
    Sha224 = 3,
    Sha256 = 4,
    Sha384 = 5,
    Sha512 = 6,
}

/// Attestation id tags, declared in ascending tag order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttestationIdTag {
    Brand,
    Device,
    Product,
    Serial,
    Imei,
    Meid,
    Manufacturer,
    Model,
}

impl AttestationIdTag {
    pub const ALL: [AttestationIdTag; 8] = [
        Self::Brand,
        Self::Device,
        Self::Product,
        Self::Serial,
        Self::Imei,
        Self::Meid,
        Self::Manufacturer,
        Self::Model,
    ];

    /// Build metadata tags attached to every attestation.
    pub const METADATA: [AttestationIdTag; 5] = [
        Self::Brand,
        Self::Device,
        Self::Product,
        Self::Manufacturer,
        Self::Model,
    ];

    pub fn tag(self) -> Tag {
        match self {
            Self::Brand => Tag::AttestationIdBrand,
            Self::Device => Tag::AttestationIdDevice,
            Self::Product => Tag::AttestationIdProduct,
            Self::Serial => Tag::AttestationIdSerial,
            Self::Imei => Tag::AttestationIdImei,
            Self::Meid => Tag::AttestationIdMeid,
            Self::Manufacturer => Tag::AttestationIdManufacturer,
            Self::Model => Tag::AttestationIdModel,
        }
    }

    /// Reverse lookup from an authorization-list tag number.
    pub fn from_number(number: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag().number() == number)
    }
}

/// A single typed keymaster parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyParam {
    Purpose(KeyPurpose),
    Algorithm(Algorithm),
    KeySize(u32),
    Digest(Digest),
    Padding(PaddingMode),
    RsaPublicExponent(u64),
    NoAuthRequired,
    AttestationChallenge(Vec<u8>),
    AttestationId(AttestationIdTag, Vec<u8>),
}

impl KeyParam {
    pub fn tag(&self) -> Tag {
        match self {
            Self::Purpose(_) => Tag::Purpose,
            Self::Algorithm(_) => Tag::Algorithm,
            Self::KeySize(_) => Tag::KeySize,
            Self::Digest(_) => Tag::Digest,
            Self::Padding(_) => Tag::Padding,
            Self::RsaPublicExponent(_) => Tag::RsaPublicExponent,
            Self::NoAuthRequired => Tag::NoAuthRequired,
            Self::AttestationChallenge(_) => Tag::AttestationChallenge,
            Self::AttestationId(id, _) => id.tag(),
        }
    }

    /// Payload of byte-valued parameters.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::AttestationChallenge(value) | Self::AttestationId(_, value) => Some(value),
            _ => None,
        }
    }
}

/// Ordered list of keymaster parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationSet {
    params: Vec<KeyParam>,
}

impl AuthorizationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, param: KeyParam) {
        self.params.push(param);
    }

    pub fn with(mut self, param: KeyParam) -> Self {
        self.push(param);
        self
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyParam> {
        self.params.iter()
    }

    /// First parameter carrying `tag`.
    pub fn get(&self, tag: Tag) -> Option<&KeyParam> {
        self.params.iter().find(|p| p.tag() == tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.get(tag).is_some()
    }

    pub fn challenge(&self) -> Option<&[u8]> {
        self.get(Tag::AttestationChallenge).and_then(KeyParam::bytes)
    }

    /// Attestation id parameters in insertion order.
    pub fn attestation_ids(&self) -> impl Iterator<Item = (AttestationIdTag, &[u8])> {
        self.params.iter().filter_map(|p| match p {
            KeyParam::AttestationId(id, value) => Some((*id, value.as_slice())),
            _ => None,
        })
    }
}

impl FromIterator<KeyParam> for AuthorizationSet {
    fn from_iter<I: IntoIterator<Item = KeyParam>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

/// Characteristics reported by a keystore after key generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCharacteristics {
    pub hardware_enforced: AuthorizationSet,
    pub software_enforced: AuthorizationSet,
}

/// Non-success status returned by a keystore.
///
/// Raw status `0` means success and is never represented by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeystoreErrorCode(i32);

impl KeystoreErrorCode {
    pub const NO_ERROR: i32 = 0;

    pub const LOCKED: Self = Self(2);
    pub const UNINITIALIZED: Self = Self(3);
    pub const SYSTEM_ERROR: Self = Self(4);
    pub const PERMISSION_DENIED: Self = Self(6);
    pub const KEY_NOT_FOUND: Self = Self(7);
    pub const VALUE_CORRUPTED: Self = Self(8);
    pub const OP_AUTH_NEEDED: Self = Self(15);

    pub const UNSUPPORTED_PURPOSE: Self = Self(-2);
    pub const UNSUPPORTED_ALGORITHM: Self = Self(-4);
    pub const UNSUPPORTED_KEY_SIZE: Self = Self(-6);
    pub const UNSUPPORTED_PADDING_MODE: Self = Self(-10);
    pub const UNSUPPORTED_DIGEST: Self = Self(-12);
    pub const INVALID_KEY_BLOB: Self = Self(-28);
    pub const INVALID_ARGUMENT: Self = Self(-38);
    pub const UNSUPPORTED_TAG: Self = Self(-58);
    pub const CANNOT_ATTEST_IDS: Self = Self(-66);
    pub const UNKNOWN_ERROR: Self = Self(-1000);

    /// Wrap a raw status; `None` for success.
    pub fn new(raw: i32) -> Option<Self> {
        (raw != Self::NO_ERROR).then_some(Self(raw))
    }

    /// Turn a raw status into a `Result`.
    pub fn check(raw: i32) -> Result<(), Self> {
        match Self::new(raw) {
            None => Ok(()),
            Some(code) => Err(code),
        }
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn description(self) -> &'static str {
        match self.0 {
            2 => "keystore locked",
            3 => "keystore not initialized",
            4 => "system error",
            6 => "permission denied",
            7 => "key not found",
            8 => "key blob corrupted",
            15 => "operation requires authorization",
            -2 => "unsupported key purpose",
            -4 => "unsupported key algorithm",
            -6 => "unsupported key size",
            -10 => "unsupported padding mode",
            -12 => "unsupported digest",
            -28 => "invalid key blob",
            -38 => "invalid argument",
            -58 => "unsupported tag",
            -66 => "device does not support id attestation",
            _ => "unknown error",
        }
    }
}

impl fmt::Display for KeystoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.0)
    }
}
