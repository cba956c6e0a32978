//! Android key attestation extension (KeyDescription).
//!
//! Only the fields needed to confirm what was attested are modelled: the
//! security level, the challenge, and the attestation id tags found in either
//! authorization list. Encoding is provided for software keystores.
//!
//! ```text
//! KeyDescription ::= SEQUENCE {
//!     attestationVersion         INTEGER,
//!     attestationSecurityLevel   SecurityLevel,
//!     keymasterVersion           INTEGER,
//!     keymasterSecurityLevel     SecurityLevel,
//!     attestationChallenge       OCTET STRING,
//!     uniqueId                   OCTET STRING,
//!     softwareEnforced           AuthorizationList,
//!     teeEnforced                AuthorizationList,
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::keymaster::AttestationIdTag;

/// OID of the Android key attestation extension (1.3.6.1.4.1.11129.2.1.17).
pub const ANDROID_KEY_ATTESTATION_OID: &[u64] = &[1, 3, 6, 1, 4, 1, 11129, 2, 1, 17];

const CLASS_UNIVERSAL: u8 = 0;
const CLASS_CONTEXT: u8 = 2;

const TAG_INTEGER: u32 = 2;
const TAG_OCTET_STRING: u32 = 4;
const TAG_ENUMERATED: u32 = 10;
const TAG_SEQUENCE: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityLevel {
    Software,
    TrustedEnvironment,
    StrongBox,
    Unknown(i64),
}

impl SecurityLevel {
    fn from_raw(value: i64) -> Self {
        match value {
            0 => Self::Software,
            1 => Self::TrustedEnvironment,
            2 => Self::StrongBox,
            other => Self::Unknown(other),
        }
    }

    fn raw(self) -> i64 {
        match self {
            Self::Software => 0,
            Self::TrustedEnvironment => 1,
            Self::StrongBox => 2,
            Self::Unknown(other) => other,
        }
    }
}

/// Parsed subset of a KeyDescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescription {
    pub attestation_version: i64,
    pub attestation_security_level: SecurityLevel,
    pub keymaster_version: i64,
    pub keymaster_security_level: SecurityLevel,
    pub attestation_challenge: Vec<u8>,
    pub unique_id: Vec<u8>,
    /// Attestation ids from both authorization lists.
    pub attested_ids: BTreeMap<AttestationIdTag, Vec<u8>>,
}

impl KeyDescription {
    /// Parse the DER payload of the attestation extension.
    pub fn from_der(input: &[u8]) -> Result<Self, String> {
        let (rest, body) = read_universal(input, TAG_SEQUENCE, "KeyDescription SEQUENCE")?;
        if !rest.is_empty() {
            return Err("trailing bytes after KeyDescription".to_string());
        }

        let (body, attestation_version) = read_der_integer(body)?;
        let (body, attestation_security_level) = read_der_enumerated(body)?;
        let (body, keymaster_version) = read_der_integer(body)?;
        let (body, keymaster_security_level) = read_der_enumerated(body)?;
        let (body, attestation_challenge) = read_der_octet_string(body)?;
        let (body, unique_id) = read_der_octet_string(body)?;
        let (body, software_enforced) =
            read_universal(body, TAG_SEQUENCE, "softwareEnforced AuthorizationList")?;
        let (_, tee_enforced) = read_universal(body, TAG_SEQUENCE, "teeEnforced AuthorizationList")?;

        let mut attested_ids = BTreeMap::new();
        for list in [software_enforced, tee_enforced] {
            collect_attestation_ids(list, &mut attested_ids)?;
        }

        Ok(Self {
            attestation_version,
            attestation_security_level: SecurityLevel::from_raw(attestation_security_level),
            keymaster_version,
            keymaster_security_level: SecurityLevel::from_raw(keymaster_security_level),
            attestation_challenge: attestation_challenge.to_vec(),
            unique_id: unique_id.to_vec(),
            attested_ids,
        })
    }

    /// DER encoding with every attested id placed in the TEE-enforced list.
    pub fn to_der(&self) -> Vec<u8> {
        let mut tee_enforced = Vec::new();
        for (id, value) in &self.attested_ids {
            let inner = encode_tlv(CLASS_UNIVERSAL, false, TAG_OCTET_STRING, value);
            tee_enforced.extend(encode_tlv(CLASS_CONTEXT, true, id.tag().number(), &inner));
        }

        let mut body = Vec::new();
        body.extend(encode_integer(TAG_INTEGER, self.attestation_version));
        body.extend(encode_integer(
            TAG_ENUMERATED,
            self.attestation_security_level.raw(),
        ));
        body.extend(encode_integer(TAG_INTEGER, self.keymaster_version));
        body.extend(encode_integer(TAG_ENUMERATED, self.keymaster_security_level.raw()));
        body.extend(encode_tlv(
            CLASS_UNIVERSAL,
            false,
            TAG_OCTET_STRING,
            &self.attestation_challenge,
        ));
        body.extend(encode_tlv(CLASS_UNIVERSAL, false, TAG_OCTET_STRING, &self.unique_id));
        body.extend(encode_tlv(CLASS_UNIVERSAL, true, TAG_SEQUENCE, &[]));
        body.extend(encode_tlv(CLASS_UNIVERSAL, true, TAG_SEQUENCE, &tee_enforced));

        encode_tlv(CLASS_UNIVERSAL, true, TAG_SEQUENCE, &body)
    }
}

/// Scan an AuthorizationList for `[tag] EXPLICIT OCTET STRING` attestation ids.
fn collect_attestation_ids(
    mut list: &[u8],
    out: &mut BTreeMap<AttestationIdTag, Vec<u8>>,
) -> Result<(), String> {
    while !list.is_empty() {
        let (next, class, constructed, tag, value) = read_tlv(list)?;
        if class == CLASS_CONTEXT && constructed {
            if let Some(id) = AttestationIdTag::from_number(tag) {
                let (_, bytes) = read_der_octet_string(value)?;
                if out.insert(id, bytes.to_vec()).is_some() {
                    return Err(format!("attestation id tag [{tag}] appears twice"));
                }
            }
        }
        list = next;
    }
    Ok(())
}

fn read_universal<'a>(
    input: &'a [u8],
    expected_tag: u32,
    what: &str,
) -> Result<(&'a [u8], &'a [u8]), String> {
    let (rest, class, _, tag, value) = read_tlv(input)?;
    if class != CLASS_UNIVERSAL || tag != expected_tag {
        return Err(format!("expected {what}"));
    }
    Ok((rest, value))
}

fn read_der_integer(input: &[u8]) -> Result<(&[u8], i64), String> {
    let (rest, value) = read_universal(input, TAG_INTEGER, "INTEGER")?;
    Ok((rest, decode_signed(value, "INTEGER")?))
}

fn read_der_enumerated(input: &[u8]) -> Result<(&[u8], i64), String> {
    let (rest, value) = read_universal(input, TAG_ENUMERATED, "ENUMERATED")?;
    Ok((rest, decode_signed(value, "ENUMERATED")?))
}

fn read_der_octet_string(input: &[u8]) -> Result<(&[u8], &[u8]), String> {
    read_universal(input, TAG_OCTET_STRING, "OCTET STRING")
}

fn decode_signed(value: &[u8], what: &str) -> Result<i64, String> {
    if value.is_empty() || value.len() > 8 {
        return Err(format!("{what} length unsupported"));
    }
    let mut out: i64 = if value[0] & 0x80 != 0 { -1 } else { 0 };
    for &byte in value {
        out = (out << 8) | i64::from(byte);
    }
    Ok(out)
}

/// Split one TLV off `input`: `(rest, class, constructed, tag, value)`.
fn read_tlv(input: &[u8]) -> Result<(&[u8], u8, bool, u32, &[u8]), String> {
    if input.len() < 2 {
        return Err("truncated TLV".to_string());
    }

    let first = input[0];
    let class = first >> 6;
    let constructed = (first & 0b0010_0000) != 0;
    let mut tag: u32 = u32::from(first & 0b0001_1111);
    let mut idx = 1;

    if tag == 0b0001_1111 {
        tag = 0;
        loop {
            if idx >= input.len() {
                return Err("truncated high-tag-number".to_string());
            }
            let b = input[idx];
            idx += 1;
            tag = (tag << 7) | u32::from(b & 0x7f);
            if b & 0x80 == 0 {
                break;
            }
        }
    }

    if idx >= input.len() {
        return Err("truncated length".to_string());
    }
    let len_byte = input[idx];
    idx += 1;

    let len = if len_byte & 0x80 == 0 {
        usize::from(len_byte)
    } else {
        let num = usize::from(len_byte & 0x7f);
        if num == 0 || num > 4 || idx + num > input.len() {
            return Err("invalid long-form length".to_string());
        }
        let mut l = 0usize;
        for &b in &input[idx..idx + num] {
            l = (l << 8) | usize::from(b);
        }
        idx += num;
        l
    };

    if len > input.len() - idx {
        return Err("truncated value".to_string());
    }

    Ok((
        &input[idx + len..],
        class,
        constructed,
        tag,
        &input[idx..idx + len],
    ))
}

fn encode_tlv(class: u8, constructed: bool, tag: u32, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 8);
    let mut first = class << 6;
    if constructed {
        first |= 0b0010_0000;
    }

    if tag < 0b0001_1111 {
        out.push(first | tag as u8);
    } else {
        out.push(first | 0b0001_1111);
        let mut groups = Vec::new();
        let mut t = tag;
        loop {
            groups.push((t & 0x7f) as u8);
            t >>= 7;
            if t == 0 {
                break;
            }
        }
        for (i, group) in groups.iter().rev().enumerate() {
            let more = if i + 1 < groups.len() { 0x80 } else { 0 };
            out.push(group | more);
        }
    }

    let len = value.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }

    out.extend_from_slice(value);
    out
}

/// Minimal two's complement encoding.
fn encode_integer(tag: u32, value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    encode_tlv(CLASS_UNIVERSAL, false, tag, &bytes[start..])
}
