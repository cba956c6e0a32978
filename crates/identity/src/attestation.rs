//! Device identifier attestation with an ephemeral keystore key.
//!
//! One call runs a fixed, blocking sequence against the collaborators:
//!
//! 1. Collect the requested identifiers and the build metadata
//! 2. Derive a fresh alias `<prefix>-<pid>-<seq>`
//! 3. Remove any stale key under that alias
//! 4. Generate an RSA-2048 verify-only key
//! 5. Attest it with the collected tags
//! 6. Delete the key, on every exit path
//! 7. Decode the returned chain, leaf first
//!
//! Nothing but the process-wide alias counter is shared between calls, so an
//! attestor can be used from many threads at once.

use devid_core::AttestationSettings;
use tracing::{debug, info};

use crate::chain::{decode_chain, AttestationChain, CertificateDecoder, X509ChainDecoder};
use crate::error::{AttestationError, KeystoreOperation, UnavailableIdentifier};
use crate::id_type::{AttestationRequest, IdentifierType};
use crate::keymaster::{
    Algorithm, AttestationIdTag, AuthorizationSet, Digest, KeyParam, KeyPurpose, PaddingMode,
    RSA_F4, RSA_KEY_SIZE,
};
use crate::keystore::{EphemeralKey, KeyAlias, Keystore};
use crate::source::{DeviceIdSource, TelephonyService};

/// Parameters of the temporary key: usable for nothing but this attestation.
pub fn ephemeral_key_params() -> AuthorizationSet {
    AuthorizationSet::new()
        .with(KeyParam::Purpose(KeyPurpose::Verify))
        .with(KeyParam::Algorithm(Algorithm::Rsa))
        .with(KeyParam::Padding(PaddingMode::None))
        .with(KeyParam::Digest(Digest::None))
        .with(KeyParam::NoAuthRequired)
        .with(KeyParam::KeySize(RSA_KEY_SIZE))
        .with(KeyParam::RsaPublicExponent(RSA_F4))
}

/// Attests device identifiers through a keystore.
#[derive(Debug)]
pub struct DeviceIdAttestor<K, S, D = X509ChainDecoder> {
    keystore: K,
    source: S,
    decoder: D,
    settings: AttestationSettings,
}

impl<K: Keystore, S: DeviceIdSource> DeviceIdAttestor<K, S, X509ChainDecoder> {
    pub fn new(keystore: K, source: S) -> Self {
        Self::with_settings(keystore, source, AttestationSettings::default())
    }

    pub fn with_settings(keystore: K, source: S, settings: AttestationSettings) -> Self {
        Self {
            keystore,
            source,
            decoder: X509ChainDecoder,
            settings,
        }
    }
}

impl<K: Keystore, S: DeviceIdSource, D: CertificateDecoder> DeviceIdAttestor<K, S, D> {
    /// Swap the certificate decoder.
    pub fn with_decoder<D2: CertificateDecoder>(self, decoder: D2) -> DeviceIdAttestor<K, S, D2> {
        DeviceIdAttestor {
            keystore: self.keystore,
            source: self.source,
            decoder,
            settings: self.settings,
        }
    }

    pub fn settings(&self) -> &AttestationSettings {
        &self.settings
    }

    /// Attest identifiers given as raw `ID_TYPE_*` codes.
    ///
    /// Unknown codes fail with [`AttestationError::InvalidArgument`] before any
    /// collaborator is called.
    pub fn attest_device_ids(
        &self,
        id_types: &[i32],
        challenge: &[u8],
    ) -> crate::Result<AttestationChain> {
        let request = AttestationRequest::from_codes(id_types, challenge)?;
        self.attest(&request)
    }

    /// Attest the requested identifiers bound to the request's challenge.
    ///
    /// Returns the chain leaf first; the leaf's attestation extension carries the
    /// requested identifiers plus brand, device, product, manufacturer and model.
    pub fn attest(&self, request: &AttestationRequest) -> crate::Result<AttestationChain> {
        let attest_params = self.collect_attestation_params(request)?;

        let alias = KeyAlias::next(&self.settings.alias_prefix);
        debug!(alias = %alias, "clearing leftover temporary key");
        if !self.keystore.delete_key(alias.as_str()) {
            return Err(AttestationError::TemporaryKeyRemoval {
                alias: alias.to_string(),
            });
        }

        // From here on every exit path deletes the key.
        let _key = EphemeralKey::arm(&self.keystore, &alias);

        let characteristics = self
            .keystore
            .generate_key(alias.as_str(), &ephemeral_key_params())
            .map_err(|code| AttestationError::Keystore {
                operation: KeystoreOperation::Generate,
                code,
            })?;
        debug!(
            alias = %alias,
            hw_enforced = characteristics.hardware_enforced.len(),
            sw_enforced = characteristics.software_enforced.len(),
            "temporary key generated"
        );

        let raw_chain = self
            .keystore
            .attest_key(alias.as_str(), &attest_params)
            .map_err(|code| AttestationError::Keystore {
                operation: KeystoreOperation::Attest,
                code,
            })?;
        debug!(alias = %alias, entries = raw_chain.len(), "attestation returned");

        let chain = decode_chain(&self.decoder, &raw_chain)?;
        info!(
            alias = %alias,
            certificates = chain.len(),
            "device identifier attestation complete"
        );
        Ok(chain)
    }

    /// Challenge, requested identifiers, then the five build metadata tags.
    fn collect_attestation_params(
        &self,
        request: &AttestationRequest,
    ) -> crate::Result<AuthorizationSet> {
        let mut params = AuthorizationSet::new()
            .with(KeyParam::AttestationChallenge(request.challenge().to_vec()));

        let telephony = if request.requires_telephony() {
            Some(self.source.telephony().ok_or(
                AttestationError::IdentifierUnavailable(UnavailableIdentifier::TelephonyService),
            )?)
        } else {
            None
        };

        for id_type in request.identifier_types() {
            let value = match id_type {
                IdentifierType::Serial => self.source.serial()?,
                IdentifierType::Imei => {
                    let telephony = require_telephony(telephony)?;
                    require_value(telephony.imei(self.settings.imei_slot)?, id_type)?
                }
                IdentifierType::Meid => {
                    let telephony = require_telephony(telephony)?;
                    require_value(telephony.meid()?, id_type)?
                }
            };
            params.push(KeyParam::AttestationId(
                id_type.attestation_tag(),
                value.into_bytes(),
            ));
        }

        let build = self.source.build_properties();
        for (tag, value) in [
            (AttestationIdTag::Brand, build.brand),
            (AttestationIdTag::Device, build.device),
            (AttestationIdTag::Product, build.product),
            (AttestationIdTag::Manufacturer, build.manufacturer),
            (AttestationIdTag::Model, build.model),
        ] {
            params.push(KeyParam::AttestationId(tag, value.into_bytes()));
        }

        Ok(params)
    }
}

fn require_telephony(
    telephony: Option<&dyn TelephonyService>,
) -> crate::Result<&dyn TelephonyService> {
    telephony.ok_or(AttestationError::IdentifierUnavailable(
        UnavailableIdentifier::TelephonyService,
    ))
}

fn require_value(value: Option<String>, id_type: IdentifierType) -> crate::Result<String> {
    value.ok_or(AttestationError::IdentifierUnavailable(
        UnavailableIdentifier::Identifier(id_type),
    ))
}
