//! Shared fixtures: a recording keystore that mints real certificate chains
//! and identifier sources with call counters.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use devid_core::{logging, LoggingConfig};
use devid_identity::{
    AttestationIdTag, AuthorizationSet, BuildProperties, DeviceIdSource, KeyCharacteristics,
    KeyDescription, Keystore, KeystoreErrorCode, SecurityLevel, SourceError, StaticDeviceIds,
    TelephonyService, ANDROID_KEY_ATTESTATION_OID,
};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CustomExtension, DnType, IsCa, KeyPair,
};

pub fn init_tracing() {
    let _ = logging::try_init(&LoggingConfig {
        level: "debug".to_string(),
        ..LoggingConfig::default()
    });
}

pub fn build_properties() -> BuildProperties {
    BuildProperties {
        brand: "acme".to_string(),
        device: "anvil".to_string(),
        product: "anvil_pro".to_string(),
        manufacturer: "Acme Corp".to_string(),
        model: "Anvil 2".to_string(),
    }
}

pub const SERIAL: &str = "SER-0001";
pub const IMEI: &str = "490154203237518";
pub const MEID: &str = "A0000049012345";

/// Device with every identifier available.
pub fn full_device() -> StaticDeviceIds {
    StaticDeviceIds::new(SERIAL, build_properties())
        .with_telephony(vec![IMEI.to_string()], Some(MEID.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Delete(String),
    Generate(String, AuthorizationSet),
    Attest(String, AuthorizationSet),
}

/// In-memory keystore recording every call.
///
/// Successful attestation returns `[leaf, root]`, where the leaf carries a
/// KeyDescription built from the attestation parameters it received.
pub struct RecordingKeystore {
    root: Certificate,
    root_key: KeyPair,
    keys: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Call>>,
    generate_error: Option<KeystoreErrorCode>,
    attest_error: Option<KeystoreErrorCode>,
    raw_chain: Option<Vec<Vec<u8>>>,
    refuse_cleanup: bool,
}

impl RecordingKeystore {
    pub fn new() -> Self {
        let root_key = KeyPair::generate().expect("root key");
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, "Test Attestation Root");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let root = params.self_signed(&root_key).expect("root certificate");

        Self {
            root,
            root_key,
            keys: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            generate_error: None,
            attest_error: None,
            raw_chain: None,
            refuse_cleanup: false,
        }
    }

    pub fn failing_generate(mut self, code: KeystoreErrorCode) -> Self {
        self.generate_error = Some(code);
        self
    }

    pub fn failing_attest(mut self, code: KeystoreErrorCode) -> Self {
        self.attest_error = Some(code);
        self
    }

    /// Return this chain from `attest_key` instead of minting one.
    pub fn returning_chain(mut self, raw_chain: Vec<Vec<u8>>) -> Self {
        self.raw_chain = Some(raw_chain);
        self
    }

    /// Refuse to delete keys that exist (pre-clean of a fresh alias still works).
    pub fn refusing_cleanup(mut self) -> Self {
        self.refuse_cleanup = true;
        self
    }

    pub fn root_der(&self) -> Vec<u8> {
        self.root.der().to_vec()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn delete_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Delete(_)))
    }

    pub fn generate_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Generate(..)))
    }

    pub fn attest_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Attest(..)))
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn generated_aliases(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Generate(alias, _) => Some(alias.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn holds(&self, alias: &str) -> bool {
        self.keys.lock().unwrap().contains(alias)
    }

    pub fn resident_keys(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn mint_chain(&self, params: &AuthorizationSet) -> Vec<Vec<u8>> {
        let attested_ids: BTreeMap<AttestationIdTag, Vec<u8>> = params
            .attestation_ids()
            .map(|(tag, value)| (tag, value.to_vec()))
            .collect();
        let description = KeyDescription {
            attestation_version: 3,
            attestation_security_level: SecurityLevel::TrustedEnvironment,
            keymaster_version: 4,
            keymaster_security_level: SecurityLevel::TrustedEnvironment,
            attestation_challenge: params.challenge().unwrap_or_default().to_vec(),
            unique_id: Vec::new(),
            attested_ids,
        };

        let mut leaf_params = CertificateParams::default();
        leaf_params
            .distinguished_name
            .push(DnType::CommonName, "Android Keystore Key");
        leaf_params
            .custom_extensions
            .push(CustomExtension::from_oid_content(
                ANDROID_KEY_ATTESTATION_OID,
                description.to_der(),
            ));
        let leaf_key = KeyPair::generate().expect("leaf key");
        let leaf = leaf_params
            .signed_by(&leaf_key, &self.root, &self.root_key)
            .expect("leaf certificate");

        vec![leaf.der().to_vec(), self.root.der().to_vec()]
    }
}

impl Keystore for RecordingKeystore {
    fn delete_key(&self, alias: &str) -> bool {
        self.record(Call::Delete(alias.to_string()));
        let mut keys = self.keys.lock().unwrap();
        if keys.contains(alias) && self.refuse_cleanup {
            return false;
        }
        keys.remove(alias);
        true
    }

    fn generate_key(
        &self,
        alias: &str,
        params: &AuthorizationSet,
    ) -> Result<KeyCharacteristics, KeystoreErrorCode> {
        self.record(Call::Generate(alias.to_string(), params.clone()));
        if let Some(code) = self.generate_error {
            return Err(code);
        }
        self.keys.lock().unwrap().insert(alias.to_string());
        Ok(KeyCharacteristics {
            hardware_enforced: params.clone(),
            software_enforced: AuthorizationSet::new(),
        })
    }

    fn attest_key(
        &self,
        alias: &str,
        params: &AuthorizationSet,
    ) -> Result<Vec<Vec<u8>>, KeystoreErrorCode> {
        self.record(Call::Attest(alias.to_string(), params.clone()));
        if !self.holds(alias) {
            return Err(KeystoreErrorCode::KEY_NOT_FOUND);
        }
        if let Some(code) = self.attest_error {
            return Err(code);
        }
        Ok(match &self.raw_chain {
            Some(chain) => chain.clone(),
            None => self.mint_chain(params),
        })
    }
}

/// Identifier source that counts reads and can deny access.
pub struct CountingSource {
    inner: StaticDeviceIds,
    deny: bool,
    pub serial_reads: AtomicUsize,
    pub imei_reads: AtomicUsize,
    pub meid_reads: AtomicUsize,
}

impl CountingSource {
    pub fn new(inner: StaticDeviceIds) -> Self {
        Self {
            inner,
            deny: false,
            serial_reads: AtomicUsize::new(0),
            imei_reads: AtomicUsize::new(0),
            meid_reads: AtomicUsize::new(0),
        }
    }

    pub fn denying(mut self) -> Self {
        self.deny = true;
        self
    }

    pub fn reads(&self) -> (usize, usize, usize) {
        (
            self.serial_reads.load(Ordering::SeqCst),
            self.imei_reads.load(Ordering::SeqCst),
            self.meid_reads.load(Ordering::SeqCst),
        )
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.deny {
            Err(SourceError::PermissionDenied(
                "READ_PRIVILEGED_PHONE_STATE not granted".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl TelephonyService for CountingSource {
    fn imei(&self, slot: u32) -> Result<Option<String>, SourceError> {
        self.imei_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        TelephonyService::imei(&self.inner, slot)
    }

    fn meid(&self) -> Result<Option<String>, SourceError> {
        self.meid_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        TelephonyService::meid(&self.inner)
    }
}

impl DeviceIdSource for CountingSource {
    fn serial(&self) -> Result<String, SourceError> {
        self.serial_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.serial()
    }

    fn telephony(&self) -> Option<&dyn TelephonyService> {
        if self.inner.telephony_available {
            Some(self)
        } else {
            None
        }
    }

    fn build_properties(&self) -> BuildProperties {
        self.inner.build_properties()
    }
}
