//! Device identifier sources.
//!
//! The orchestrator only needs three reads (serial, IMEI, MEID) and the build
//! metadata strings. Permission checks live with the source; a denial is
//! reported as [`SourceError::PermissionDenied`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by an identifier source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

/// Build metadata attested with every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProperties {
    pub brand: String,
    pub device: String,
    pub product: String,
    pub manufacturer: String,
    pub model: String,
}

/// Telephony-backed identifiers. `Ok(None)` means the value could not be read.
pub trait TelephonyService {
    fn imei(&self, slot: u32) -> Result<Option<String>, SourceError>;
    fn meid(&self) -> Result<Option<String>, SourceError>;
}

/// Source of raw device identifiers.
pub trait DeviceIdSource {
    fn serial(&self) -> Result<String, SourceError>;

    /// `None` when the telephony service is unreachable.
    fn telephony(&self) -> Option<&dyn TelephonyService>;

    fn build_properties(&self) -> BuildProperties;
}

impl<T: DeviceIdSource + ?Sized> DeviceIdSource for Arc<T> {
    fn serial(&self) -> Result<String, SourceError> {
        (**self).serial()
    }

    fn telephony(&self) -> Option<&dyn TelephonyService> {
        (**self).telephony()
    }

    fn build_properties(&self) -> BuildProperties {
        (**self).build_properties()
    }
}

/// Identifiers provisioned up front, e.g. from factory data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticDeviceIds {
    pub serial: String,
    /// IMEI per telephony slot.
    pub imeis: Vec<String>,
    pub meid: Option<String>,
    /// Whether a telephony service is present at all.
    pub telephony_available: bool,
    pub properties: BuildProperties,
}

impl StaticDeviceIds {
    pub fn new(serial: impl Into<String>, properties: BuildProperties) -> Self {
        Self {
            serial: serial.into(),
            properties,
            ..Self::default()
        }
    }

    /// Enable telephony with the given IMEIs and MEID.
    pub fn with_telephony(mut self, imeis: Vec<String>, meid: Option<String>) -> Self {
        self.telephony_available = true;
        self.imeis = imeis;
        self.meid = meid;
        self
    }
}

impl TelephonyService for StaticDeviceIds {
    fn imei(&self, slot: u32) -> Result<Option<String>, SourceError> {
        let slot = usize::try_from(slot).ok();
        Ok(slot.and_then(|s| self.imeis.get(s)).cloned())
    }

    fn meid(&self) -> Result<Option<String>, SourceError> {
        Ok(self.meid.clone())
    }
}

impl DeviceIdSource for StaticDeviceIds {
    fn serial(&self) -> Result<String, SourceError> {
        Ok(self.serial.clone())
    }

    fn telephony(&self) -> Option<&dyn TelephonyService> {
        if self.telephony_available {
            Some(self)
        } else {
            None
        }
    }

    fn build_properties(&self) -> BuildProperties {
        self.properties.clone()
    }
}
