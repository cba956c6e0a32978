//! Keystore interface, temporary key aliases, and the cleanup guard.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::keymaster::{AuthorizationSet, KeyCharacteristics, KeystoreErrorCode};

/// Process-wide sequence for temporary key aliases. Starts at zero, never reset.
static SEQUENCE_NUMBER: AtomicU64 = AtomicU64::new(0);

/// Secure key-management subsystem.
///
/// Implementations must serialise or safely interleave operations on distinct
/// aliases; the orchestrator never uses one alias from two calls.
pub trait Keystore {
    /// Remove the key under `alias`. Returns `true` when no key remains,
    /// including when there was none to begin with.
    fn delete_key(&self, alias: &str) -> bool;

    fn generate_key(
        &self,
        alias: &str,
        params: &AuthorizationSet,
    ) -> Result<KeyCharacteristics, KeystoreErrorCode>;

    /// Attest the key under `alias`. Returns the raw chain, leaf first.
    fn attest_key(
        &self,
        alias: &str,
        params: &AuthorizationSet,
    ) -> Result<Vec<Vec<u8>>, KeystoreErrorCode>;
}

impl<T: Keystore + ?Sized> Keystore for Arc<T> {
    fn delete_key(&self, alias: &str) -> bool {
        (**self).delete_key(alias)
    }

    fn generate_key(
        &self,
        alias: &str,
        params: &AuthorizationSet,
    ) -> Result<KeyCharacteristics, KeystoreErrorCode> {
        (**self).generate_key(alias, params)
    }

    fn attest_key(
        &self,
        alias: &str,
        params: &AuthorizationSet,
    ) -> Result<Vec<Vec<u8>>, KeystoreErrorCode> {
        (**self).attest_key(alias, params)
    }
}

/// Alias of a temporary attestation key: `<prefix>-<pid>-<seq>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyAlias(String);

impl KeyAlias {
    /// Derive a fresh alias. Unique within the process for its lifetime.
    pub fn next(prefix: &str) -> Self {
        let seq = SEQUENCE_NUMBER.fetch_add(1, Ordering::Relaxed) + 1;
        Self(format!("{}-{}-{}", prefix, std::process::id(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyAlias {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ownership of the temporary key under one alias.
///
/// Dropping the guard deletes the key, on normal return, on `?` and while
/// unwinding. A failed delete is logged and otherwise ignored so it never
/// masks the result already being returned.
pub(crate) struct EphemeralKey<'a, K: Keystore + ?Sized> {
    keystore: &'a K,
    alias: &'a KeyAlias,
}

impl<'a, K: Keystore + ?Sized> EphemeralKey<'a, K> {
    /// Take ownership of `alias` before the key is generated.
    pub(crate) fn arm(keystore: &'a K, alias: &'a KeyAlias) -> Self {
        Self { keystore, alias }
    }
}

impl<K: Keystore + ?Sized> Drop for EphemeralKey<'_, K> {
    fn drop(&mut self) {
        if self.keystore.delete_key(self.alias.as_str()) {
            debug!(alias = %self.alias, "temporary attestation key removed");
        } else {
            warn!(
                alias = %self.alias,
                "failed to remove temporary attestation key; key may remain in keystore"
            );
        }
    }
}
