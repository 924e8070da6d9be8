//! Two-tier token store over injected key/value scopes.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::debug;

/// A report-scoped bearer token as held by the client.
#[derive(Debug, Clone)]
pub struct ReportAccessToken {
    /// Opaque bearer value. Never printed; `SecretString` redacts it in
    /// `Debug` output.
    pub value: SecretString,
    /// Expiry, present only for durable tokens.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the user opted to remember this device.
    pub device_trusted: bool,
}

impl ReportAccessToken {
    /// Builds a trusted (durable-tier) token.
    #[must_use]
    pub fn trusted(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: SecretString::from(value.into()),
            expires_at: Some(expires_at),
            device_trusted: true,
        }
    }

    /// Builds an ephemeral (session-tier) token.
    #[must_use]
    pub fn ephemeral(value: impl Into<String>) -> Self {
        Self {
            value: SecretString::from(value.into()),
            expires_at: None,
            device_trusted: false,
        }
    }

    /// Exposes the bearer value for constructing an `Authorization`
    /// header.
    #[must_use]
    pub fn bearer(&self) -> &str {
        self.value.expose_secret()
    }
}

/// Errors from the credential store.
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    /// The underlying key/value scope failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal lock poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

/// One named key/value scope (durable or ephemeral).
///
/// Modeled as an injected interface with an explicit `get/set/remove`
/// contract so browser storage can be swapped for an in-memory fake in
/// tests.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the scope is unavailable.
    fn get(&self, key: &str) -> Result<Option<String>, CredentialStoreError>;

    /// Writes a value, replacing any previous one (last writer wins).
    ///
    /// # Errors
    ///
    /// Returns an error if the scope is unavailable.
    fn set(&self, key: &str, value: &str) -> Result<(), CredentialStoreError>;

    /// Removes a value if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the scope is unavailable.
    fn remove(&self, key: &str) -> Result<(), CredentialStoreError>;
}

/// In-memory [`KeyValueStore`] used in tests and as the ephemeral tier
/// default.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys. Test helper.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns `true` if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CredentialStoreError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialStoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CredentialStoreError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CredentialStoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CredentialStoreError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}

fn token_key(intake_id: &str) -> String {
    format!("vantage.token.{intake_id}")
}

fn expiry_key(intake_id: &str) -> String {
    format!("vantage.token_expiry.{intake_id}")
}

/// Durable flag recording "skip the entry splash" for returning
/// authenticated users. Unrelated to any one intake.
const SPLASH_SEEN_KEY: &str = "vantage.splash_seen";

/// Two-tier token store.
pub struct TokenStore {
    durable: Box<dyn KeyValueStore>,
    ephemeral: Box<dyn KeyValueStore>,
}

impl TokenStore {
    /// Creates a store over the two injected scopes.
    #[must_use]
    pub fn new(durable: Box<dyn KeyValueStore>, ephemeral: Box<dyn KeyValueStore>) -> Self {
        Self { durable, ephemeral }
    }

    /// Stores a token for an intake in exactly one tier and clears the
    /// other tier for the same intake.
    ///
    /// # Errors
    ///
    /// Returns an error if either scope is unavailable.
    pub fn store(
        &self,
        intake_id: &str,
        token: &ReportAccessToken,
    ) -> Result<(), CredentialStoreError> {
        let key = token_key(intake_id);
        if token.device_trusted {
            self.durable.set(&key, token.bearer())?;
            if let Some(expires_at) = token.expires_at {
                self.durable.set(&expiry_key(intake_id), &expires_at.to_rfc3339())?;
            } else {
                self.durable.remove(&expiry_key(intake_id))?;
            }
            self.ephemeral.remove(&key)?;
        } else {
            self.ephemeral.set(&key, token.bearer())?;
            self.durable.remove(&key)?;
            self.durable.remove(&expiry_key(intake_id))?;
        }
        debug!(intake_id, durable = token.device_trusted, "token stored");
        Ok(())
    }

    /// Loads the active token for an intake: durable first (purging it if
    /// expired), then ephemeral. An expired durable token reads as
    /// absent, never as a distinct "expired" state.
    ///
    /// # Errors
    ///
    /// Returns an error if either scope is unavailable.
    pub fn load(
        &self,
        intake_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ReportAccessToken>, CredentialStoreError> {
        let key = token_key(intake_id);
        if let Some(value) = self.durable.get(&key)? {
            let expires_at = self
                .durable
                .get(&expiry_key(intake_id))?
                .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
                .map(|dt| dt.with_timezone(&Utc));
            if let Some(expiry) = expires_at {
                if expiry <= now {
                    debug!(intake_id, "durable token expired; purging");
                    self.durable.remove(&key)?;
                    self.durable.remove(&expiry_key(intake_id))?;
                    return self.load_ephemeral(intake_id);
                }
            }
            return Ok(Some(ReportAccessToken {
                value: SecretString::from(value),
                expires_at,
                device_trusted: true,
            }));
        }
        self.load_ephemeral(intake_id)
    }

    fn load_ephemeral(
        &self,
        intake_id: &str,
    ) -> Result<Option<ReportAccessToken>, CredentialStoreError> {
        Ok(self
            .ephemeral
            .get(&token_key(intake_id))?
            .map(ReportAccessToken::ephemeral))
    }

    /// Removes the token for an intake from both tiers (explicit logout).
    ///
    /// # Errors
    ///
    /// Returns an error if either scope is unavailable.
    pub fn clear(&self, intake_id: &str) -> Result<(), CredentialStoreError> {
        let key = token_key(intake_id);
        self.durable.remove(&key)?;
        self.durable.remove(&expiry_key(intake_id))?;
        self.ephemeral.remove(&key)?;
        Ok(())
    }

    /// Records that the returning user skips the entry splash.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable scope is unavailable.
    pub fn mark_splash_seen(&self) -> Result<(), CredentialStoreError> {
        self.durable.set(SPLASH_SEEN_KEY, "1")
    }

    /// Whether the entry splash should be skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable scope is unavailable.
    pub fn splash_seen(&self) -> Result<bool, CredentialStoreError> {
        Ok(self.durable.get(SPLASH_SEEN_KEY)?.is_some())
    }
}
