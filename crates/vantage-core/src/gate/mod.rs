//! Report access gate: per-request token resolution and the
//! authentication challenge.
//!
//! Resolution priority for an intake:
//!
//! 1. hard-coded bypass for enumerated demo intakes (sentinel token,
//!    storage skipped entirely);
//! 2. durable store, if present and unexpired;
//! 3. ephemeral store.
//!
//! When a privileged fetch is refused by the backend, the gate classifies
//! the refusal: ordinary intakes get [`FetchError::AuthRequired`], which
//! callers convert into a challenge prompt; demo intakes are exempt from
//! that class by construction.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::FetchError;
use crate::credentials::{CredentialStoreError, ReportAccessToken, TokenStore};

/// Bearer value attached to demo intakes in place of a stored token.
pub const DEMO_SENTINEL_TOKEN: &str = "demo-access";

/// The access gate.
pub struct AccessGate {
    store: TokenStore,
    demo_ids: Vec<String>,
}

impl AccessGate {
    /// Creates a gate over a token store and the enumerated demo intake
    /// ids.
    #[must_use]
    pub fn new(store: TokenStore, demo_ids: Vec<String>) -> Self {
        Self { store, demo_ids }
    }

    /// Returns `true` for intakes in the bypass list.
    #[must_use]
    pub fn is_demo(&self, intake_id: &str) -> bool {
        self.demo_ids.iter().any(|id| id == intake_id)
    }

    /// Resolves the effective token for an intake.
    ///
    /// Demo intakes resolve to the sentinel token without touching
    /// storage. `None` means a privileged fetch will go out bare and may
    /// come back with an authentication demand.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store is unavailable.
    pub fn resolve(
        &self,
        intake_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ReportAccessToken>, CredentialStoreError> {
        if self.is_demo(intake_id) {
            debug!(intake_id, "demo bypass; sentinel token issued");
            return Ok(Some(ReportAccessToken::ephemeral(DEMO_SENTINEL_TOKEN)));
        }
        self.store.load(intake_id, now)
    }

    /// Classifies a backend "authentication required" response.
    ///
    /// Ordinary intakes produce the challenge class. A demo intake can
    /// never be asked to challenge; a 401 against one is a backend
    /// inconsistency and is treated as transient so state is left
    /// unchanged.
    #[must_use]
    pub fn classify_unauthorized(&self, intake_id: &str) -> FetchError {
        if self.is_demo(intake_id) {
            FetchError::Transient {
                reason: format!("unexpected authentication demand for demo intake {intake_id}"),
            }
        } else {
            FetchError::AuthRequired {
                intake_id: intake_id.to_string(),
            }
        }
    }

    /// Records the token minted by a successful challenge.
    ///
    /// Writes exactly one of the durable/ephemeral tiers (per the
    /// token's trust flag) and clears the other for the same intake.
    /// Demo intakes skip storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store is unavailable.
    pub fn complete_challenge(
        &self,
        intake_id: &str,
        token: &ReportAccessToken,
    ) -> Result<(), CredentialStoreError> {
        if self.is_demo(intake_id) {
            return Ok(());
        }
        self.store.store(intake_id, token)
    }

    /// Destroys any stored token for the intake (explicit logout).
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store is unavailable.
    pub fn logout(&self, intake_id: &str) -> Result<(), CredentialStoreError> {
        self.store.clear(intake_id)
    }

    /// Read access to the underlying store (splash flag and friends).
    #[must_use]
    pub const fn store(&self) -> &TokenStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::credentials::MemoryStore;

    fn gate(demo_ids: &[&str]) -> AccessGate {
        AccessGate::new(
            TokenStore::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new())),
            demo_ids.iter().map(ToString::to_string).collect(),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn demo_intake_resolves_sentinel_with_no_stored_token() {
        let gate = gate(&["demo-1"]);
        let token = gate.resolve("demo-1", now()).unwrap().unwrap();
        assert_eq!(token.bearer(), DEMO_SENTINEL_TOKEN);
    }

    #[test]
    fn demo_intake_never_raises_auth_required() {
        let gate = gate(&["demo-1"]);
        let err = gate.classify_unauthorized("demo-1");
        assert!(err.is_transient());
        assert!(!matches!(err, FetchError::AuthRequired { .. }));
    }

    #[test]
    fn ordinary_intake_raises_auth_required() {
        let gate = gate(&["demo-1"]);
        assert!(matches!(
            gate.classify_unauthorized("intake-1"),
            FetchError::AuthRequired { .. }
        ));
    }

    #[test]
    fn resolution_prefers_durable_over_ephemeral() {
        let gate = gate(&[]);
        gate.complete_challenge("intake-1", &ReportAccessToken::ephemeral("tok-e"))
            .unwrap();
        // A later trusted challenge supersedes the ephemeral token.
        gate.complete_challenge(
            "intake-1",
            &ReportAccessToken::trusted("tok-d", now() + Duration::hours(6)),
        )
        .unwrap();
        let token = gate.resolve("intake-1", now()).unwrap().unwrap();
        assert_eq!(token.bearer(), "tok-d");
        assert!(token.device_trusted);
    }

    #[test]
    fn challenge_for_demo_skips_storage() {
        let gate = gate(&["demo-1"]);
        gate.complete_challenge("demo-1", &ReportAccessToken::ephemeral("tok"))
            .unwrap();
        // Still the sentinel, not the stored value.
        let token = gate.resolve("demo-1", now()).unwrap().unwrap();
        assert_eq!(token.bearer(), DEMO_SENTINEL_TOKEN);
    }

    #[test]
    fn logout_destroys_tokens() {
        let gate = gate(&[]);
        gate.complete_challenge("intake-1", &ReportAccessToken::ephemeral("tok"))
            .unwrap();
        gate.logout("intake-1").unwrap();
        assert!(gate.resolve("intake-1", now()).unwrap().is_none());
    }
}
