//! Failure taxonomy shared between the state machine and the runtime.

use thiserror::Error;

/// Classified outcome of a privileged fetch.
///
/// The session state machine is the single point that decides what each
/// class means for presentation:
///
/// | Class | Decision |
/// |-------|----------|
/// | `AuthRequired` | suspend and show the challenge prompt |
/// | `Transient` | swallow; leave state unchanged |
/// | `Terminal` | user-visible error state, no automatic retry |
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FetchError {
    /// The backend refused the request for lack of a valid token.
    ///
    /// Never shown as a raw error; always converted into a challenge
    /// prompt by the caller. Demo intakes are exempt from this class by
    /// construction (see the access gate).
    #[error("authentication required for intake {intake_id}")]
    AuthRequired {
        /// The intake the fetch was scoped to.
        intake_id: String,
    },

    /// Timeout/abort class failure. Swallowed: no user-visible error,
    /// state left unchanged so a later organic retry can succeed.
    #[error("transient fetch failure: {reason}")]
    Transient {
        /// Short transport-level description.
        reason: String,
    },

    /// Network or non-2xx failure (excluding 401). Terminal for the
    /// session: surfaced to the user, all automatic activity stops.
    #[error("fetch failed: {reason}")]
    Terminal {
        /// Short description safe for display.
        reason: String,
    },
}

impl FetchError {
    /// Returns `true` for the timeout/abort class.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
