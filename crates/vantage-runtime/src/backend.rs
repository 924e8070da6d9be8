//! The report backend seam.
//!
//! The backend is an opaque HTTP/event source; the controller only
//! depends on this trait, which keeps the lifecycle testable against an
//! in-memory fake. Error classification happens here: a 401 becomes
//! [`BackendError::Unauthorized`] (converted by the access gate into a
//! challenge or swallowed for demo intakes), timeout/abort becomes
//! [`BackendError::Transient`], everything else is terminal for the
//! session.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use vantage_core::FetchError;
use vantage_core::credentials::ReportAccessToken;
use vantage_core::gate::AccessGate;
use vantage_core::payment::{InitiateResponse, PaymentRequest, VerifyRequest};
use vantage_core::session::StatusResponse;

/// Transport-level failure of one backend call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendError {
    /// The backend demanded authentication (HTTP 401).
    #[error("authentication required")]
    Unauthorized,

    /// Timeout/abort class. Non-fatal by policy.
    #[error("transient transport failure: {0}")]
    Transient(String),

    /// Non-2xx response other than 401.
    #[error("backend returned status {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },

    /// Connection-level failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The payload did not match the expected shape.
    #[error("payload decode failure: {0}")]
    Decode(String),
}

impl BackendError {
    /// Classifies this failure for the state machine, consulting the
    /// gate so demo intakes never surface the challenge class.
    #[must_use]
    pub fn classify(self, gate: &AccessGate, intake_id: &str) -> FetchError {
        match self {
            Self::Unauthorized => gate.classify_unauthorized(intake_id),
            Self::Transient(reason) => FetchError::Transient { reason },
            Self::Status { status } => FetchError::Terminal {
                reason: format!("backend returned status {status}"),
            },
            Self::Transport(reason) | Self::Decode(reason) => {
                FetchError::Terminal { reason }
            },
        }
    }
}

/// The six backend operations the controller consumes.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    /// Fetches session status for an intake. May embed a full-artifact
    /// shortcut for already-unlocked sessions.
    async fn fetch_session(
        &self,
        intake_id: &str,
        token: Option<&ReportAccessToken>,
    ) -> Result<StatusResponse, BackendError>;

    /// Fetches the preview artifact.
    async fn fetch_preview(
        &self,
        intake_id: &str,
        token: Option<&ReportAccessToken>,
    ) -> Result<Value, BackendError>;

    /// Fetches the full artifact.
    async fn fetch_full_artifact(
        &self,
        intake_id: &str,
        token: Option<&ReportAccessToken>,
    ) -> Result<Value, BackendError>;

    /// Fetches the normalized report payload (preview data plus
    /// top-level derived fields).
    async fn fetch_report(
        &self,
        intake_id: &str,
        token: Option<&ReportAccessToken>,
    ) -> Result<Value, BackendError>;

    /// Creates a payment order, or reports the intake as already paid.
    async fn create_order(
        &self,
        intake_id: &str,
        request: &PaymentRequest,
    ) -> Result<InitiateResponse, BackendError>;

    /// Posts payment verification. `Ok(false)` means the signature was
    /// rejected.
    async fn verify_payment(&self, request: &VerifyRequest) -> Result<bool, BackendError>;
}
