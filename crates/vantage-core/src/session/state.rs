//! Session value objects and presentation phases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-authoritative lifecycle status of one audit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    /// Intake received; generation not started.
    Submitted,
    /// Background generation in progress.
    Processing,
    /// Generated content under review.
    InReview,
    /// The free preview can be fetched.
    PreviewReady,
    /// Payment captured; full content available.
    Paid,
    /// Full content generated and unlocked.
    FullReady,
}

impl AuditStatus {
    /// Position in the partial order
    /// `SUBMITTED/PROCESSING/IN_REVIEW → PREVIEW_READY → PAID/FULL_READY`.
    ///
    /// Statuses sharing a rank are interchangeable for ordering purposes.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Submitted | Self::Processing | Self::InReview => 0,
            Self::PreviewReady => 1,
            Self::Paid | Self::FullReady => 2,
        }
    }

    /// Returns `true` while the session is waiting on background
    /// generation (the only statuses during which the push channel is
    /// open).
    #[must_use]
    pub const fn is_waiting(self) -> bool {
        self.rank() == 0
    }

    /// Returns `true` once full content is payable-for and fetchable.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        self.rank() == 2
    }

    /// Wire representation, as the backend spells it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Processing => "PROCESSING",
            Self::InReview => "IN_REVIEW",
            Self::PreviewReady => "PREVIEW_READY",
            Self::Paid => "PAID",
            Self::FullReady => "FULL_READY",
        }
    }
}

/// One audit session, keyed by its intake identifier.
///
/// Created server-side on intake submission; fetched, never mutated, by
/// the client. A fresher fetch supersedes the whole value in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSession {
    /// Opaque intake identifier, externally assigned, immutable.
    pub id: String,
    /// Current lifecycle status.
    pub status: AuditStatus,
    /// When the intake was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Report price in minor currency units.
    pub price: i64,
    /// When the time-gated unlock elapses, if the gate applies.
    #[serde(default)]
    pub unlock_at: Option<DateTime<Utc>>,
    /// Server-computed unlock state; the client performs no independent
    /// unlock calculation.
    #[serde(default)]
    pub is_unlocked: bool,
}

/// Response of the session-status fetch.
///
/// For already-unlocked sessions the backend may embed the full artifact
/// directly, letting the controller short-circuit to the paid path
/// without a second round trip.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// The session value object.
    #[serde(flatten)]
    pub session: AuditSession,
    /// Embedded full artifact, when the backend chose the shortcut.
    #[serde(default)]
    pub full_artifact: Option<serde_json::Value>,
}

/// Presentation-facing phase of the controller.
///
/// This is what observers (rendering) see; it is derived exclusively by
/// the reducer and never mutated elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerPhase {
    /// Initial fetch (or post-payment restart) in flight.
    Loading,
    /// A privileged fetch hit an authentication wall; the challenge
    /// prompt should be shown. The suspended entry action resumes once
    /// the gate reports a fresh token.
    AwaitingChallenge,
    /// Waiting on background generation; push channel open.
    Waiting {
        /// The waiting status as the server reported it.
        status: AuditStatus,
    },
    /// Preview fetched and displayable.
    PreviewAvailable {
        /// Status at the time the preview resolved.
        status: AuditStatus,
        /// Opaque preview artifact.
        artifact: serde_json::Value,
    },
    /// Full content assembled and displayable.
    Ready {
        /// The assembled memo handed to presentation.
        memo: crate::assemble::AssembledMemoData,
    },
    /// Terminal user-visible error; all automatic activity stopped.
    Failed {
        /// Display-safe description.
        message: String,
    },
}

impl ControllerPhase {
    /// Returns `true` if this phase keeps the push channel open.
    #[must_use]
    pub const fn wants_push(&self) -> bool {
        matches!(self, Self::Waiting { .. })
    }

    /// Returns `true` for the terminal error phase.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
