//! Events consumed by the session reducer.

use serde_json::Value;

use crate::FetchError;
use crate::assemble::AssembledMemoData;
use crate::session::state::StatusResponse;

/// The fetch a given status demands on entry.
///
/// Stored alongside a suspended challenge so the controller can resume
/// exactly the action that hit the authentication wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    /// Fetch the session status (mount or post-payment restart).
    FetchStatus,
    /// Fetch the preview artifact.
    FetchPreview,
    /// Fetch the normalized report payload plus the full artifact and
    /// run the assembly pipeline.
    FetchFullReport,
}

/// One occurrence the reducer reacts to.
///
/// Events originate from fetch completions, the push channel, the
/// payment orchestrator, or the access gate. The reducer is the only
/// consumer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session-status fetch resolved.
    StatusFetched(StatusResponse),
    /// The push channel signalled that the preview became ready. Carries
    /// no payload; the consumer must fetch the preview itself.
    PreviewReadySignaled,
    /// The preview artifact fetch resolved.
    PreviewFetched {
        /// Opaque preview payload.
        artifact: Value,
    },
    /// The full report was fetched and assembled.
    ReportAssembled {
        /// Output of the assembly pipeline.
        memo: AssembledMemoData,
    },
    /// A fetch required by the current status failed.
    FetchFailed {
        /// Which entry action was in flight.
        during: EntryAction,
        /// Classified failure.
        error: FetchError,
    },
    /// The access gate reports a fresh token after a challenge.
    ChallengeCompleted,
    /// Payment verification succeeded; the controller restarts its fetch
    /// path from scratch, the reload analogue.
    PaymentVerified,
}
