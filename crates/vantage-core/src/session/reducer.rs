//! Pure transition function for the session lifecycle.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::FetchError;
use crate::session::event::{EntryAction, SessionEvent};
use crate::session::state::{AuditStatus, ControllerPhase, StatusResponse};

/// Side effect requested by the reducer.
///
/// The reducer never performs I/O; it emits commands and the runtime
/// executes them, feeding results back as [`SessionEvent`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Fetch the session status.
    FetchStatus,
    /// Fetch the preview artifact.
    FetchPreview,
    /// Fetch the normalized report payload and the full artifact, then
    /// run the assembly pipeline. When the status response already
    /// embedded the full artifact, it is carried here so the runtime
    /// skips the second round trip.
    FetchFullReport {
        /// Full artifact embedded in the status response, if any.
        embedded_artifact: Option<Value>,
    },
    /// Open the push subscription for this intake.
    SubscribePush,
    /// Close the push subscription.
    UnsubscribePush,
    /// (Re)start the unlock countdown from server-provided fields.
    StartCountdown {
        /// Server-provided unlock timestamp.
        unlock_at: Option<DateTime<Utc>>,
        /// Server-computed unlock state.
        is_unlocked: bool,
    },
    /// Cancel the unlock countdown.
    StopCountdown,
}

/// The session lifecycle reducer.
///
/// Owns the presentation phase and the monotonicity guard. All status
/// knowledge comes from the server; the reducer only decides which entry
/// action each observed status demands and what the user should see
/// meanwhile.
#[derive(Debug)]
pub struct SessionReducer {
    phase: ControllerPhase,
    /// Highest status rank observed so far. A later event carrying an
    /// earlier rank is a stale response and is dropped.
    highest_rank: Option<u8>,
    /// Entry action suspended behind an authentication challenge.
    suspended: Option<EntryAction>,
}

impl Default for SessionReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionReducer {
    /// Creates a reducer in the initial loading phase.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: ControllerPhase::Loading,
            highest_rank: None,
            suspended: None,
        }
    }

    /// Current presentation phase.
    #[must_use]
    pub const fn phase(&self) -> &ControllerPhase {
        &self.phase
    }

    /// Applies one event, returning the commands the runtime must run.
    ///
    /// Events that are invalid for the current phase (stale statuses,
    /// duplicate push signals after the preview resolved) are dropped
    /// rather than treated as errors: the backend and the channel are
    /// external sources the controller cannot make promises about.
    pub fn apply(&mut self, event: SessionEvent) -> Vec<Command> {
        match event {
            SessionEvent::StatusFetched(resp) => self.on_status(resp),
            SessionEvent::PreviewReadySignaled => self.on_push_signal(),
            SessionEvent::PreviewFetched { artifact } => self.on_preview(artifact),
            SessionEvent::ReportAssembled { memo } => {
                self.note_rank(AuditStatus::Paid.rank());
                self.phase = ControllerPhase::Ready { memo };
                vec![Command::UnsubscribePush]
            },
            SessionEvent::FetchFailed { during, error } => self.on_failure(during, &error),
            SessionEvent::ChallengeCompleted => self.on_challenge_completed(),
            SessionEvent::PaymentVerified => {
                debug!("payment verified; restarting fetch path");
                self.suspended = None;
                self.phase = ControllerPhase::Loading;
                vec![
                    Command::UnsubscribePush,
                    Command::StopCountdown,
                    Command::FetchStatus,
                ]
            },
        }
    }

    fn note_rank(&mut self, rank: u8) {
        self.highest_rank = Some(self.highest_rank.map_or(rank, |r| r.max(rank)));
    }

    fn on_status(&mut self, resp: StatusResponse) -> Vec<Command> {
        let status = resp.session.status;
        if let Some(seen) = self.highest_rank {
            if status.rank() < seen {
                warn!(
                    intake_id = %resp.session.id,
                    stale = status.as_str(),
                    "dropping stale status regression"
                );
                return Vec::new();
            }
        }
        debug!(intake_id = %resp.session.id, status = status.as_str(), "status fetched");

        let mut commands = vec![Command::StartCountdown {
            unlock_at: resp.session.unlock_at,
            is_unlocked: resp.session.is_unlocked,
        }];

        // Backend optimization for already-unlocked sessions: the status
        // response embeds the full artifact, so the paid path runs
        // without re-fetching it.
        if let Some(artifact) = resp.full_artifact {
            self.note_rank(AuditStatus::Paid.rank());
            self.phase = ControllerPhase::Loading;
            commands.push(Command::FetchFullReport {
                embedded_artifact: Some(artifact),
            });
            return commands;
        }

        self.note_rank(status.rank());
        if status.is_waiting() {
            self.phase = ControllerPhase::Waiting { status };
            commands.push(Command::SubscribePush);
        } else if status.is_paid() {
            self.phase = ControllerPhase::Loading;
            commands.push(Command::FetchFullReport {
                embedded_artifact: None,
            });
        } else {
            self.phase = ControllerPhase::Loading;
            commands.push(Command::FetchPreview);
        }
        commands
    }

    fn on_push_signal(&mut self) -> Vec<Command> {
        // The channel carries no payload, only a readiness flag; the
        // consumer fetches the preview itself. Signals outside a waiting
        // phase are stale and dropped.
        if self.phase.wants_push() {
            vec![Command::FetchPreview]
        } else {
            debug!("push signal outside waiting phase dropped");
            Vec::new()
        }
    }

    fn on_preview(&mut self, artifact: Value) -> Vec<Command> {
        self.note_rank(AuditStatus::PreviewReady.rank());
        self.phase = ControllerPhase::PreviewAvailable {
            status: AuditStatus::PreviewReady,
            artifact,
        };
        vec![Command::UnsubscribePush]
    }

    fn on_failure(&mut self, during: EntryAction, error: &FetchError) -> Vec<Command> {
        match error {
            FetchError::AuthRequired { intake_id } => {
                debug!(%intake_id, "suspending on authentication challenge");
                self.suspended = Some(during);
                self.phase = ControllerPhase::AwaitingChallenge;
                Vec::new()
            },
            FetchError::Transient { reason } => {
                // Timeout/abort class: no user-visible error, state left
                // unchanged so a later organic retry can succeed.
                warn!(reason, "transient fetch failure swallowed");
                Vec::new()
            },
            FetchError::Terminal { reason } => {
                self.phase = ControllerPhase::Failed {
                    message: reason.clone(),
                };
                vec![Command::UnsubscribePush, Command::StopCountdown]
            },
        }
    }

    fn on_challenge_completed(&mut self) -> Vec<Command> {
        let Some(action) = self.suspended.take() else {
            return Vec::new();
        };
        self.phase = ControllerPhase::Loading;
        vec![match action {
            EntryAction::FetchStatus => Command::FetchStatus,
            EntryAction::FetchPreview => Command::FetchPreview,
            EntryAction::FetchFullReport => Command::FetchFullReport {
                embedded_artifact: None,
            },
        }]
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::session::state::AuditSession;

    fn session(status: AuditStatus) -> StatusResponse {
        StatusResponse {
            session: AuditSession {
                id: "intake-1".into(),
                status,
                submitted_at: Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap(),
                price: 49_900,
                unlock_at: None,
                is_unlocked: false,
            },
            full_artifact: None,
        }
    }

    #[test]
    fn waiting_status_subscribes_and_never_polls() {
        let mut reducer = SessionReducer::new();
        let commands = reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::Processing)));
        assert!(commands.contains(&Command::SubscribePush));
        assert!(!commands.contains(&Command::FetchPreview));
        assert!(matches!(
            reducer.phase(),
            ControllerPhase::Waiting { status: AuditStatus::Processing }
        ));
    }

    #[test]
    fn preview_ready_status_fetches_preview() {
        let mut reducer = SessionReducer::new();
        let commands =
            reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::PreviewReady)));
        assert!(commands.contains(&Command::FetchPreview));
        assert!(!commands.contains(&Command::SubscribePush));
    }

    #[test]
    fn paid_status_fetches_full_report() {
        let mut reducer = SessionReducer::new();
        let commands = reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::Paid)));
        assert!(
            commands.contains(&Command::FetchFullReport { embedded_artifact: None })
        );
    }

    #[test]
    fn embedded_artifact_short_circuits_to_paid_path() {
        let mut reducer = SessionReducer::new();
        let mut resp = session(AuditStatus::FullReady);
        resp.full_artifact = Some(json!({"sections": {"a": 1}}));
        let commands = reducer.apply(SessionEvent::StatusFetched(resp));
        assert!(commands.iter().any(|c| matches!(
            c,
            Command::FetchFullReport { embedded_artifact: Some(_) }
        )));
    }

    #[test]
    fn push_signal_in_waiting_fetches_preview_once_routed() {
        let mut reducer = SessionReducer::new();
        reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::InReview)));
        let commands = reducer.apply(SessionEvent::PreviewReadySignaled);
        assert_eq!(commands, vec![Command::FetchPreview]);
    }

    #[test]
    fn push_signal_outside_waiting_is_dropped() {
        let mut reducer = SessionReducer::new();
        reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::PreviewReady)));
        reducer.apply(SessionEvent::PreviewFetched { artifact: json!({"p": 1}) });
        let commands = reducer.apply(SessionEvent::PreviewReadySignaled);
        assert!(commands.is_empty());
    }

    #[test]
    fn preview_fetch_closes_subscription() {
        let mut reducer = SessionReducer::new();
        reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::Submitted)));
        reducer.apply(SessionEvent::PreviewReadySignaled);
        let commands = reducer.apply(SessionEvent::PreviewFetched { artifact: json!({"p": 1}) });
        assert!(commands.contains(&Command::UnsubscribePush));
        match reducer.phase() {
            ControllerPhase::PreviewAvailable { status, artifact } => {
                assert_eq!(*status, AuditStatus::PreviewReady);
                assert!(!artifact.is_null());
            },
            other => panic!("expected PreviewAvailable, got {other:?}"),
        }
    }

    #[test]
    fn stale_status_regression_is_dropped() {
        let mut reducer = SessionReducer::new();
        reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::Paid)));
        // A stale cached response reporting PROCESSING after PAID.
        let commands = reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::Processing)));
        assert!(commands.is_empty());
        assert!(!matches!(reducer.phase(), ControllerPhase::Waiting { .. }));
    }

    #[test]
    fn same_rank_status_is_not_a_regression() {
        let mut reducer = SessionReducer::new();
        reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::Submitted)));
        let commands = reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::InReview)));
        assert!(commands.contains(&Command::SubscribePush));
    }

    #[test]
    fn auth_failure_suspends_and_resumes_same_action() {
        let mut reducer = SessionReducer::new();
        let commands = reducer.apply(SessionEvent::FetchFailed {
            during: EntryAction::FetchPreview,
            error: FetchError::AuthRequired { intake_id: "intake-1".into() },
        });
        assert!(commands.is_empty());
        assert!(matches!(reducer.phase(), ControllerPhase::AwaitingChallenge));

        let resumed = reducer.apply(SessionEvent::ChallengeCompleted);
        assert_eq!(resumed, vec![Command::FetchPreview]);
        assert!(matches!(reducer.phase(), ControllerPhase::Loading));
    }

    #[test]
    fn challenge_completed_without_suspension_is_noop() {
        let mut reducer = SessionReducer::new();
        reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::Processing)));
        let commands = reducer.apply(SessionEvent::ChallengeCompleted);
        assert!(commands.is_empty());
        assert!(matches!(reducer.phase(), ControllerPhase::Waiting { .. }));
    }

    #[test]
    fn terminal_failure_stops_everything() {
        let mut reducer = SessionReducer::new();
        reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::Processing)));
        let commands = reducer.apply(SessionEvent::FetchFailed {
            during: EntryAction::FetchPreview,
            error: FetchError::Terminal { reason: "backend returned 502".into() },
        });
        assert!(commands.contains(&Command::UnsubscribePush));
        assert!(commands.contains(&Command::StopCountdown));
        assert!(reducer.phase().is_failed());
    }

    #[test]
    fn transient_failure_leaves_state_unchanged() {
        let mut reducer = SessionReducer::new();
        reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::Processing)));
        let before = reducer.phase().clone();
        let commands = reducer.apply(SessionEvent::FetchFailed {
            during: EntryAction::FetchPreview,
            error: FetchError::Transient { reason: "timeout".into() },
        });
        assert!(commands.is_empty());
        assert_eq!(*reducer.phase(), before);
    }

    #[test]
    fn payment_verified_restarts_fetch_path() {
        let mut reducer = SessionReducer::new();
        reducer.apply(SessionEvent::StatusFetched(session(AuditStatus::PreviewReady)));
        let commands = reducer.apply(SessionEvent::PaymentVerified);
        assert_eq!(
            commands,
            vec![
                Command::UnsubscribePush,
                Command::StopCountdown,
                Command::FetchStatus
            ]
        );
        assert!(matches!(reducer.phase(), ControllerPhase::Loading));
    }

    #[test]
    fn countdown_started_from_server_fields() {
        let mut reducer = SessionReducer::new();
        let mut resp = session(AuditStatus::PreviewReady);
        let unlock_at = Utc.with_ymd_and_hms(2026, 7, 3, 10, 0, 0).unwrap();
        resp.session.unlock_at = Some(unlock_at);
        let commands = reducer.apply(SessionEvent::StatusFetched(resp));
        assert!(commands.contains(&Command::StartCountdown {
            unlock_at: Some(unlock_at),
            is_unlocked: false,
        }));
    }
}
