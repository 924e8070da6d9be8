//! Audit session lifecycle state machine.
//!
//! One audit session progresses through server-authoritative statuses; the
//! client never invents a status, only reads one and performs the entry
//! action the status demands:
//!
//! ```text
//!                      StatusFetched
//!          ┌────────────────────────────────────┐
//!          ▼                                    │
//!     ┌─────────┐  push signal   ┌──────────────┴───┐
//!     │ Waiting │───────────────►│ PreviewAvailable │
//!     └────┬────┘ (fetch preview)└────────┬─────────┘
//!          │                              │ payment verified
//!          │ embedded full artifact       ▼
//!          └────────────────────────►┌───────┐
//!                                    │ Ready │
//!                                    └───────┘
//! ```
//!
//! | Status | Entry action |
//! |--------|--------------|
//! | `SUBMITTED` / `PROCESSING` / `IN_REVIEW` | subscribe to the push channel; never poll |
//! | `PREVIEW_READY` | fetch the preview artifact, then close the channel |
//! | `PAID` / `FULL_READY` | fetch the normalized report and full artifact, assemble |
//!
//! The machine is a pure reducer: `apply(event) -> Vec<Command>`. The
//! runtime executes the commands (fetches, subscriptions, timers) and
//! feeds the results back as events, so every transition is testable
//! without a network.
//!
//! Statuses are trusted to progress monotonically by the backend, but the
//! reducer still guards against regression: an event carrying a status
//! earlier in the partial order than one already observed is dropped.

pub mod event;
pub mod reducer;
pub mod state;

pub use event::{EntryAction, SessionEvent};
pub use reducer::{Command, SessionReducer};
pub use state::{AuditSession, AuditStatus, ControllerPhase, StatusResponse};
