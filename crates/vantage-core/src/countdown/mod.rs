//! Time-gated unlock countdown.
//!
//! Purely derived from two server-provided fields, `unlock_at` and
//! `is_unlocked`; the client performs no independent unlock business
//! rule. The per-second tick loop lives in the runtime crate; this
//! module owns the arithmetic so tests never sleep.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Observable countdown state at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownSnapshot {
    /// Time left until unlock, floored at zero.
    pub remaining: Duration,
    /// Whether unlock is available.
    pub ready: bool,
    /// `true` on exactly the tick where `ready` first became `true`.
    pub newly_ready: bool,
}

/// Countdown for one session's unlock gate.
///
/// Independent from and race-free with payment: payment state never
/// feeds into this computation.
#[derive(Debug, Clone)]
pub struct UnlockCountdown {
    unlock_at: Option<DateTime<Utc>>,
    is_unlocked: bool,
    fired: bool,
}

impl UnlockCountdown {
    /// Creates a countdown from the server-provided fields.
    #[must_use]
    pub const fn new(unlock_at: Option<DateTime<Utc>>, is_unlocked: bool) -> Self {
        Self {
            unlock_at,
            is_unlocked,
            fired: false,
        }
    }

    /// Remaining time at `now`, floored at zero.
    ///
    /// `is_unlocked` short-circuits to zero regardless of `unlock_at`.
    /// An absent `unlock_at` means the time gate does not apply, which
    /// also reads as zero.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        if self.is_unlocked {
            return Duration::ZERO;
        }
        match self.unlock_at {
            Some(unlock_at) => (unlock_at - now).to_std().unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        }
    }

    /// Advances the countdown to `now` and reports the snapshot.
    ///
    /// The `newly_ready` edge fires exactly once over the lifetime of
    /// this value, on the first tick where remaining reaches zero.
    pub fn tick(&mut self, now: DateTime<Utc>) -> CountdownSnapshot {
        let remaining = self.remaining(now);
        let ready = remaining == Duration::ZERO;
        let newly_ready = ready && !self.fired;
        if newly_ready {
            self.fired = true;
        }
        CountdownSnapshot {
            remaining,
            ready,
            newly_ready,
        }
    }
}
