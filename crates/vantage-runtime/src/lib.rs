//! Async session controller for the Vantage audit lifecycle.
//!
//! This crate drives the pure state machine from `vantage-core` on a
//! tokio runtime:
//!
//! - [`backend`]: the report backend seam (async trait) and error
//!   classification
//! - [`http`]: the production `reqwest` implementation of the seam
//! - [`push`]: the push update channel seam
//! - [`checkout`]: the checkout widget seam, reframed as a
//!   result-returning async call
//! - [`controller`]: the [`controller::SessionController`] that executes
//!   reducer commands, owns the countdown ticker and the push
//!   subscription, and tears both down deterministically
//!
//! Scheduling is cooperative and event-driven: fetches, the channel's
//! message wait, and the per-second countdown tick are independent
//! suspension points and the controller tolerates arbitrary
//! interleaving between them.

pub mod backend;
pub mod checkout;
pub mod controller;
pub mod http;
pub mod push;

pub use backend::{BackendError, ReportBackend};
pub use checkout::CheckoutProvider;
pub use controller::{PaymentOutcome, SessionController};
pub use push::{PushChannel, PushError, PushSubscription};
