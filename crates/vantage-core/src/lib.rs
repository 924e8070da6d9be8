//! Domain logic for the Vantage audit session lifecycle.
//!
//! This crate contains the pure, synchronous half of the controller that
//! turns one paid-report intake into a sequence of state transitions:
//!
//! - [`session`]: the lifecycle state machine (a pure reducer over events)
//! - [`credentials`]: two-tier persisted storage for report access tokens
//! - [`gate`]: per-request token resolution and the authentication challenge
//! - [`countdown`]: the time-gated unlock computation
//! - [`payment`]: order/tier types and checkout outcome handling
//! - [`assemble`]: the multi-source content assembly pipeline
//! - [`config`]: controller configuration
//!
//! Nothing in this crate performs I/O or owns a task; the async runtime
//! lives in `vantage-runtime` and drives these types through injected
//! seams, which keeps every transition testable without a network or a
//! rendering harness.

pub mod assemble;
pub mod config;
pub mod countdown;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod payment;
pub mod session;

pub use error::FetchError;
