//! Persisted credential storage for report access tokens.
//!
//! Tokens live in one of two key/value scopes:
//!
//! - **durable**: survives a browser restart, carries an explicit expiry,
//!   used when the caller opted to "remember this device";
//! - **ephemeral**: cleared at end of session; no expiry check needed
//!   because tab closure is the expiry.
//!
//! At most one active token per intake id per scope; writing one scope
//! clears the other so two simultaneously valid tokens can never disagree
//! on trust level.

pub mod store;

pub use store::{
    CredentialStoreError, KeyValueStore, MemoryStore, ReportAccessToken, TokenStore,
};
