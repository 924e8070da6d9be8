//! Checkout widget seam.
//!
//! The embedded vendor widget is reframed as one result-returning async
//! call, so verification and error handling stay linear instead of
//! nested callbacks. Dismissal is an ordinary outcome, not an error:
//! the initiate action must be re-enabled either way.

use async_trait::async_trait;
use vantage_core::payment::{CheckoutOutcome, OrderDetails, PaymentError};

/// Opens the checkout widget for one order and waits for its outcome.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Runs checkout for `order`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::CheckoutUnavailable`] if the widget
    /// cannot be opened at all.
    async fn checkout(&self, order: &OrderDetails) -> Result<CheckoutOutcome, PaymentError>;
}
