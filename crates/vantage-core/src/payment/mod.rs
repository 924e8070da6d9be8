//! Payment order types and checkout outcomes.
//!
//! The asynchronous orchestration (order creation, checkout handoff,
//! verification) is driven by the runtime controller; this module owns
//! the value objects and the tier/product mapping.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Purchasable product level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentTier {
    /// One report.
    Single,
    /// Subscription-style bundle.
    Annual,
}

impl PaymentTier {
    /// Product identifier posted with payment verification.
    #[must_use]
    pub const fn product_id(self) -> &'static str {
        match self {
            Self::Single => "audit-report-single",
            Self::Annual => "audit-report-annual",
        }
    }
}

/// Caller's tier selection handed to `initiate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    /// Selected tier.
    pub tier: PaymentTier,
    /// Price in minor currency units.
    pub amount: i64,
}

/// Order as returned by the backend for a checkout attempt.
///
/// Created transiently for one attempt; discarded after verification
/// succeeds or fails.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderDetails {
    /// Backend-assigned order identifier.
    pub order_id: String,
    /// Amount in minor currency units.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Key identifying the checkout vendor account. The backend may
    /// omit it; a configured fallback is applied before the widget
    /// opens.
    #[serde(default)]
    pub vendor_key: Option<String>,
}

/// Backend reply to order creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiateResponse {
    /// The intake is already paid; skip checkout and fetch the full
    /// artifact directly. Must not create a duplicate order.
    AlreadyPaid,
    /// A fresh order to hand to the checkout widget.
    Order(OrderDetails),
}

/// What the checkout widget returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Payment completed; carries what verification needs.
    Completed(PaymentReceipt),
    /// Widget dismissed without paying. The initiate action must be
    /// re-enabled, not left permanently disabled.
    Dismissed,
}

/// Identifiers returned by a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Vendor payment identifier.
    pub payment_id: String,
    /// The order this payment settles.
    pub order_id: String,
    /// Vendor signature over (payment, order).
    pub signature: String,
}

/// Payload posted to the verification endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyRequest {
    /// The intake being unlocked.
    pub intake_id: String,
    /// Product identifier for the purchased tier.
    pub product_id: String,
    /// Vendor payment identifier.
    pub payment_id: String,
    /// The order this payment settles.
    pub order_id: String,
    /// Vendor signature over (payment, order).
    pub signature: String,
}

impl VerifyRequest {
    /// Builds the verification payload from a receipt.
    #[must_use]
    pub fn from_receipt(intake_id: &str, tier: PaymentTier, receipt: &PaymentReceipt) -> Self {
        Self {
            intake_id: intake_id.to_string(),
            product_id: tier.product_id().to_string(),
            payment_id: receipt.payment_id.clone(),
            order_id: receipt.order_id.clone(),
            signature: receipt.signature.clone(),
        }
    }
}

/// Errors surfaced by the payment flow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PaymentError {
    /// Order creation failed.
    #[error("order creation failed: {0}")]
    OrderCreation(String),

    /// Signature verification rejected the payment. Surfaced inline on
    /// the payment UI; re-enables the initiate step.
    #[error("payment verification failed for order {order_id}")]
    VerificationFailed {
        /// The rejected order.
        order_id: String,
    },

    /// The checkout widget could not be opened.
    #[error("checkout unavailable: {0}")]
    CheckoutUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_wire_format() {
        assert_eq!(serde_json::to_string(&PaymentTier::Single).unwrap(), "\"single\"");
        assert_eq!(serde_json::to_string(&PaymentTier::Annual).unwrap(), "\"annual\"");
    }

    #[test]
    fn tier_product_ids_differ() {
        assert_ne!(PaymentTier::Single.product_id(), PaymentTier::Annual.product_id());
    }

    #[test]
    fn verify_request_carries_receipt_fields() {
        let receipt = PaymentReceipt {
            payment_id: "pay-1".into(),
            order_id: "order-1".into(),
            signature: "sig-1".into(),
        };
        let req = VerifyRequest::from_receipt("intake-1", PaymentTier::Single, &receipt);
        assert_eq!(req.intake_id, "intake-1");
        assert_eq!(req.product_id, "audit-report-single");
        assert_eq!(req.order_id, "order-1");
        assert_eq!(req.signature, "sig-1");
    }

    #[test]
    fn order_details_deserialize() {
        let raw = serde_json::json!({
            "order_id": "order-9",
            "amount": 49_900,
            "currency": "USD",
            "vendor_key": "vk_live_x"
        });
        let order: OrderDetails = serde_json::from_value(raw).unwrap();
        assert_eq!(order.amount, 49_900);
        assert_eq!(order.vendor_key.as_deref(), Some("vk_live_x"));
    }

    #[test]
    fn order_details_tolerate_missing_vendor_key() {
        let raw = serde_json::json!({
            "order_id": "order-9",
            "amount": 49_900,
            "currency": "USD",
        });
        let order: OrderDetails = serde_json::from_value(raw).unwrap();
        assert!(order.vendor_key.is_none());
    }
}
