//! Production backend over HTTP.

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use vantage_core::credentials::ReportAccessToken;
use vantage_core::payment::{InitiateResponse, OrderDetails, PaymentRequest, VerifyRequest};
use vantage_core::session::StatusResponse;

use crate::backend::{BackendError, ReportBackend};

/// [`ReportBackend`] implementation over `reqwest`.
pub struct HttpBackend {
    client: reqwest::Client,
    base: String,
}

impl HttpBackend {
    /// Creates a backend client against the given base URL.
    #[must_use]
    pub fn new(client: reqwest::Client, base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { client, base }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn authorize(
        builder: RequestBuilder,
        token: Option<&ReportAccessToken>,
    ) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token.bearer()),
            None => builder,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&ReportAccessToken>,
    ) -> Result<T, BackendError> {
        let builder = Self::authorize(self.client.get(self.url(path)), token);
        let response = builder.send().await.map_err(classify_transport)?;
        decode(response).await
    }
}

fn classify_transport(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Transient(err.to_string())
    } else {
        BackendError::Transport(err.to_string())
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized);
    }
    if !status.is_success() {
        return Err(BackendError::Status { status: status.as_u16() });
    }
    response
        .json::<T>()
        .await
        .map_err(|err| BackendError::Decode(err.to_string()))
}

/// Wire shape of the order-creation reply: either an `already_paid`
/// marker or the order fields inline.
#[derive(Debug, Deserialize)]
struct CreateOrderReply {
    #[serde(default)]
    already_paid: bool,
    #[serde(flatten)]
    order: Option<OrderDetails>,
}

#[derive(Debug, Deserialize)]
struct VerifyReply {
    #[serde(default)]
    success: bool,
}

#[async_trait]
impl ReportBackend for HttpBackend {
    async fn fetch_session(
        &self,
        intake_id: &str,
        token: Option<&ReportAccessToken>,
    ) -> Result<StatusResponse, BackendError> {
        debug!(intake_id, "fetching session status");
        self.get_json(&format!("/api/audits/{intake_id}"), token).await
    }

    async fn fetch_preview(
        &self,
        intake_id: &str,
        token: Option<&ReportAccessToken>,
    ) -> Result<Value, BackendError> {
        self.get_json(&format!("/api/audits/{intake_id}/preview"), token).await
    }

    async fn fetch_full_artifact(
        &self,
        intake_id: &str,
        token: Option<&ReportAccessToken>,
    ) -> Result<Value, BackendError> {
        self.get_json(&format!("/api/audits/{intake_id}/artifact"), token).await
    }

    async fn fetch_report(
        &self,
        intake_id: &str,
        token: Option<&ReportAccessToken>,
    ) -> Result<Value, BackendError> {
        self.get_json(&format!("/api/audits/{intake_id}/report"), token).await
    }

    async fn create_order(
        &self,
        intake_id: &str,
        request: &PaymentRequest,
    ) -> Result<InitiateResponse, BackendError> {
        let response = self
            .client
            .post(self.url("/api/payments/orders"))
            .json(&serde_json::json!({
                "intake_id": intake_id,
                "tier": request.tier,
                "amount": request.amount,
                // Lets the backend dedupe retried order creations.
                "client_request_id": uuid::Uuid::new_v4().to_string(),
            }))
            .send()
            .await
            .map_err(classify_transport)?;
        let reply: CreateOrderReply = decode(response).await?;
        if reply.already_paid {
            return Ok(InitiateResponse::AlreadyPaid);
        }
        reply.order.map(InitiateResponse::Order).ok_or_else(|| {
            BackendError::Decode("order reply carried neither already_paid nor an order".into())
        })
    }

    async fn verify_payment(&self, request: &VerifyRequest) -> Result<bool, BackendError> {
        let response = self
            .client
            .post(self.url("/api/payments/verify"))
            .json(request)
            .send()
            .await
            .map_err(classify_transport)?;
        let reply: VerifyReply = decode(response).await?;
        Ok(reply.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let backend = HttpBackend::new(reqwest::Client::new(), "https://api.example.com///");
        assert_eq!(backend.url("/api/audits/x"), "https://api.example.com/api/audits/x");
    }

    #[test]
    fn order_reply_decodes_already_paid() {
        let reply: CreateOrderReply =
            serde_json::from_value(serde_json::json!({"already_paid": true})).unwrap();
        assert!(reply.already_paid);
        assert!(reply.order.is_none());
    }

    #[test]
    fn order_reply_decodes_inline_order() {
        let reply: CreateOrderReply = serde_json::from_value(serde_json::json!({
            "order_id": "order-1",
            "amount": 49_900,
            "currency": "USD",
            "vendor_key": "vk_live",
        }))
        .unwrap();
        assert!(!reply.already_paid);
        assert_eq!(
            reply.order.unwrap().order_id,
            "order-1"
        );
    }
}
