//! Payment provider
//!
//! Executes one paid call against a service endpoint. The provider either
//! returns the service's response together with the settled payment, or a
//! typed failure. It never retries.

use async_trait::async_trait;
use paypipe_core::domain::service::{Asset, ServiceDescriptor};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

/// A settled paid call
#[derive(Debug, Clone, PartialEq)]
pub struct PaidResponse {
    pub tx_id: String,
    pub amount: u64,
    pub asset: Asset,
    /// The paid service's response payload
    pub data: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaymentError {
    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("payment rejected: {0}")]
    Rejected(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid service response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn pay(
        &self,
        service: &ServiceDescriptor,
        payload: &JsonValue,
    ) -> Result<PaidResponse, PaymentError>;
}

/// Header carrying the settlement receipt on a paid response
const PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";

/// Pays services over HTTP
///
/// The paid request carries the payer and the quoted price; the service
/// settles on-chain and answers with the transaction id. The settlement
/// protocol itself lives on the service side.
pub struct HttpPaymentProvider {
    client: reqwest::Client,
    payer_address: String,
    network: String,
}

impl HttpPaymentProvider {
    pub fn new(payer_address: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            payer_address: payer_address.into(),
            network: network.into(),
        }
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn pay(
        &self,
        service: &ServiceDescriptor,
        payload: &JsonValue,
    ) -> Result<PaidResponse, PaymentError> {
        debug!(
            "Paying {} for {} at {}",
            service.price, service.id, service.endpoint
        );

        let response = self
            .client
            .post(&service.endpoint)
            .header("x-payer-address", &self.payer_address)
            .header("x-payment-amount", service.price.amount.to_string())
            .header("x-payment-asset", service.price.asset.symbol())
            .header("x-payment-network", &self.network)
            .json(payload)
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        let status = response.status();
        let header_tx = response
            .headers()
            .get(PAYMENT_RESPONSE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if status == reqwest::StatusCode::PAYMENT_REQUIRED {
            let body = response.text().await.unwrap_or_default();
            if body.to_lowercase().contains("insufficient") {
                return Err(PaymentError::InsufficientBalance);
            }
            return Err(PaymentError::Rejected(if body.is_empty() {
                "payment required".to_string()
            } else {
                body
            }));
        }

        if !status.is_success() {
            return Err(PaymentError::Rejected(format!(
                "service returned status {}",
                status.as_u16()
            )));
        }

        let data: JsonValue = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        let tx_id = header_tx
            .or_else(|| data.get("txId").and_then(JsonValue::as_str).map(str::to_string))
            .ok_or_else(|| PaymentError::InvalidResponse("missing transaction id".to_string()))?;

        Ok(PaidResponse {
            tx_id,
            amount: service.price.amount,
            asset: service.price.asset,
            data,
        })
    }
}
