use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::PaymentConfig;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateGatewayOrder {
    /// Smallest currency unit (paise for INR).
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

/// Hosted payment processor. Only order creation is needed server-side;
/// payment confirmation arrives as a signed callback checked by [`super::signature`].
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the gateway's order object unchanged.
    async fn create_order(&self, order: CreateGatewayOrder) -> Result<Value, GatewayError>;
}

#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    /// `None` when the credentials are not configured.
    pub fn from_config(cfg: &PaymentConfig) -> anyhow::Result<Option<Self>> {
        let (Some(key_id), Some(key_secret)) = (cfg.key_id.clone(), cfg.key_secret.clone()) else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Some(Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            key_id,
            key_secret,
        }))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(&self, order: CreateGatewayOrder) -> Result<Value, GatewayError> {
        let url = format!("{}/v1/orders", self.api_base);
        let res = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&order)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "razorpay order creation rejected");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: Value = res.json().await?;
        debug!(receipt = %order.receipt, "razorpay order created");
        Ok(created)
    }
}
