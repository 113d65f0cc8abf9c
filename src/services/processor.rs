use crate::config::ProcessorConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Payment processor request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Payment processor rejected the request: {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentStatus::RequiresPaymentMethod => write!(f, "requires_payment_method"),
            IntentStatus::RequiresConfirmation => write!(f, "requires_confirmation"),
            IntentStatus::RequiresAction => write!(f, "requires_action"),
            IntentStatus::Processing => write!(f, "processing"),
            IntentStatus::RequiresCapture => write!(f, "requires_capture"),
            IntentStatus::Canceled => write!(f, "canceled"),
            IntentStatus::Succeeded => write!(f, "succeeded"),
        }
    }
}

/// The processor's record of one in-progress charge attempt. `amount` is in
/// minor units; `metadata` carries whatever the creating call attached.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: IntentStatus,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, ProcessorError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProcessorError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Stripe payment-intents client, authenticated by secret key.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(config: &ProcessorConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn into_intent(response: reqwest::Response) -> Result<PaymentIntent, ProcessorError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<PaymentIntent>().await?)
        } else {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "unknown processor error".to_string());
            Err(ProcessorError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, ProcessorError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), currency.to_string()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await?;

        Self::into_intent(response).await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProcessorError> {
        let response = self
            .http
            .get(format!("{}/v1/payment_intents/{}", self.api_base, intent_id))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;

        Self::into_intent(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_deserializes_from_processor_json() {
        let intent: PaymentIntent = serde_json::from_str(
            r#"{
                "id": "pi_3abc",
                "client_secret": "pi_3abc_secret_xyz",
                "status": "succeeded",
                "amount": 7500,
                "currency": "usd",
                "metadata": {"scope": "payment_first", "topic": "Async Rust"}
            }"#,
        )
        .unwrap();

        assert_eq!(intent.status, IntentStatus::Succeeded);
        assert_eq!(intent.amount, 7500);
        assert_eq!(intent.metadata.get("topic").map(String::as_str), Some("Async Rust"));
    }

    #[test]
    fn missing_metadata_defaults_to_empty() {
        let intent: PaymentIntent = serde_json::from_str(
            r#"{"id": "pi_1", "client_secret": null, "status": "processing", "amount": 100, "currency": "usd"}"#,
        )
        .unwrap();

        assert_eq!(intent.status, IntentStatus::Processing);
        assert!(intent.metadata.is_empty());
    }
}
