//! Stripe payment provider implementation
//!
//! Talks to the Stripe REST API directly over HTTPS using form-encoded
//! requests. Only the payment-intents endpoints are needed.

use crate::config::StripeConfig;
use crate::payment_providers::{
    IntentMetadata, IntentStatus, PaymentError, PaymentIntent, PaymentProvider, Result,
    from_minor_units, to_minor_units,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripeProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl StripeProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: STRIPE_API_BASE.to_string(),
        }
    }
}

impl From<StripeConfig> for StripeProvider {
    fn from(config: StripeConfig) -> Self {
        Self::new(config.api_key)
    }
}

/// Wire shape of a Stripe payment intent, reduced to the fields we use.
#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    client_secret: Option<String>,
    amount: i64,
    currency: String,
    status: IntentStatus,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl TryFrom<StripeIntent> for PaymentIntent {
    type Error = PaymentError;

    fn try_from(intent: StripeIntent) -> Result<Self> {
        let student_id = intent
            .metadata
            .get("student_id")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                PaymentError::InvalidData(format!(
                    "intent {} has no valid student_id metadata",
                    intent.id
                ))
            })?;
        let lesson_id = intent
            .metadata
            .get("lesson_id")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                PaymentError::InvalidData(format!(
                    "intent {} has no valid lesson_id metadata",
                    intent.id
                ))
            })?;
        let platform_fee = intent
            .metadata
            .get("platform_fee")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                PaymentError::InvalidData(format!(
                    "intent {} has no valid platform_fee metadata",
                    intent.id
                ))
            })?;

        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
            amount: from_minor_units(intent.amount),
            currency: intent.currency,
            status: intent.status,
            metadata: IntentMetadata { student_id, lesson_id, platform_fee },
        })
    }
}

impl StripeProvider {
    async fn parse_response(&self, response: reqwest::Response) -> Result<PaymentIntent> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::IntentNotFound);
        }
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("Stripe returned HTTP {status}"));
            return Err(PaymentError::ProviderApi(message));
        }

        let intent: StripeIntent = response
            .json()
            .await
            .map_err(|e| PaymentError::ProviderApi(format!("Malformed Stripe response: {e}")))?;
        intent.try_into()
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_payment_intent(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: IntentMetadata,
        idempotency_key: Option<&str>,
    ) -> Result<PaymentIntent> {
        let minor_units = to_minor_units(amount)?;
        let params = [
            ("amount", minor_units.to_string()),
            ("currency", currency.to_string()),
            ("metadata[student_id]", metadata.student_id.to_string()),
            ("metadata[lesson_id]", metadata.lesson_id.to_string()),
            ("metadata[platform_fee]", metadata.platform_fee.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let mut request = self
            .client
            .post(format!("{}/payment_intents", self.base_url))
            .bearer_auth(&self.api_key)
            .form(&params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::ProviderApi(format!("Stripe request failed: {e}")))?;
        self.parse_response(response).await
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent> {
        let response = self
            .client
            .get(format!("{}/payment_intents/{intent_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| PaymentError::ProviderApi(format!("Stripe request failed: {e}")))?;
        self.parse_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn wire_intent_converts_with_metadata() {
        let student_id = Uuid::new_v4();
        let lesson_id = Uuid::new_v4();
        let intent: StripeIntent = serde_json::from_value(json!({
            "id": "pi_123",
            "client_secret": "pi_123_secret",
            "amount": 4400,
            "currency": "usd",
            "status": "succeeded",
            "metadata": {
                "student_id": student_id.to_string(),
                "lesson_id": lesson_id.to_string(),
                "platform_fee": "4.00",
            }
        }))
        .unwrap();

        let intent = PaymentIntent::try_from(intent).unwrap();
        assert_eq!(intent.amount, rust_decimal_macros::dec!(44.00));
        assert!(intent.status.is_succeeded());
        assert_eq!(intent.metadata.student_id, student_id);
        assert_eq!(intent.metadata.lesson_id, lesson_id);
        assert_eq!(intent.metadata.platform_fee, rust_decimal_macros::dec!(4.00));
    }

    #[test]
    fn missing_metadata_is_invalid() {
        let intent: StripeIntent = serde_json::from_value(json!({
            "id": "pi_123",
            "client_secret": null,
            "amount": 4400,
            "currency": "usd",
            "status": "processing",
            "metadata": {}
        }))
        .unwrap();

        assert!(matches!(
            PaymentIntent::try_from(intent),
            Err(PaymentError::InvalidData(_))
        ));
    }

    #[test]
    fn unrecognised_status_parses_as_unknown() {
        let intent: StripeIntent = serde_json::from_value(json!({
            "id": "pi_123",
            "client_secret": null,
            "amount": 100,
            "currency": "usd",
            "status": "some_future_status",
            "metadata": {}
        }))
        .unwrap();
        assert_eq!(intent.status, IntentStatus::Unknown);
    }
}
