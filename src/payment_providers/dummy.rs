//! Dummy payment provider implementation
//!
//! Intents succeed instantly (or are uniformly declined when configured to),
//! without talking to any external service. Useful for tests and local
//! development.

use crate::config::DummyConfig;
use crate::payment_providers::{
    IntentMetadata, IntentStatus, PaymentError, PaymentIntent, PaymentProvider, Result,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory payment provider. Created intents live for the lifetime of the
/// process.
pub struct DummyProvider {
    decline_all: bool,
    intents: Mutex<HashMap<String, PaymentIntent>>,
}

impl DummyProvider {
    pub fn new(decline_all: bool) -> Self {
        Self {
            decline_all,
            intents: Mutex::new(HashMap::new()),
        }
    }
}

impl From<DummyConfig> for DummyProvider {
    fn from(config: DummyConfig) -> Self {
        Self::new(config.decline_all)
    }
}

#[async_trait]
impl PaymentProvider for DummyProvider {
    async fn create_payment_intent(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: IntentMetadata,
        idempotency_key: Option<&str>,
    ) -> Result<PaymentIntent> {
        // Amount validation mirrors the real provider.
        crate::payment_providers::to_minor_units(amount)?;

        let id = match idempotency_key {
            Some(key) => format!("pi_dummy_{key}"),
            None => format!("pi_dummy_{}", uuid::Uuid::new_v4().simple()),
        };

        let mut intents = self.intents.lock().expect("dummy intent map poisoned");
        if let Some(existing) = intents.get(&id) {
            return Ok(existing.clone());
        }

        let status = if self.decline_all {
            IntentStatus::RequiresPaymentMethod
        } else {
            IntentStatus::Succeeded
        };

        let intent = PaymentIntent {
            id: id.clone(),
            client_secret: Some(format!("{id}_secret")),
            amount,
            currency: currency.to_string(),
            status,
            metadata,
        };
        intents.insert(id, intent.clone());

        tracing::info!(intent_id = %intent.id, %amount, "Dummy provider created payment intent");
        Ok(intent)
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent> {
        if !intent_id.starts_with("pi_dummy_") {
            return Err(PaymentError::InvalidData(
                "Invalid dummy intent id format".to_string(),
            ));
        }

        self.intents
            .lock()
            .expect("dummy intent map poisoned")
            .get(intent_id)
            .cloned()
            .ok_or(PaymentError::IntentNotFound)
    }
}
