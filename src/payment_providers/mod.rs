//! Payment provider abstraction layer
//!
//! This module defines the `PaymentProvider` trait which abstracts payment
//! intent processing across providers. The application creates an intent up
//! front, the client completes it out of band, and confirmation re-fetches
//! the intent from the provider rather than trusting the client's word.

use crate::config::PaymentConfig;
use crate::types::{LessonId, UserId};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

pub mod dummy;
pub mod stripe;

/// Create a payment provider from configuration
///
/// This is the single point where we convert config into provider instances.
/// Adding a new provider requires adding a match arm here.
pub fn create_provider(config: PaymentConfig) -> Arc<dyn PaymentProvider> {
    match config {
        PaymentConfig::Stripe(stripe_config) => Arc::new(stripe::StripeProvider::from(stripe_config)),
        PaymentConfig::Dummy(dummy_config) => Arc::new(dummy::DummyProvider::from(dummy_config)),
    }
}

/// Result type for payment provider operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur during payment processing
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider API error: {0}")]
    ProviderApi(String),

    #[error("Payment intent not found")]
    IntentNotFound,

    #[error("Invalid payment data: {0}")]
    InvalidData(String),
}

impl From<PaymentError> for crate::errors::Error {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::IntentNotFound => crate::errors::Error::NotFound {
                resource: "Payment intent".to_string(),
                id: "unknown".to_string(),
            },
            other => crate::errors::Error::PaymentProvider {
                message: other.to_string(),
            },
        }
    }
}

/// Lifecycle state of a payment intent, mirroring the provider's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    /// Only this state means money has actually moved.
    pub fn is_succeeded(self) -> bool {
        matches!(self, IntentStatus::Succeeded)
    }
}

/// Who and what an intent pays for, carried in provider metadata so the
/// confirmation step can verify it against the request. The quoted platform
/// fee rides along too, so the recorded breakdown matches what was charged
/// even if the lesson changes or disappears before confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentMetadata {
    pub student_id: UserId,
    pub lesson_id: LessonId,
    pub platform_fee: Decimal,
}

/// A payment intent as the provider reports it.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    /// Provider-assigned intent id (e.g. `pi_...`)
    pub id: String,
    /// Secret the client needs to complete the payment
    pub client_secret: Option<String>,
    /// Amount in dollars
    pub amount: Decimal,
    pub currency: String,
    pub status: IntentStatus,
    pub metadata: IntentMetadata,
}

/// Convert a dollar amount to the provider's integer minor units. Amounts
/// with sub-cent precision are rejected rather than rounded.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    let cents = amount * Decimal::ONE_HUNDRED;
    if cents.fract() != Decimal::ZERO {
        return Err(PaymentError::InvalidData(format!(
            "amount {amount} has sub-cent precision"
        )));
    }
    cents
        .try_into()
        .map_err(|_| PaymentError::InvalidData(format!("amount {amount} out of range")))
}

/// Inverse of [`to_minor_units`].
pub fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Abstract payment provider interface
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a payment intent for `amount` dollars, tagged with `metadata`.
    ///
    /// `idempotency_key` lets a retried request reuse the provider-side
    /// intent instead of creating a second charge.
    async fn create_payment_intent(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: IntentMetadata,
        idempotency_key: Option<&str>,
    ) -> Result<PaymentIntent>;

    /// Fetch the current state of an intent from the provider.
    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minor_units_round_trip_whole_cents() {
        assert_eq!(to_minor_units(dec!(40.00)).unwrap(), 4000);
        assert_eq!(to_minor_units(dec!(44.00)).unwrap(), 4400);
        assert_eq!(to_minor_units(dec!(0.01)).unwrap(), 1);
        assert_eq!(from_minor_units(4400), dec!(44.00));
    }

    #[test]
    fn sub_cent_amounts_are_rejected() {
        assert!(matches!(
            to_minor_units(dec!(40.005)),
            Err(PaymentError::InvalidData(_))
        ));
    }

    #[test]
    fn only_succeeded_counts_as_paid() {
        assert!(IntentStatus::Succeeded.is_succeeded());
        for status in [
            IntentStatus::RequiresPaymentMethod,
            IntentStatus::Processing,
            IntentStatus::Canceled,
            IntentStatus::Unknown,
        ] {
            assert!(!status.is_succeeded());
        }
    }
}
