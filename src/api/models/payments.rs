//! API models for student payments and tutor earnings.

use crate::db::models::payments::{
    StudentPaymentDBResponse, TutorPaymentDBResponse, TutorPaymentRowDBResponse,
    TutorPaymentStatus,
};
use crate::types::{LessonId, UserId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Fee quote for enrolling in a lesson. All figures are exact decimals.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeeQuoteResponse {
    #[schema(value_type = Uuid)]
    pub lesson_id: LessonId,
    /// The lesson's per-enrollment rate
    pub lesson_fee: Decimal,
    /// Platform fee charged on top
    pub platform_fee: Decimal,
    /// What the student is charged: lesson_fee + platform_fee
    pub total: Decimal,
    pub platform_fee_percent: Decimal,
}

/// Request body for creating a payment intent
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateIntentRequest {
    #[schema(value_type = Uuid)]
    pub lesson_id: LessonId,
}

/// A created payment intent, ready for the client to complete
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateIntentResponse {
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub amount: Decimal,
    pub currency: String,
}

/// Request body for confirming a payment intent
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConfirmRequest {
    pub payment_intent_id: String,
}

/// Outcome of a successful confirmation: the recorded payment plus the
/// enrollment it paid for.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfirmResponse {
    pub payment_id: Uuid,
    #[schema(value_type = Uuid)]
    pub student_id: UserId,
    #[schema(value_type = Uuid)]
    pub lesson_id: LessonId,
    pub amount: Decimal,
    pub platform_fee: Decimal,
    /// True when this intent had already been confirmed earlier
    pub already_processed: bool,
}

impl ConfirmResponse {
    pub fn from_payment(payment: StudentPaymentDBResponse, already_processed: bool) -> Self {
        Self {
            payment_id: payment.id,
            student_id: payment.student_id,
            lesson_id: payment.lesson_id,
            amount: payment.amount,
            platform_fee: payment.platform_fee,
            already_processed,
        }
    }
}

/// One row in a tutor's earnings breakdown
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TutorPaymentRowResponse {
    pub id: Uuid,
    pub lesson_title: String,
    pub attendance_date: NaiveDate,
    pub is_attended: bool,
    pub payment_amount: Decimal,
    pub payment_status: TutorPaymentStatus,
    pub payment_date: Option<NaiveDate>,
}

impl From<TutorPaymentRowDBResponse> for TutorPaymentRowResponse {
    fn from(row: TutorPaymentRowDBResponse) -> Self {
        Self {
            id: row.id,
            lesson_title: row.lesson_title,
            attendance_date: row.attendance_date,
            is_attended: row.is_attended,
            payment_amount: row.payment_amount,
            payment_status: row.payment_status,
            payment_date: row.payment_date,
        }
    }
}

/// Aggregated earnings view for a tutor. Zero rows yields zero totals.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TutorPaymentSummaryResponse {
    #[schema(value_type = Uuid)]
    pub tutor_id: UserId,
    pub total_earned: Decimal,
    pub total_unpaid: Decimal,
    pub paid_count: usize,
    pub unpaid_count: usize,
    pub payments: Vec<TutorPaymentRowResponse>,
}

/// A tutor payment after settlement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TutorPaymentResponse {
    pub id: Uuid,
    #[schema(value_type = Uuid)]
    pub tutor_id: UserId,
    pub payment_amount: Decimal,
    pub payment_status: TutorPaymentStatus,
    pub payment_date: Option<NaiveDate>,
}

impl From<TutorPaymentDBResponse> for TutorPaymentResponse {
    fn from(payment: TutorPaymentDBResponse) -> Self {
        Self {
            id: payment.id,
            tutor_id: payment.tutor_id,
            payment_amount: payment.payment_amount,
            payment_status: payment.payment_status,
            payment_date: payment.payment_date,
        }
    }
}
