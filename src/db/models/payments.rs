//! Database models for tutor and student payments.

use crate::types::{LessonId, LessonInstanceId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Payment state of a tutor payment row. Rows are created `not_paid` and only
/// ever transition to `paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "tutor_payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TutorPaymentStatus {
    Paid,
    NotPaid,
}

/// Database response for a tutor payment row
#[derive(Debug, Clone, FromRow)]
pub struct TutorPaymentDBResponse {
    pub id: Uuid,
    pub lesson_instance_id: LessonInstanceId,
    pub tutor_id: UserId,
    pub payment_amount: Decimal,
    pub payment_status: TutorPaymentStatus,
    pub payment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database request for creating a tutor payment (one per billable attendance)
#[derive(Debug, Clone)]
pub struct TutorPaymentCreateDBRequest {
    pub lesson_instance_id: LessonInstanceId,
    pub tutor_id: UserId,
    pub payment_amount: Decimal,
}

/// One row of the tutor payment aggregation: the payment joined with its
/// lesson instance and lesson for display fields.
#[derive(Debug, Clone, FromRow)]
pub struct TutorPaymentRowDBResponse {
    pub id: Uuid,
    pub lesson_title: String,
    pub attendance_date: NaiveDate,
    pub is_attended: bool,
    pub payment_amount: Decimal,
    pub payment_status: TutorPaymentStatus,
    pub payment_date: Option<NaiveDate>,
}

/// Database response for a student payment row
#[derive(Debug, Clone, FromRow)]
pub struct StudentPaymentDBResponse {
    pub id: Uuid,
    pub student_id: UserId,
    pub lesson_id: LessonId,
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub payment_intent_id: String,
    pub payment_date: DateTime<Utc>,
    pub enrollment_completed: bool,
    pub needs_reconciliation: bool,
    pub created_at: DateTime<Utc>,
}

/// Database request for recording a student payment after provider confirmation
#[derive(Debug, Clone)]
pub struct StudentPaymentCreateDBRequest {
    pub student_id: UserId,
    pub lesson_id: LessonId,
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub payment_intent_id: String,
}
