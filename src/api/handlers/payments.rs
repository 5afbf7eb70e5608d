//! HTTP handlers for the student payment flow.
//!
//! The flow is intent-based: quote the fee, create a provider intent, let the
//! client complete it out of band, then confirm. Confirmation never trusts
//! the client; it re-fetches the intent from the provider, records the charge
//! idempotently, and only then enrolls. A payment that lands without an
//! enrollment is flagged for reconciliation instead of being swallowed.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use rust_decimal::Decimal;

use crate::{
    AppState,
    api::models::{
        payments::{
            ConfirmRequest, ConfirmResponse, CreateIntentRequest, CreateIntentResponse,
            FeeQuoteResponse,
        },
        users::CurrentUser,
    },
    db::{
        handlers::{EnrollmentOutcome, Lessons, RecordOutcome, Repository, StudentPayments},
        models::{lessons::LessonDBResponse, payments::StudentPaymentCreateDBRequest},
    },
    errors::{EnrollmentRejection, Error, Result},
    payment_providers::IntentMetadata,
    types::{LessonId, abbrev_uuid},
};

/// Platform fee and total charge for a lesson fee at the given percentage.
/// Exact decimal arithmetic, rounded to whole cents.
pub fn fee_quote(lesson_fee: Decimal, percent: Decimal) -> (Decimal, Decimal) {
    let platform_fee = (lesson_fee * percent / Decimal::ONE_HUNDRED).round_dp(2);
    (platform_fee, lesson_fee + platform_fee)
}

async fn active_lesson(state: &AppState, lesson_id: LessonId) -> Result<LessonDBResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lessons = Lessons::new(&mut conn);
    let lesson = lessons
        .get_by_id(lesson_id)
        .await?
        .filter(|l| l.is_active)
        .ok_or_else(|| Error::NotFound {
            resource: "Lesson".to_string(),
            id: lesson_id.to_string(),
        })?;
    Ok(lesson)
}

#[utoipa::path(
    get,
    path = "/payments/calculate/{lesson_id}",
    tag = "payments",
    summary = "Quote the total charge for enrolling in a lesson",
    params(("lesson_id" = Uuid, Path, description = "Lesson to quote")),
    responses(
        (status = 200, description = "Fee breakdown", body = FeeQuoteResponse),
        (status = 404, description = "Lesson not found")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(lesson_id = %abbrev_uuid(&lesson_id)))]
pub async fn calculate_fees(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(lesson_id): Path<LessonId>,
) -> Result<Json<FeeQuoteResponse>> {
    let lesson = active_lesson(&state, lesson_id).await?;
    let percent = state.config.fees.platform_fee_percent;
    let (platform_fee, total) = fee_quote(lesson.student_rate, percent);

    Ok(Json(FeeQuoteResponse {
        lesson_id,
        lesson_fee: lesson.student_rate,
        platform_fee,
        total,
        platform_fee_percent: percent,
    }))
}

#[utoipa::path(
    post,
    path = "/payments/create-intent",
    tag = "payments",
    summary = "Create a payment intent for a lesson enrollment",
    request_body = CreateIntentRequest,
    responses(
        (status = 200, description = "Intent created", body = CreateIntentResponse),
        (status = 403, description = "Only students can pay for enrollment"),
        (status = 404, description = "Lesson not found"),
        (status = 409, description = "Student is ineligible to enroll")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&current.id), lesson_id = %abbrev_uuid(&request.lesson_id)))]
pub async fn create_intent(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<CreateIntentRequest>,
) -> Result<Json<CreateIntentResponse>> {
    if !current.is_student() {
        return Err(Error::Forbidden {
            message: "Only students can pay for enrollment".to_string(),
        });
    }

    let lesson = active_lesson(&state, request.lesson_id).await?;

    // Cheap eligibility checks before any provider round trip. The
    // authoritative re-check happens at enrollment time under the row lock.
    {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let mut lessons = Lessons::new(&mut conn);

        if lessons.enrollment_status(current.id, lesson.id).await?.is_some() {
            return Err(Error::Enrollment(EnrollmentRejection::AlreadyEnrolled));
        }
        if lessons.enrolled_count(lesson.id).await? >= i64::from(lesson.total_cap) {
            return Err(Error::Enrollment(EnrollmentRejection::LessonFull));
        }
    }

    let (platform_fee, total) =
        fee_quote(lesson.student_rate, state.config.fees.platform_fee_percent);

    // Keyed per student and lesson so a retried request reuses the intent.
    let idempotency_key = format!("enroll-{}-{}", current.id, lesson.id);
    let intent = state
        .payments
        .create_payment_intent(
            total,
            "usd",
            IntentMetadata {
                student_id: current.id,
                lesson_id: lesson.id,
                platform_fee,
            },
            Some(&idempotency_key),
        )
        .await?;

    tracing::info!(intent = %intent.id, "Created payment intent");
    Ok(Json(CreateIntentResponse {
        payment_intent_id: intent.id,
        client_secret: intent.client_secret,
        amount: intent.amount,
        currency: intent.currency,
    }))
}

#[utoipa::path(
    post,
    path = "/payments/confirm",
    tag = "payments",
    summary = "Confirm a completed payment and enroll the student",
    request_body = ConfirmRequest,
    responses(
        (status = 200, description = "Payment recorded and student enrolled", body = ConfirmResponse),
        (status = 402, description = "Payment has not succeeded"),
        (status = 404, description = "Payment intent not found"),
        (status = 409, description = "Payment captured but enrollment failed")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = %abbrev_uuid(&current.id)))]
pub async fn confirm_payment(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>> {
    let intent = state.payments.retrieve_payment_intent(&request.payment_intent_id).await?;

    if !current.is_agency() && intent.metadata.student_id != current.id {
        return Err(Error::Forbidden {
            message: "This payment intent belongs to another student".to_string(),
        });
    }

    if !intent.status.is_succeeded() {
        return Err(Error::PaymentProvider {
            message: format!("Payment intent {} has not completed", intent.id),
        });
    }

    let student_id = intent.metadata.student_id;
    let lesson_id = intent.metadata.lesson_id;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let recorded = {
        let mut payments = StudentPayments::new(&mut conn);
        payments
            .record(&StudentPaymentCreateDBRequest {
                student_id,
                lesson_id,
                amount: intent.amount,
                platform_fee: intent.metadata.platform_fee,
                payment_intent_id: intent.id.clone(),
            })
            .await?
    };

    let payment = match recorded {
        RecordOutcome::Recorded(payment) => payment,
        RecordOutcome::AlreadyRecorded(existing) => {
            if existing.enrollment_completed {
                let still_enrolled = {
                    let mut lessons = Lessons::new(&mut conn);
                    lessons.enrollment_status(student_id, lesson_id).await?.is_some()
                };
                if still_enrolled {
                    tracing::info!(payment_id = %abbrev_uuid(&existing.id), "Replayed confirmation");
                    return Ok(Json(ConfirmResponse::from_payment(existing, true)));
                }
                // Enrolled once but since withdrawn; the captured funds
                // cover re-enrolling, so fall through to the enrollment.
            }
            // Otherwise paid earlier but never enrolled; retry now.
            existing
        }
    };

    let outcome = {
        let mut lessons = Lessons::new(&mut conn);
        lessons
            .enroll_student(
                student_id,
                lesson_id,
                Utc::now().date_naive(),
                state.config.attendance.schedule_weeks_ahead,
            )
            .await
    };

    let mut payments = StudentPayments::new(&mut conn);
    match outcome {
        Ok(EnrollmentOutcome::Enrolled(_)) => {
            payments.mark_enrollment_completed(payment.id).await?;
            tracing::info!(payment_id = %abbrev_uuid(&payment.id), "Payment confirmed and student enrolled");
            Ok(Json(ConfirmResponse::from_payment(payment, false)))
        }
        Ok(EnrollmentOutcome::Rejected(rejection)) => {
            payments.flag_for_reconciliation(payment.id).await?;
            Err(Error::PaymentUnreconciled {
                payment_id: payment.id,
                rejection,
            })
        }
        Err(e) => {
            payments.flag_for_reconciliation(payment.id).await?;
            Err(e.into())
        }
    }
}
