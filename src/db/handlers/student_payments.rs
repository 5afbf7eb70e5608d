//! Database repository for student payments.
//!
//! One row per successful provider charge, keyed by the provider's intent id.
//! The unique constraint on `payment_intent_id` is the idempotency anchor for
//! confirmation replays.

use crate::db::{
    errors::{DbError, Result},
    models::payments::{StudentPaymentCreateDBRequest, StudentPaymentDBResponse},
};
use crate::types::abbrev_uuid;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Result of recording a payment: a fresh row, or the existing row when the
/// same intent was already recorded.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Recorded(StudentPaymentDBResponse),
    AlreadyRecorded(StudentPaymentDBResponse),
}

impl RecordOutcome {
    pub fn into_inner(self) -> StudentPaymentDBResponse {
        match self {
            RecordOutcome::Recorded(p) | RecordOutcome::AlreadyRecorded(p) => p,
        }
    }
}

pub struct StudentPayments<'c> {
    db: &'c mut PgConnection,
}

impl<'c> StudentPayments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Record a confirmed charge. A replay of the same intent id comes back
    /// as `AlreadyRecorded` with the original row instead of an error.
    #[instrument(
        skip(self, request),
        fields(student_id = %abbrev_uuid(&request.student_id), intent = %request.payment_intent_id),
        err
    )]
    pub async fn record(&mut self, request: &StudentPaymentCreateDBRequest) -> Result<RecordOutcome> {
        let inserted = sqlx::query_as::<_, StudentPaymentDBResponse>(
            r#"
            INSERT INTO student_payments (student_id, lesson_id, amount, platform_fee, payment_intent_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.student_id)
        .bind(request.lesson_id)
        .bind(request.amount)
        .bind(request.platform_fee)
        .bind(&request.payment_intent_id)
        .fetch_one(&mut *self.db)
        .await;

        match inserted {
            Ok(payment) => Ok(RecordOutcome::Recorded(payment)),
            Err(e) => {
                let db_err = DbError::from(e);
                if db_err.is_unique_violation_on("student_payments_intent_unique") {
                    let existing = self
                        .get_by_intent(&request.payment_intent_id)
                        .await?
                        .ok_or(DbError::NotFound)?;
                    Ok(RecordOutcome::AlreadyRecorded(existing))
                } else {
                    Err(db_err)
                }
            }
        }
    }

    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<StudentPaymentDBResponse>> {
        let payment = sqlx::query_as::<_, StudentPaymentDBResponse>(
            "SELECT * FROM student_payments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(payment)
    }

    pub async fn get_by_intent(&mut self, intent_id: &str) -> Result<Option<StudentPaymentDBResponse>> {
        let payment = sqlx::query_as::<_, StudentPaymentDBResponse>(
            "SELECT * FROM student_payments WHERE payment_intent_id = $1",
        )
        .bind(intent_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(payment)
    }

    /// Flag that the enrollment half of the flow completed.
    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_enrollment_completed(&mut self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE student_payments SET enrollment_completed = TRUE, needs_reconciliation = FALSE WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Flag a paid-but-not-enrolled row for manual reconciliation.
    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    pub async fn flag_for_reconciliation(&mut self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE student_payments SET needs_reconciliation = TRUE WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::payments::StudentPaymentCreateDBRequest;
    use crate::test_utils::{seed_default_lesson, seed_student};
    use rust_decimal_macros::dec;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn replayed_intent_returns_the_original_row(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (_, lesson) = seed_default_lesson(&mut conn, "Grade 7").await;
        let student = seed_student(&mut conn, "payer@example.com", Some("Grade 7")).await;

        let request = StudentPaymentCreateDBRequest {
            student_id: student.id,
            lesson_id: lesson.id,
            amount: dec!(40.00),
            platform_fee: dec!(2.00),
            payment_intent_id: "pi_test_123".to_string(),
        };

        let mut repo = StudentPayments::new(&mut conn);
        let first = repo.record(&request).await.unwrap();
        assert!(matches!(first, RecordOutcome::Recorded(_)));
        let first = first.into_inner();
        assert!(!first.enrollment_completed);
        assert!(!first.needs_reconciliation);

        let replay = repo.record(&request).await.unwrap();
        match replay {
            RecordOutcome::AlreadyRecorded(existing) => assert_eq!(existing.id, first.id),
            RecordOutcome::Recorded(_) => panic!("replay must not create a second row"),
        }
    }

    #[sqlx::test]
    async fn reconciliation_flags_round_trip(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (_, lesson) = seed_default_lesson(&mut conn, "Grade 7").await;
        let student = seed_student(&mut conn, "flag@example.com", Some("Grade 7")).await;

        let mut repo = StudentPayments::new(&mut conn);
        let payment = repo
            .record(&StudentPaymentCreateDBRequest {
                student_id: student.id,
                lesson_id: lesson.id,
                amount: dec!(40.00),
                platform_fee: dec!(2.00),
                payment_intent_id: "pi_flags".to_string(),
            })
            .await
            .unwrap()
            .into_inner();

        repo.flag_for_reconciliation(payment.id).await.unwrap();
        let flagged = repo.get_by_id(payment.id).await.unwrap().unwrap();
        assert!(flagged.needs_reconciliation);

        repo.mark_enrollment_completed(payment.id).await.unwrap();
        let completed = repo.get_by_id(payment.id).await.unwrap().unwrap();
        assert!(completed.enrollment_completed);
        assert!(!completed.needs_reconciliation);
    }
}
