//! Database repository for tutor payments.
//!
//! Rows are created by the attendance mark flow; this module reads them back
//! for the tutor's earnings view and lets agencies settle them.

use crate::db::{
    errors::{DbError, Result},
    models::payments::{TutorPaymentDBResponse, TutorPaymentRowDBResponse, TutorPaymentStatus},
};
use crate::types::{UserId, abbrev_uuid};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Totals across a set of payment rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentTotals {
    pub total_earned: Decimal,
    pub total_unpaid: Decimal,
}

/// Sum a tutor's rows into earned and outstanding totals. An empty slice
/// yields zeroes, not an error.
pub fn totals(rows: &[TutorPaymentRowDBResponse]) -> PaymentTotals {
    let mut total_earned = Decimal::ZERO;
    let mut total_unpaid = Decimal::ZERO;
    for row in rows {
        total_earned += row.payment_amount;
        if row.payment_status == TutorPaymentStatus::NotPaid {
            total_unpaid += row.payment_amount;
        }
    }
    PaymentTotals { total_earned, total_unpaid }
}

pub struct TutorPayments<'c> {
    db: &'c mut PgConnection,
}

impl<'c> TutorPayments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<TutorPaymentDBResponse>> {
        let payment = sqlx::query_as::<_, TutorPaymentDBResponse>(
            "SELECT * FROM tutor_payments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(payment)
    }

    /// A tutor's payment rows with lesson title and session date attached,
    /// newest session first.
    #[instrument(skip(self), fields(tutor_id = %abbrev_uuid(&tutor_id)), err)]
    pub async fn rows_for_tutor(&mut self, tutor_id: UserId) -> Result<Vec<TutorPaymentRowDBResponse>> {
        let rows = sqlx::query_as::<_, TutorPaymentRowDBResponse>(
            r#"
            SELECT tp.id, l.title AS lesson_title, li.date AS attendance_date,
                   li.is_attended, tp.payment_amount, tp.payment_status, tp.payment_date
            FROM tutor_payments tp
            JOIN lesson_instances li ON li.id = tp.lesson_instance_id
            JOIN lessons l ON l.id = li.lesson_id
            WHERE tp.tutor_id = $1
            ORDER BY li.date DESC
            "#,
        )
        .bind(tutor_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows)
    }

    /// Mark a payment settled. Idempotent: settling an already-paid row keeps
    /// its original payment date.
    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    pub async fn settle(&mut self, id: Uuid, paid_on: NaiveDate) -> Result<TutorPaymentDBResponse> {
        let payment = sqlx::query_as::<_, TutorPaymentDBResponse>(
            r#"
            UPDATE tutor_payments
            SET payment_status = 'paid',
                payment_date = COALESCE(payment_date, $2),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(paid_on)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::attendance::LessonInstances;
    use crate::db::models::attendance::LessonInstanceCreateDBRequest;
    use crate::test_utils::{seed_default_lesson, seed_tutor};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use sqlx::PgPool;

    fn row(amount: Decimal, status: TutorPaymentStatus) -> TutorPaymentRowDBResponse {
        TutorPaymentRowDBResponse {
            id: Uuid::new_v4(),
            lesson_title: "Algebra".to_string(),
            attendance_date: NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
            is_attended: true,
            payment_amount: amount,
            payment_status: status,
            payment_date: None,
        }
    }

    #[test]
    fn totals_of_no_rows_are_zero() {
        let t = totals(&[]);
        assert_eq!(t.total_earned, Decimal::ZERO);
        assert_eq!(t.total_unpaid, Decimal::ZERO);
    }

    #[test]
    fn totals_split_paid_from_unpaid() {
        let rows = vec![
            row(dec!(25.00), TutorPaymentStatus::Paid),
            row(dec!(25.00), TutorPaymentStatus::NotPaid),
            row(dec!(30.50), TutorPaymentStatus::NotPaid),
        ];
        let t = totals(&rows);
        assert_eq!(t.total_earned, dec!(80.50));
        assert_eq!(t.total_unpaid, dec!(55.50));
    }

    #[sqlx::test]
    async fn settle_is_idempotent_and_keeps_first_date(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (_, lesson) = seed_default_lesson(&mut conn, "Grade 7").await;
        let tutor = seed_tutor(&mut conn, "tutor@example.com").await;

        let mut instances = LessonInstances::new(&mut conn);
        let instance = instances
            .create(&LessonInstanceCreateDBRequest {
                lesson_id: lesson.id,
                tutor_id: Some(tutor.id),
                date: NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
            })
            .await
            .unwrap();
        instances
            .mark_attended(instance.id, tutor.id, lesson.tutor_rate, Utc::now())
            .await
            .unwrap();

        let mut repo = TutorPayments::new(&mut conn);
        let rows = repo.rows_for_tutor(tutor.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payment_status, TutorPaymentStatus::NotPaid);

        let first_date = NaiveDate::from_ymd_opt(2024, 9, 10).unwrap();
        let settled = repo.settle(rows[0].id, first_date).await.unwrap();
        assert_eq!(settled.payment_status, TutorPaymentStatus::Paid);
        assert_eq!(settled.payment_date, Some(first_date));

        let again = repo
            .settle(rows[0].id, NaiveDate::from_ymd_opt(2024, 9, 20).unwrap())
            .await
            .unwrap();
        assert_eq!(again.payment_date, Some(first_date));
    }

    #[sqlx::test]
    async fn settle_unknown_payment_is_not_found(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = TutorPayments::new(&mut conn);
        let err = repo
            .settle(Uuid::new_v4(), NaiveDate::from_ymd_opt(2024, 9, 10).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }
}
