//! Database repository for lesson instances (dated attendance sessions).

use crate::db::{
    errors::{DbError, Result},
    models::attendance::{LessonInstanceCreateDBRequest, LessonInstanceDBResponse},
};
use crate::types::{LessonId, LessonInstanceId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Connection, PgConnection};
use tracing::instrument;

pub struct LessonInstances<'c> {
    db: &'c mut PgConnection,
}

impl<'c> LessonInstances<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(lesson_id = %abbrev_uuid(&request.lesson_id)), err)]
    pub async fn create(&mut self, request: &LessonInstanceCreateDBRequest) -> Result<LessonInstanceDBResponse> {
        let instance = sqlx::query_as::<_, LessonInstanceDBResponse>(
            r#"
            INSERT INTO lesson_instances (lesson_id, tutor_id, date)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request.lesson_id)
        .bind(request.tutor_id)
        .bind(request.date)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(instance)
    }

    pub async fn get_by_id(&mut self, id: LessonInstanceId) -> Result<Option<LessonInstanceDBResponse>> {
        let instance = sqlx::query_as::<_, LessonInstanceDBResponse>(
            "SELECT * FROM lesson_instances WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(instance)
    }

    /// All sessions of a lesson, oldest first.
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&lesson_id)), err)]
    pub async fn list_for_lesson(&mut self, lesson_id: LessonId) -> Result<Vec<LessonInstanceDBResponse>> {
        let instances = sqlx::query_as::<_, LessonInstanceDBResponse>(
            "SELECT * FROM lesson_instances WHERE lesson_id = $1 ORDER BY date",
        )
        .bind(lesson_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(instances)
    }

    /// Mark a session attended and create the tutor's payment row for it, in
    /// one transaction. Marking an already-attended session is a no-op that
    /// returns the existing row; the unique constraint on
    /// `(lesson_instance_id, tutor_id)` keeps the payment single even if two
    /// marks race.
    ///
    /// `tutor_id` is who gets paid; `tutor_rate` is the lesson's rate at the
    /// time of marking.
    #[instrument(
        skip(self),
        fields(instance_id = %abbrev_uuid(&instance_id), tutor_id = %abbrev_uuid(&tutor_id)),
        err
    )]
    pub async fn mark_attended(
        &mut self,
        instance_id: LessonInstanceId,
        tutor_id: UserId,
        tutor_rate: Decimal,
        marked_at: DateTime<Utc>,
    ) -> Result<LessonInstanceDBResponse> {
        let mut tx = self.db.begin().await?;

        let instance = sqlx::query_as::<_, LessonInstanceDBResponse>(
            "SELECT * FROM lesson_instances WHERE id = $1 FOR UPDATE",
        )
        .bind(instance_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if instance.is_attended {
            return Ok(instance);
        }

        let instance = sqlx::query_as::<_, LessonInstanceDBResponse>(
            r#"
            UPDATE lesson_instances
            SET is_attended = TRUE, tutor_id = $2, marked_at = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(instance_id)
        .bind(tutor_id)
        .bind(marked_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO tutor_payments (lesson_instance_id, tutor_id, payment_amount)
            VALUES ($1, $2, $3)
            ON CONFLICT (lesson_instance_id, tutor_id) DO NOTHING
            "#,
        )
        .bind(instance_id)
        .bind(tutor_id)
        .bind(tutor_rate)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::payments::TutorPaymentStatus;
    use crate::test_utils::{seed_default_lesson, seed_tutor};
    use chrono::NaiveDate;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn mark_creates_one_payment_at_the_lesson_rate(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (_, lesson) = seed_default_lesson(&mut conn, "Grade 7").await;
        let tutor = seed_tutor(&mut conn, "tutor@example.com").await;

        let mut repo = LessonInstances::new(&mut conn);
        let instance = repo
            .create(&LessonInstanceCreateDBRequest {
                lesson_id: lesson.id,
                tutor_id: Some(tutor.id),
                date: NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
            })
            .await
            .unwrap();
        assert!(!instance.is_attended);

        let marked = repo
            .mark_attended(instance.id, tutor.id, lesson.tutor_rate, Utc::now())
            .await
            .unwrap();
        assert!(marked.is_attended);
        assert!(marked.marked_at.is_some());

        // Marking again neither fails nor duplicates the payment.
        repo.mark_attended(instance.id, tutor.id, lesson.tutor_rate, Utc::now())
            .await
            .unwrap();

        let payments = sqlx::query_as::<_, (Decimal, TutorPaymentStatus)>(
            "SELECT payment_amount, payment_status FROM tutor_payments WHERE lesson_instance_id = $1",
        )
        .bind(instance.id)
        .fetch_all(&mut *conn)
        .await
        .unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].0, lesson.tutor_rate);
        assert_eq!(payments[0].1, TutorPaymentStatus::NotPaid);
    }

    #[sqlx::test]
    async fn duplicate_date_for_a_lesson_is_rejected(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (_, lesson) = seed_default_lesson(&mut conn, "Grade 7").await;

        let mut repo = LessonInstances::new(&mut conn);
        let request = LessonInstanceCreateDBRequest {
            lesson_id: lesson.id,
            tutor_id: None,
            date: NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
        };
        repo.create(&request).await.unwrap();
        let err = repo.create(&request).await.unwrap_err();
        assert!(err.is_unique_violation_on("lesson_instances_lesson_date_unique"));
    }
}
