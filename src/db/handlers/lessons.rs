//! Database repository for lessons and enrollment.
//!
//! Enrollment is the contended path: two students racing for the last seat
//! must serialize on the lesson row. `enroll_student` takes a `FOR UPDATE`
//! lock on the lesson, recounts seats from `student_lessons` under that lock,
//! and only then applies the business checks in order.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::lessons::{
        DayOfWeek, EnrolledSlotDBResponse, EnrollmentDBResponse, LessonCreateDBRequest,
        LessonDBResponse, LessonFilter, LessonUpdateDBRequest,
    },
};
use crate::errors::EnrollmentRejection;
use crate::types::{LessonId, UserId, abbrev_uuid};
use chrono::{Datelike, Days, NaiveDate, NaiveTime};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

/// Result of an enrollment attempt. Rejections are ordinary values here, not
/// errors: the transaction rolls back and the caller decides how to surface
/// them.
#[derive(Debug, Clone)]
pub enum EnrollmentOutcome {
    Enrolled(EnrollmentDBResponse),
    Rejected(EnrollmentRejection),
}

/// Two weekly slots clash when they fall on the same day and their half-open
/// time ranges intersect. Back-to-back slots (one ends exactly when the other
/// starts) do not clash.
pub fn slots_overlap(
    day: DayOfWeek,
    start: NaiveTime,
    end: NaiveTime,
    other: &EnrolledSlotDBResponse,
) -> bool {
    day == other.day_of_week && start < other.end_time && end > other.start_time
}

/// First calendar date on or after `today` that falls on `weekday`.
pub fn next_occurrence(today: NaiveDate, weekday: chrono::Weekday) -> NaiveDate {
    let ahead =
        (weekday.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7;
    today + Days::new(u64::from(ahead))
}

pub struct Lessons<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Lessons<'c> {
    type CreateRequest = LessonCreateDBRequest;
    type UpdateRequest = LessonUpdateDBRequest;
    type Response = LessonDBResponse;
    type Id = LessonId;
    type Filter = LessonFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let lesson = sqlx::query_as::<_, LessonDBResponse>(
            r#"
            INSERT INTO lessons (
                agency_id, location_id, subject_id, tutor_id, title, description,
                day_of_week, start_time, end_time, student_rate, tutor_rate,
                total_cap, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(request.agency_id)
        .bind(request.location_id)
        .bind(request.subject_id)
        .bind(request.tutor_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.day_of_week)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(request.student_rate)
        .bind(request.tutor_rate)
        .bind(request.total_cap)
        .bind(request.is_active)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(lesson)
    }

    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let lesson = sqlx::query_as::<_, LessonDBResponse>("SELECT * FROM lessons WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(lesson)
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let lessons = sqlx::query_as::<_, LessonDBResponse>(
            r#"
            SELECT * FROM lessons
            WHERE ($1::uuid IS NULL OR agency_id = $1)
              AND ($2::uuid IS NULL OR tutor_id = $2)
              AND (NOT $3 OR is_active)
            ORDER BY day_of_week, start_time
            "#,
        )
        .bind(filter.agency_id)
        .bind(filter.tutor_id)
        .bind(filter.active_only)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(lessons)
    }

    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(lesson_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let lesson = sqlx::query_as::<_, LessonDBResponse>(
            r#"
            UPDATE lessons SET
                tutor_id = COALESCE($2, tutor_id),
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                student_rate = COALESCE($5, student_rate),
                tutor_rate = COALESCE($6, tutor_rate),
                total_cap = COALESCE($7, total_cap),
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.tutor_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.student_rate)
        .bind(request.tutor_rate)
        .bind(request.total_cap)
        .bind(request.is_active)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(lesson)
    }
}

impl<'c> Lessons<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Attempt to enroll a student in a lesson.
    ///
    /// Runs in a single transaction: the lesson row is locked `FOR UPDATE`,
    /// the seat count is recomputed from the join table under that lock, and
    /// the checks apply in a fixed order so a request failing several rules
    /// always reports the same one: duplicate, capacity, time clash, grade
    /// level.
    ///
    /// On the lesson's first ever enrollment, the upcoming weekly instances
    /// are generated inside the same transaction.
    #[instrument(
        skip(self),
        fields(student_id = %abbrev_uuid(&student_id), lesson_id = %abbrev_uuid(&lesson_id)),
        err
    )]
    pub async fn enroll_student(
        &mut self,
        student_id: UserId,
        lesson_id: LessonId,
        today: NaiveDate,
        weeks_ahead: u32,
    ) -> Result<EnrollmentOutcome> {
        let mut tx = self.db.begin().await?;

        let lesson = sqlx::query_as::<_, LessonDBResponse>(
            "SELECT * FROM lessons WHERE id = $1 AND is_active FOR UPDATE",
        )
        .bind(lesson_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        let student = sqlx::query_as::<_, crate::db::models::users::UserDBResponse>(
            "SELECT * FROM users WHERE id = $1 AND role = 'student'",
        )
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        let already_enrolled = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM student_lessons WHERE student_id = $1 AND lesson_id = $2)",
        )
        .bind(student_id)
        .bind(lesson_id)
        .fetch_one(&mut *tx)
        .await?;

        if already_enrolled {
            return Ok(EnrollmentOutcome::Rejected(EnrollmentRejection::AlreadyEnrolled));
        }

        // The lock makes this count authoritative; current_cap is a cached
        // display value and never drives the decision.
        let enrolled_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM student_lessons WHERE lesson_id = $1",
        )
        .bind(lesson_id)
        .fetch_one(&mut *tx)
        .await?;

        if enrolled_count >= i64::from(lesson.total_cap) {
            return Ok(EnrollmentOutcome::Rejected(EnrollmentRejection::LessonFull));
        }

        let existing_slots = sqlx::query_as::<_, EnrolledSlotDBResponse>(
            r#"
            SELECT l.id AS lesson_id, l.day_of_week, l.start_time, l.end_time
            FROM student_lessons sl
            JOIN lessons l ON l.id = sl.lesson_id
            WHERE sl.student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_all(&mut *tx)
        .await?;

        if existing_slots
            .iter()
            .any(|slot| slots_overlap(lesson.day_of_week, lesson.start_time, lesson.end_time, slot))
        {
            return Ok(EnrollmentOutcome::Rejected(EnrollmentRejection::TimeClash));
        }

        let subject_grade = sqlx::query_scalar::<_, String>(
            "SELECT grade_level FROM subjects WHERE id = $1",
        )
        .bind(lesson.subject_id)
        .fetch_one(&mut *tx)
        .await?;

        // Students without a registered grade level may enroll in anything.
        if let Some(grade) = &student.grade_level {
            if *grade != subject_grade {
                return Ok(EnrollmentOutcome::Rejected(EnrollmentRejection::GradeMismatch));
            }
        }

        let enrollment = sqlx::query_as::<_, EnrollmentDBResponse>(
            r#"
            INSERT INTO student_lessons (student_id, lesson_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(student_id)
        .bind(lesson_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE lessons SET current_cap = $2, updated_at = NOW() WHERE id = $1")
            .bind(lesson_id)
            .bind(i32::try_from(enrolled_count + 1).map_err(|e| DbError::Other(e.into()))?)
            .execute(&mut *tx)
            .await?;

        if enrolled_count == 0 {
            let first = next_occurrence(today, lesson.day_of_week.to_weekday());
            for week in 0..weeks_ahead {
                sqlx::query(
                    r#"
                    INSERT INTO lesson_instances (lesson_id, tutor_id, date)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (lesson_id, date) DO NOTHING
                    "#,
                )
                .bind(lesson_id)
                .bind(lesson.tutor_id)
                .bind(first + Days::new(u64::from(week) * 7))
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        Ok(EnrollmentOutcome::Enrolled(enrollment))
    }

    /// Remove a student's enrollment. Returns false if the student was not
    /// enrolled.
    #[instrument(
        skip(self),
        fields(student_id = %abbrev_uuid(&student_id), lesson_id = %abbrev_uuid(&lesson_id)),
        err
    )]
    pub async fn unenroll_student(&mut self, student_id: UserId, lesson_id: LessonId) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        sqlx::query("SELECT 1 FROM lessons WHERE id = $1 FOR UPDATE")
            .bind(lesson_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query(
            "DELETE FROM student_lessons WHERE student_id = $1 AND lesson_id = $2",
        )
        .bind(student_id)
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deleted == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE lessons
            SET current_cap = (SELECT COUNT(*) FROM student_lessons WHERE lesson_id = $1),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    /// Current number of students enrolled, counted from the join table.
    pub async fn enrolled_count(&mut self, lesson_id: LessonId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM student_lessons WHERE lesson_id = $1",
        )
        .bind(lesson_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    pub async fn enrollment_status(
        &mut self,
        student_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<EnrollmentDBResponse>> {
        let enrollment = sqlx::query_as::<_, EnrollmentDBResponse>(
            "SELECT * FROM student_lessons WHERE student_id = $1 AND lesson_id = $2",
        )
        .bind(student_id)
        .bind(lesson_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(enrollment)
    }

    /// Lessons a student is currently enrolled in.
    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&student_id)), err)]
    pub async fn lessons_for_student(&mut self, student_id: UserId) -> Result<Vec<LessonDBResponse>> {
        let lessons = sqlx::query_as::<_, LessonDBResponse>(
            r#"
            SELECT l.*
            FROM student_lessons sl
            JOIN lessons l ON l.id = sl.lesson_id
            WHERE sl.student_id = $1
            ORDER BY l.day_of_week, l.start_time
            "#,
        )
        .bind(student_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(lessons)
    }
}
