//! Database models for lesson instances (dated attendance occurrences).

use crate::types::{LessonId, LessonInstanceId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// Database response for a lesson instance row
#[derive(Debug, Clone, FromRow)]
pub struct LessonInstanceDBResponse {
    pub id: LessonInstanceId,
    pub lesson_id: LessonId,
    pub tutor_id: Option<UserId>,
    pub date: NaiveDate,
    pub is_attended: bool,
    pub marked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database request for creating a lesson instance
#[derive(Debug, Clone)]
pub struct LessonInstanceCreateDBRequest {
    pub lesson_id: LessonId,
    pub tutor_id: Option<UserId>,
    pub date: NaiveDate,
}
