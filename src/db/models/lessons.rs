//! Database models for lessons, subjects and enrollments.

use crate::types::{AgencyId, LessonId, LocationId, SubjectId, UserId};
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Weekly slot day, stored as a Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "day_of_week", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// chrono::Weekday equivalent, used when generating dated instances.
    pub fn to_weekday(self) -> chrono::Weekday {
        match self {
            DayOfWeek::Monday => chrono::Weekday::Mon,
            DayOfWeek::Tuesday => chrono::Weekday::Tue,
            DayOfWeek::Wednesday => chrono::Weekday::Wed,
            DayOfWeek::Thursday => chrono::Weekday::Thu,
            DayOfWeek::Friday => chrono::Weekday::Fri,
            DayOfWeek::Saturday => chrono::Weekday::Sat,
            DayOfWeek::Sunday => chrono::Weekday::Sun,
        }
    }
}

/// Database response for a lesson row
#[derive(Debug, Clone, FromRow)]
pub struct LessonDBResponse {
    pub id: LessonId,
    pub agency_id: AgencyId,
    pub location_id: LocationId,
    pub subject_id: SubjectId,
    pub tutor_id: Option<UserId>,
    pub title: String,
    pub description: Option<String>,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub student_rate: Decimal,
    pub tutor_rate: Decimal,
    pub total_cap: i32,
    pub current_cap: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database request for creating a lesson
#[derive(Debug, Clone)]
pub struct LessonCreateDBRequest {
    pub agency_id: AgencyId,
    pub location_id: LocationId,
    pub subject_id: SubjectId,
    pub tutor_id: Option<UserId>,
    pub title: String,
    pub description: Option<String>,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub student_rate: Decimal,
    pub tutor_rate: Decimal,
    pub total_cap: i32,
    pub is_active: bool,
}

/// Database request for a partial lesson update
#[derive(Debug, Clone, Default)]
pub struct LessonUpdateDBRequest {
    pub tutor_id: Option<UserId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub student_rate: Option<Decimal>,
    pub tutor_rate: Option<Decimal>,
    pub total_cap: Option<i32>,
    pub is_active: Option<bool>,
}

/// Filter for listing lessons
#[derive(Debug, Clone, Default)]
pub struct LessonFilter {
    pub agency_id: Option<AgencyId>,
    pub tutor_id: Option<UserId>,
    pub active_only: bool,
}

/// Database response for a subject row
#[derive(Debug, Clone, FromRow)]
pub struct SubjectDBResponse {
    pub id: SubjectId,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub grade_level: String,
    pub is_active: bool,
}

/// One enrollment row from the student_lessons join table
#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentDBResponse {
    pub student_id: UserId,
    pub lesson_id: LessonId,
    pub enrolled_at: DateTime<Utc>,
}

/// A student's existing enrollment joined with the slot of its lesson,
/// the shape the time-clash check consumes.
#[derive(Debug, Clone, FromRow)]
pub struct EnrolledSlotDBResponse {
    pub lesson_id: LessonId,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}
