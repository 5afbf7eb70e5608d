//! API models for lessons and enrollment.

use crate::db::models::lessons::{
    DayOfWeek, EnrollmentDBResponse, LessonCreateDBRequest, LessonDBResponse, LessonFilter,
    LessonUpdateDBRequest,
};
use crate::types::{AgencyId, LessonId, LocationId, SubjectId, UserId};
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Lesson details as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonResponse {
    #[schema(value_type = Uuid)]
    pub id: LessonId,
    #[schema(value_type = Uuid)]
    pub agency_id: AgencyId,
    #[schema(value_type = Uuid)]
    pub location_id: LocationId,
    #[schema(value_type = Uuid)]
    pub subject_id: SubjectId,
    #[schema(value_type = Option<Uuid>)]
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
}

impl From<LessonDBResponse> for LessonResponse {
    fn from(lesson: LessonDBResponse) -> Self {
        Self {
            id: lesson.id,
            agency_id: lesson.agency_id,
            location_id: lesson.location_id,
            subject_id: lesson.subject_id,
            tutor_id: lesson.tutor_id,
            title: lesson.title,
            description: lesson.description,
            day_of_week: lesson.day_of_week,
            start_time: lesson.start_time,
            end_time: lesson.end_time,
            student_rate: lesson.student_rate,
            tutor_rate: lesson.tutor_rate,
            total_cap: lesson.total_cap,
            current_cap: lesson.current_cap,
            is_active: lesson.is_active,
            created_at: lesson.created_at,
        }
    }
}

/// Request body for creating a lesson
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LessonCreate {
    #[schema(value_type = Uuid)]
    pub location_id: LocationId,
    #[schema(value_type = Uuid)]
    pub subject_id: SubjectId,
    #[schema(value_type = Option<Uuid>)]
    pub tutor_id: Option<UserId>,
    pub title: String,
    pub description: Option<String>,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub student_rate: Decimal,
    pub tutor_rate: Decimal,
    pub total_cap: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl LessonCreate {
    /// Attach the owning agency (taken from the authenticated principal, not
    /// the body).
    pub fn into_db_request(self, agency_id: AgencyId) -> LessonCreateDBRequest {
        LessonCreateDBRequest {
            agency_id,
            location_id: self.location_id,
            subject_id: self.subject_id,
            tutor_id: self.tutor_id,
            title: self.title,
            description: self.description,
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            student_rate: self.student_rate,
            tutor_rate: self.tutor_rate,
            total_cap: self.total_cap,
            is_active: self.is_active,
        }
    }
}

/// Request body for a partial lesson update
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LessonUpdate {
    #[schema(value_type = Option<Uuid>)]
    pub tutor_id: Option<UserId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub student_rate: Option<Decimal>,
    pub tutor_rate: Option<Decimal>,
    pub total_cap: Option<i32>,
    pub is_active: Option<bool>,
}

impl From<LessonUpdate> for LessonUpdateDBRequest {
    fn from(update: LessonUpdate) -> Self {
        Self {
            tutor_id: update.tutor_id,
            title: update.title,
            description: update.description,
            student_rate: update.student_rate,
            tutor_rate: update.tutor_rate,
            total_cap: update.total_cap,
            is_active: update.is_active,
        }
    }
}

/// Query parameters for listing lessons
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListLessonsQuery {
    #[param(value_type = Option<Uuid>)]
    pub agency_id: Option<AgencyId>,
    #[param(value_type = Option<Uuid>)]
    pub tutor_id: Option<UserId>,
    /// When true, only active lessons are returned
    #[serde(default)]
    pub active_only: bool,
}

impl From<ListLessonsQuery> for LessonFilter {
    fn from(query: ListLessonsQuery) -> Self {
        Self {
            agency_id: query.agency_id,
            tutor_id: query.tutor_id,
            active_only: query.active_only,
        }
    }
}

/// Request body for enrolling or unenrolling a student
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EnrollRequest {
    #[schema(value_type = Uuid)]
    pub lesson_id: LessonId,
}

/// A confirmed enrollment
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentResponse {
    #[schema(value_type = Uuid)]
    pub student_id: UserId,
    #[schema(value_type = Uuid)]
    pub lesson_id: LessonId,
    pub enrolled_at: DateTime<Utc>,
}

impl From<EnrollmentDBResponse> for EnrollmentResponse {
    fn from(enrollment: EnrollmentDBResponse) -> Self {
        Self {
            student_id: enrollment.student_id,
            lesson_id: enrollment.lesson_id,
            enrolled_at: enrollment.enrolled_at,
        }
    }
}

/// Whether a student is enrolled in a lesson
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentStatusResponse {
    pub enrolled: bool,
    pub enrolled_at: Option<DateTime<Utc>>,
}
