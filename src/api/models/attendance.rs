//! API models for lesson sessions and attendance marking.

use crate::attendance::{MarkWindow, SessionStatus, session_status};
use crate::db::models::{attendance::LessonInstanceDBResponse, lessons::LessonDBResponse};
use crate::types::{LessonId, LessonInstanceId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::time::Duration;
use utoipa::ToSchema;

/// A dated session of a lesson with its computed attendance state.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    #[schema(value_type = Uuid)]
    pub id: LessonInstanceId,
    #[schema(value_type = Uuid)]
    pub lesson_id: LessonId,
    pub date: NaiveDate,
    pub status: SessionStatus,
    pub is_attended: bool,
    pub marked_at: Option<DateTime<Utc>>,
    pub window: MarkWindow,
    /// True while an unmarked session can still be marked attended
    pub can_mark_now: bool,
}

impl SessionResponse {
    pub fn build(
        instance: LessonInstanceDBResponse,
        lesson: &LessonDBResponse,
        grace: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let window = MarkWindow::for_session(instance.date, lesson.start_time, lesson.end_time, grace);
        let status = session_status(instance.is_attended, window, now);
        Self {
            id: instance.id,
            lesson_id: instance.lesson_id,
            date: instance.date,
            status,
            is_attended: instance.is_attended,
            marked_at: instance.marked_at,
            window,
            can_mark_now: !instance.is_attended && window.is_open(now),
        }
    }
}
