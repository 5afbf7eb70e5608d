//! HTTP handlers for the tutor-facing surface: session lists, attendance
//! marking, and the earnings summary.
//!
//! Marking is where tutor money is created, so the mark window is enforced
//! here against the server clock before the database flips any state.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;

use crate::{
    AppState,
    api::models::{
        attendance::SessionResponse,
        payments::{TutorPaymentRowResponse, TutorPaymentSummaryResponse},
        users::CurrentUser,
    },
    attendance::{MarkWindow, SessionStatus, session_status},
    db::{
        handlers::{LessonInstances, Lessons, Repository, TutorPayments, tutor_payments},
        models::{lessons::LessonDBResponse, payments::TutorPaymentStatus},
    },
    errors::{Error, Result},
    types::{LessonId, LessonInstanceId, UserId, abbrev_uuid},
};

#[utoipa::path(
    get,
    path = "/tutors/{tutor_id}/payments/summary",
    tag = "tutors",
    summary = "A tutor's earnings summary",
    params(("tutor_id" = Uuid, Path, description = "Tutor")),
    responses(
        (status = 200, description = "Earnings totals and per-session breakdown", body = TutorPaymentSummaryResponse),
        (status = 403, description = "Not this tutor or an agency")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(tutor_id = %abbrev_uuid(&tutor_id)))]
pub async fn payments_summary(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(tutor_id): Path<UserId>,
) -> Result<Json<TutorPaymentSummaryResponse>> {
    current.require_tutor_or_agency()?;
    if !current.is_agency() && current.id != tutor_id {
        return Err(Error::Forbidden {
            message: "Tutors can only view their own earnings".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut payments = TutorPayments::new(&mut conn);
    let rows = payments.rows_for_tutor(tutor_id).await?;

    let totals = tutor_payments::totals(&rows);
    let paid_count = rows
        .iter()
        .filter(|r| r.payment_status == TutorPaymentStatus::Paid)
        .count();

    Ok(Json(TutorPaymentSummaryResponse {
        tutor_id,
        total_earned: totals.total_earned,
        total_unpaid: totals.total_unpaid,
        paid_count,
        unpaid_count: rows.len() - paid_count,
        payments: rows.into_iter().map(TutorPaymentRowResponse::from).collect(),
    }))
}

fn require_lesson_tutor(current: &CurrentUser, lesson: &LessonDBResponse) -> Result<()> {
    current.require_tutor_or_agency()?;
    if current.is_agency() || lesson.tutor_id == Some(current.id) {
        return Ok(());
    }
    Err(Error::Forbidden {
        message: "Only the lesson's tutor or an agency can manage its sessions".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/tutors/lessons/{lesson_id}/sessions",
    tag = "tutors",
    summary = "List a lesson's sessions with attendance state",
    params(("lesson_id" = Uuid, Path, description = "Lesson")),
    responses(
        (status = 200, description = "Sessions oldest first", body = Vec<SessionResponse>),
        (status = 404, description = "Lesson not found")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(lesson_id = %abbrev_uuid(&lesson_id)))]
pub async fn lesson_sessions(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(lesson_id): Path<LessonId>,
) -> Result<Json<Vec<SessionResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let lesson = {
        let mut lessons = Lessons::new(&mut conn);
        lessons.get_by_id(lesson_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Lesson".to_string(),
            id: lesson_id.to_string(),
        })?
    };
    require_lesson_tutor(&current, &lesson)?;

    let mut instances = LessonInstances::new(&mut conn);
    let found = instances.list_for_lesson(lesson_id).await?;

    let now = Utc::now();
    let grace = state.config.attendance.mark_grace;
    let sessions = found
        .into_iter()
        .map(|instance| SessionResponse::build(instance, &lesson, grace, now))
        .collect();

    Ok(Json(sessions))
}

#[utoipa::path(
    patch,
    path = "/tutors/lessons/{lesson_id}/attendance/{session_id}/mark",
    tag = "tutors",
    summary = "Mark a session attended",
    params(
        ("lesson_id" = Uuid, Path, description = "Lesson"),
        ("session_id" = Uuid, Path, description = "Session to mark")
    ),
    responses(
        (status = 200, description = "The session after marking", body = SessionResponse),
        (status = 400, description = "Session is outside its mark window"),
        (status = 404, description = "Lesson or session not found")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(lesson_id = %abbrev_uuid(&lesson_id), session_id = %abbrev_uuid(&session_id)))]
pub async fn mark_attendance(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((lesson_id, session_id)): Path<(LessonId, LessonInstanceId)>,
) -> Result<Json<SessionResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let lesson = {
        let mut lessons = Lessons::new(&mut conn);
        lessons.get_by_id(lesson_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Lesson".to_string(),
            id: lesson_id.to_string(),
        })?
    };
    require_lesson_tutor(&current, &lesson)?;

    let mut instances = LessonInstances::new(&mut conn);
    let instance = instances
        .get_by_id(session_id)
        .await?
        .filter(|i| i.lesson_id == lesson_id)
        .ok_or_else(|| Error::NotFound {
            resource: "Session".to_string(),
            id: session_id.to_string(),
        })?;

    let now = Utc::now();
    let grace = state.config.attendance.mark_grace;
    let window = MarkWindow::for_session(instance.date, lesson.start_time, lesson.end_time, grace);

    // Re-marking an attended session is a harmless no-op, even late.
    if !instance.is_attended && !window.is_open(now) {
        let status = session_status(instance.is_attended, window, now);
        let message = match status {
            SessionStatus::Upcoming => "The session has not started yet".to_string(),
            _ => "The mark window for this session has closed".to_string(),
        };
        return Err(Error::BadRequest { message });
    }

    // Whoever is assigned to the lesson gets paid; an unassigned lesson can
    // only be marked by the tutor actually teaching it.
    let paid_tutor = match lesson.tutor_id {
        Some(tutor_id) => tutor_id,
        None if current.is_tutor() => current.id,
        None => {
            return Err(Error::BadRequest {
                message: "This lesson has no assigned tutor to pay".to_string(),
            });
        }
    };

    let marked = instances
        .mark_attended(instance.id, paid_tutor, lesson.tutor_rate, now)
        .await?;

    tracing::info!(tutor_id = %abbrev_uuid(&paid_tutor), "Marked session attended");
    Ok(Json(SessionResponse::build(marked, &lesson, grace, now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::attendance::LessonInstanceCreateDBRequest;
    use crate::test_utils::{
        LessonSeed, agency_token, create_test_app, seed_agency, seed_lesson, seed_location,
        seed_subject, seed_tutor, tutor_token,
    };
    use axum::http::StatusCode;
    use chrono::{Days, NaiveTime};
    use rust_decimal_macros::dec;
    use sqlx::{PgConnection, PgPool};

    /// A lesson spanning the whole day, so today's session is always inside
    /// its mark window.
    async fn seed_all_day_lesson(
        conn: &mut PgConnection,
        tutor_id: UserId,
    ) -> (crate::types::AgencyId, crate::db::models::lessons::LessonDBResponse) {
        let agency_id = seed_agency(conn).await;
        let location_id = seed_location(conn, agency_id).await;
        let subject_id = seed_subject(conn, "Grade 7").await;
        let mut seed = LessonSeed::new(agency_id, location_id, subject_id);
        seed.tutor_id = Some(tutor_id);
        seed.start_time = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        seed.end_time = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
        (agency_id, seed_lesson(conn, seed).await)
    }

    async fn seed_instance(
        conn: &mut PgConnection,
        lesson_id: LessonId,
        tutor_id: UserId,
        date: chrono::NaiveDate,
    ) -> LessonInstanceId {
        let mut instances = LessonInstances::new(conn);
        instances
            .create(&LessonInstanceCreateDBRequest {
                lesson_id,
                tutor_id: Some(tutor_id),
                date,
            })
            .await
            .unwrap()
            .id
    }

    #[sqlx::test]
    async fn mark_in_window_pays_the_tutor(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let tutor = seed_tutor(&mut conn, "marker@example.com").await;
        let (_, lesson) = seed_all_day_lesson(&mut conn, tutor.id).await;
        let today = Utc::now().date_naive();
        let session = seed_instance(&mut conn, lesson.id, tutor.id, today).await;
        drop(conn);

        let server = create_test_app(pool.clone()).await;
        let token = tutor_token(&tutor);

        let url = format!("/api/v1/tutors/lessons/{}/attendance/{}/mark", lesson.id, session);
        let response = server.patch(&url).authorization_bearer(&token).await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "attended");
        assert_eq!(body["is_attended"], true);

        // Idempotent re-mark.
        server.patch(&url).authorization_bearer(&token).await.assert_status_ok();

        let summary = server
            .get(&format!("/api/v1/tutors/{}/payments/summary", tutor.id))
            .authorization_bearer(&token)
            .await;
        summary.assert_status_ok();
        let body: serde_json::Value = summary.json();
        assert_eq!(body["unpaid_count"], 1);
        assert_eq!(body["total_earned"], serde_json::json!(dec!(25.00)));
        assert_eq!(body["total_unpaid"], serde_json::json!(dec!(25.00)));
        assert_eq!(body["payments"][0]["is_attended"], true);
        assert_eq!(body["payments"][0]["payment_status"], "not_paid");
    }

    #[sqlx::test]
    async fn marking_outside_the_window_is_rejected(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let tutor = seed_tutor(&mut conn, "late@example.com").await;
        let (_, lesson) = seed_all_day_lesson(&mut conn, tutor.id).await;
        let today = Utc::now().date_naive();
        let past = seed_instance(&mut conn, lesson.id, tutor.id, today - Days::new(7)).await;
        let future = seed_instance(&mut conn, lesson.id, tutor.id, today + Days::new(7)).await;
        drop(conn);

        let server = create_test_app(pool).await;
        let token = tutor_token(&tutor);

        for session in [past, future] {
            let response = server
                .patch(&format!(
                    "/api/v1/tutors/lessons/{}/attendance/{}/mark",
                    lesson.id, session
                ))
                .authorization_bearer(&token)
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
        }
    }

    #[sqlx::test]
    async fn only_the_assigned_tutor_or_agency_can_mark(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let tutor = seed_tutor(&mut conn, "assigned@example.com").await;
        let other = seed_tutor(&mut conn, "other@example.com").await;
        let (agency_id, lesson) = seed_all_day_lesson(&mut conn, tutor.id).await;
        let today = Utc::now().date_naive();
        let session = seed_instance(&mut conn, lesson.id, tutor.id, today).await;
        drop(conn);

        let server = create_test_app(pool).await;
        let url = format!("/api/v1/tutors/lessons/{}/attendance/{}/mark", lesson.id, session);

        let response = server.patch(&url).authorization_bearer(&tutor_token(&other)).await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = server.patch(&url).authorization_bearer(&agency_token(agency_id)).await;
        response.assert_status_ok();
    }

    #[sqlx::test]
    async fn session_list_reports_computed_statuses(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let tutor = seed_tutor(&mut conn, "lister@example.com").await;
        let (_, lesson) = seed_all_day_lesson(&mut conn, tutor.id).await;
        let today = Utc::now().date_naive();
        seed_instance(&mut conn, lesson.id, tutor.id, today - Days::new(7)).await;
        seed_instance(&mut conn, lesson.id, tutor.id, today + Days::new(7)).await;
        drop(conn);

        let server = create_test_app(pool).await;
        let response = server
            .get(&format!("/api/v1/tutors/lessons/{}/sessions", lesson.id))
            .authorization_bearer(&tutor_token(&tutor))
            .await;
        response.assert_status_ok();
        let sessions: serde_json::Value = response.json();
        let sessions = sessions.as_array().unwrap();
        assert_eq!(sessions.len(), 2);
        // Oldest first: a week-old session is missed, next week's upcoming.
        assert_eq!(sessions[0]["status"], "missed");
        assert_eq!(sessions[0]["can_mark_now"], false);
        assert_eq!(sessions[1]["status"], "upcoming");
    }
}
