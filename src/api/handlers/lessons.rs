//! HTTP handlers for lessons and enrollment.
//!
//! Lesson CRUD is agency-scoped. Enrollment runs the full validation chain
//! inside the database handler; a rejection comes back as a value and is
//! surfaced here as a 409 with a machine-readable reason code.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    api::models::{
        lessons::{
            EnrollRequest, EnrollmentResponse, EnrollmentStatusResponse, LessonCreate,
            LessonResponse, LessonUpdate, ListLessonsQuery,
        },
        users::CurrentUser,
    },
    db::handlers::{EnrollmentOutcome, Lessons, Repository},
    errors::{Error, Result},
    types::{LessonId, UserId, abbrev_uuid},
};

fn lesson_not_found(lesson_id: LessonId) -> Error {
    Error::NotFound {
        resource: "Lesson".to_string(),
        id: lesson_id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/lessons",
    tag = "lessons",
    summary = "List lessons",
    params(ListLessonsQuery),
    responses(
        (status = 200, description = "Lessons matching the filter", body = Vec<LessonResponse>)
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_lessons(
    State(state): State<AppState>,
    _current: CurrentUser,
    Query(query): Query<ListLessonsQuery>,
) -> Result<Json<Vec<LessonResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lessons = Lessons::new(&mut conn);
    let found = lessons.list(&query.into()).await?;
    Ok(Json(found.into_iter().map(LessonResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/lessons",
    tag = "lessons",
    summary = "Create a lesson",
    request_body = LessonCreate,
    responses(
        (status = 201, description = "Lesson created", body = LessonResponse),
        (status = 403, description = "Only agencies can create lessons")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(agency_id = %abbrev_uuid(&current.id)))]
pub async fn create_lesson(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<LessonCreate>,
) -> Result<(StatusCode, Json<LessonResponse>)> {
    current.require_agency()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lessons = Lessons::new(&mut conn);
    let created = lessons.create(&request.into_db_request(current.id)).await?;

    tracing::info!(lesson_id = %abbrev_uuid(&created.id), "Created lesson");
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}",
    tag = "lessons",
    summary = "Fetch a lesson",
    params(("lesson_id" = Uuid, Path, description = "Lesson to fetch")),
    responses(
        (status = 200, description = "The lesson", body = LessonResponse),
        (status = 404, description = "Lesson not found")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(lesson_id = %abbrev_uuid(&lesson_id)))]
pub async fn get_lesson(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(lesson_id): Path<LessonId>,
) -> Result<Json<LessonResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lessons = Lessons::new(&mut conn);
    let lesson = lessons
        .get_by_id(lesson_id)
        .await?
        .ok_or_else(|| lesson_not_found(lesson_id))?;
    Ok(Json(lesson.into()))
}

#[utoipa::path(
    patch,
    path = "/lessons/{lesson_id}",
    tag = "lessons",
    summary = "Update a lesson",
    params(("lesson_id" = Uuid, Path, description = "Lesson to update")),
    request_body = LessonUpdate,
    responses(
        (status = 200, description = "Updated lesson", body = LessonResponse),
        (status = 403, description = "Not the owning agency"),
        (status = 404, description = "Lesson not found")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(lesson_id = %abbrev_uuid(&lesson_id)))]
pub async fn update_lesson(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(lesson_id): Path<LessonId>,
    Json(request): Json<LessonUpdate>,
) -> Result<Json<LessonResponse>> {
    current.require_agency()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lessons = Lessons::new(&mut conn);

    let lesson = lessons
        .get_by_id(lesson_id)
        .await?
        .ok_or_else(|| lesson_not_found(lesson_id))?;
    if lesson.agency_id != current.id {
        return Err(Error::Forbidden {
            message: "Lessons can only be modified by their agency".to_string(),
        });
    }

    let updated = lessons.update(lesson_id, &request.into()).await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/lessons/{lesson_id}",
    tag = "lessons",
    summary = "Delete a lesson",
    params(("lesson_id" = Uuid, Path, description = "Lesson to delete")),
    responses(
        (status = 204, description = "Lesson deleted"),
        (status = 403, description = "Not the owning agency"),
        (status = 404, description = "Lesson not found"),
        (status = 409, description = "Students are still enrolled")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(lesson_id = %abbrev_uuid(&lesson_id)))]
pub async fn delete_lesson(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(lesson_id): Path<LessonId>,
) -> Result<StatusCode> {
    current.require_agency()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lessons = Lessons::new(&mut conn);

    let lesson = lessons
        .get_by_id(lesson_id)
        .await?
        .ok_or_else(|| lesson_not_found(lesson_id))?;
    if lesson.agency_id != current.id {
        return Err(Error::Forbidden {
            message: "Lessons can only be deleted by their agency".to_string(),
        });
    }

    let enrolled = lessons.enrolled_count(lesson_id).await?;
    if enrolled > 0 {
        return Err(Error::Conflict {
            message: format!("Cannot delete a lesson with {enrolled} enrolled students"),
        });
    }

    lessons.delete(lesson_id).await?;
    tracing::info!(lesson_id = %abbrev_uuid(&lesson_id), "Deleted lesson");
    Ok(StatusCode::NO_CONTENT)
}

fn require_self_or_agency(current: &CurrentUser, student_id: UserId) -> Result<()> {
    if current.is_agency() || current.id == student_id {
        return Ok(());
    }
    Err(Error::Forbidden {
        message: "Students can only manage their own enrollments".to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/lessons/students/{student_id}",
    tag = "lessons",
    summary = "Enroll a student in a lesson",
    params(("student_id" = Uuid, Path, description = "Student to enroll")),
    request_body = EnrollRequest,
    responses(
        (status = 201, description = "Enrolled", body = EnrollmentResponse),
        (status = 404, description = "Lesson or student not found"),
        (status = 409, description = "Enrollment rejected, see reason code")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id), lesson_id = %abbrev_uuid(&request.lesson_id)))]
pub async fn enroll_student(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(student_id): Path<UserId>,
    Json(request): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<EnrollmentResponse>)> {
    require_self_or_agency(&current, student_id)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lessons = Lessons::new(&mut conn);

    let outcome = lessons
        .enroll_student(
            student_id,
            request.lesson_id,
            Utc::now().date_naive(),
            state.config.attendance.schedule_weeks_ahead,
        )
        .await?;

    match outcome {
        EnrollmentOutcome::Enrolled(enrollment) => {
            tracing::info!("Enrolled student");
            Ok((StatusCode::CREATED, Json(enrollment.into())))
        }
        EnrollmentOutcome::Rejected(rejection) => {
            tracing::info!(reason = rejection.reason_code(), "Enrollment rejected");
            Err(Error::Enrollment(rejection))
        }
    }
}

#[utoipa::path(
    delete,
    path = "/lessons/students/{student_id}",
    tag = "lessons",
    summary = "Withdraw a student from a lesson",
    params(("student_id" = Uuid, Path, description = "Student to withdraw")),
    request_body = EnrollRequest,
    responses(
        (status = 204, description = "Withdrawn"),
        (status = 404, description = "No such enrollment")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id), lesson_id = %abbrev_uuid(&request.lesson_id)))]
pub async fn unenroll_student(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(student_id): Path<UserId>,
    Json(request): Json<EnrollRequest>,
) -> Result<StatusCode> {
    require_self_or_agency(&current, student_id)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lessons = Lessons::new(&mut conn);

    if !lessons.unenroll_student(student_id, request.lesson_id).await? {
        return Err(Error::NotFound {
            resource: "Enrollment".to_string(),
            id: format!("{student_id}/{}", request.lesson_id),
        });
    }

    tracing::info!("Withdrew student");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}/students/{student_id}/enrollment",
    tag = "lessons",
    summary = "Check whether a student is enrolled in a lesson",
    params(
        ("lesson_id" = Uuid, Path, description = "Lesson"),
        ("student_id" = Uuid, Path, description = "Student")
    ),
    responses(
        (status = 200, description = "Enrollment status", body = EnrollmentStatusResponse)
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id), lesson_id = %abbrev_uuid(&lesson_id)))]
pub async fn enrollment_status(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path((lesson_id, student_id)): Path<(LessonId, UserId)>,
) -> Result<Json<EnrollmentStatusResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lessons = Lessons::new(&mut conn);

    let enrollment = lessons.enrollment_status(student_id, lesson_id).await?;
    Ok(Json(EnrollmentStatusResponse {
        enrolled: enrollment.is_some(),
        enrolled_at: enrollment.map(|e| e.enrolled_at),
    }))
}

#[utoipa::path(
    get,
    path = "/students/{student_id}/lessons",
    tag = "lessons",
    summary = "List a student's lessons",
    params(("student_id" = Uuid, Path, description = "Student")),
    responses(
        (status = 200, description = "Lessons the student is enrolled in", body = Vec<LessonResponse>)
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id)))]
pub async fn student_lessons(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(student_id): Path<UserId>,
) -> Result<Json<Vec<LessonResponse>>> {
    require_self_or_agency(&current, student_id)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lessons = Lessons::new(&mut conn);
    let found = lessons.lessons_for_student(student_id).await?;
    Ok(Json(found.into_iter().map(LessonResponse::from).collect()))
}
