//! Test utilities: seeded fixtures and an in-process test server.

use crate::config::{Config, PoolSettings};
use crate::db::models::{
    lessons::{DayOfWeek, LessonCreateDBRequest, LessonDBResponse},
    users::{UserCreateDBRequest, UserDBResponse, UserRole},
};
use crate::types::{AgencyId, LocationId, SubjectId, UserId};
use axum_test::TestServer;
use chrono::NaiveTime;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: Config) -> TestServer {
    let app = crate::Application::new_with_pool(config, pool)
        .await
        .expect("Failed to create application");
    app.into_test_server()
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        database: crate::config::DatabaseConfig {
            // Overridden by the pool handed to new_with_pool
            url: "postgresql://unused/test".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 1,
                ..Default::default()
            },
        },
        ..Default::default()
    }
}

pub async fn seed_agency(conn: &mut PgConnection) -> AgencyId {
    sqlx::query_scalar::<_, AgencyId>(
        "INSERT INTO agencies (name, email) VALUES ($1, $2) RETURNING id",
    )
    .bind("Test Agency")
    .bind(format!("agency-{}@example.com", Uuid::new_v4()))
    .fetch_one(conn)
    .await
    .expect("seed agency")
}

pub async fn seed_location(conn: &mut PgConnection, agency_id: AgencyId) -> LocationId {
    sqlx::query_scalar::<_, LocationId>(
        "INSERT INTO locations (agency_id, address) VALUES ($1, $2) RETURNING id",
    )
    .bind(agency_id)
    .bind("1 Test Street")
    .fetch_one(conn)
    .await
    .expect("seed location")
}

pub async fn seed_subject(conn: &mut PgConnection, grade_level: &str) -> SubjectId {
    sqlx::query_scalar::<_, SubjectId>(
        "INSERT INTO subjects (name, category, grade_level) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind("Mathematics")
    .bind("STEM")
    .bind(grade_level)
    .fetch_one(conn)
    .await
    .expect("seed subject")
}

pub async fn seed_student(
    conn: &mut PgConnection,
    email: &str,
    grade_level: Option<&str>,
) -> UserDBResponse {
    seed_user(conn, UserRole::Student, email, grade_level).await
}

pub async fn seed_tutor(conn: &mut PgConnection, email: &str) -> UserDBResponse {
    seed_user(conn, UserRole::Tutor, email, None).await
}

async fn seed_user(
    conn: &mut PgConnection,
    role: UserRole,
    email: &str,
    grade_level: Option<&str>,
) -> UserDBResponse {
    use crate::db::handlers::{Repository, users::Users};

    let mut repo = Users::new(conn);
    repo.create(&UserCreateDBRequest {
        role,
        email: email.to_string(),
        password_hash: Some(crate::auth::password::hash_password("password123").unwrap()),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        grade_level: grade_level.map(str::to_string),
    })
    .await
    .expect("seed user")
}

/// Everything a lesson row needs, with defaults suitable for most tests.
pub struct LessonSeed {
    pub agency_id: AgencyId,
    pub location_id: LocationId,
    pub subject_id: SubjectId,
    pub tutor_id: Option<UserId>,
    pub title: String,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub student_rate: Decimal,
    pub tutor_rate: Decimal,
    pub total_cap: i32,
}

impl LessonSeed {
    pub fn new(agency_id: AgencyId, location_id: LocationId, subject_id: SubjectId) -> Self {
        Self {
            agency_id,
            location_id,
            subject_id,
            tutor_id: None,
            title: "Algebra".to_string(),
            day_of_week: DayOfWeek::Monday,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            student_rate: Decimal::new(4000, 2),
            tutor_rate: Decimal::new(2500, 2),
            total_cap: 8,
        }
    }
}

pub async fn seed_lesson(conn: &mut PgConnection, seed: LessonSeed) -> LessonDBResponse {
    use crate::db::handlers::{Repository, lessons::Lessons};

    let mut repo = Lessons::new(conn);
    repo.create(&LessonCreateDBRequest {
        agency_id: seed.agency_id,
        location_id: seed.location_id,
        subject_id: seed.subject_id,
        tutor_id: seed.tutor_id,
        title: seed.title,
        description: None,
        day_of_week: seed.day_of_week,
        start_time: seed.start_time,
        end_time: seed.end_time,
        student_rate: seed.student_rate,
        tutor_rate: seed.tutor_rate,
        total_cap: seed.total_cap,
        is_active: true,
    })
    .await
    .expect("seed lesson")
}

/// Bearer token for a seeded user.
pub fn student_token(user: &UserDBResponse) -> String {
    user_token(user)
}

pub fn tutor_token(user: &UserDBResponse) -> String {
    user_token(user)
}

fn user_token(user: &UserDBResponse) -> String {
    let account = crate::api::models::users::CurrentUser {
        id: user.id,
        kind: crate::types::AccountKind::User,
        role: Some(user.role),
        email: user.email.clone(),
        name: user.full_name(),
    };
    crate::auth::session::create_session_token(&account, &create_test_config()).unwrap()
}

/// Bearer token for a seeded agency.
pub fn agency_token(agency_id: AgencyId) -> String {
    let account = crate::api::models::users::CurrentUser {
        id: agency_id,
        kind: crate::types::AccountKind::Agency,
        role: None,
        email: "agency@example.com".to_string(),
        name: "Test Agency".to_string(),
    };
    crate::auth::session::create_session_token(&account, &create_test_config()).unwrap()
}

/// Seeds an agency, location, subject and lesson in one call. Returns the
/// lesson along with its agency id.
pub async fn seed_default_lesson(conn: &mut PgConnection, grade_level: &str) -> (AgencyId, LessonDBResponse) {
    let agency_id = seed_agency(conn).await;
    let location_id = seed_location(conn, agency_id).await;
    let subject_id = seed_subject(conn, grade_level).await;
    let lesson = seed_lesson(conn, LessonSeed::new(agency_id, location_id, subject_id)).await;
    (agency_id, lesson)
}
