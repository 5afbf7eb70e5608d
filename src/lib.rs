//! # tutiful: Tutoring Marketplace Backend
//!
//! `tutiful` is the backend for a tutoring marketplace connecting agencies,
//! tutors and students. Agencies publish weekly lessons; students pay to
//! enroll; tutors mark attendance session by session and accrue earnings that
//! the agency settles.
//!
//! ## Overview
//!
//! The service exposes a RESTful management API under `/api/v1`. Its four
//! core flows are:
//!
//! - **Enrollment validation**: a student joining a lesson passes an ordered
//!   chain of checks (duplicate, capacity, schedule clash, grade level) run
//!   inside a single transaction with the lesson row locked, so two students
//!   racing for the last seat cannot both win. Rejections are structured 409
//!   responses with stable reason codes.
//! - **Attendance**: each lesson materializes into dated weekly sessions on
//!   first enrollment. A tutor may mark a session attended only inside its
//!   mark window (from session start until a configurable grace period after
//!   it ends). Marking creates the tutor's payment row atomically.
//! - **Tutor earnings**: attendance-driven payment rows aggregate into an
//!   earnings summary; agencies settle rows idempotently.
//! - **Student payments**: an intent-based provider flow (Stripe, or an
//!   in-memory dummy for development). Confirmation re-fetches the intent
//!   from the provider, records the charge idempotently, then enrolls; a
//!   charge that cannot be matched with an enrollment is flagged for
//!   reconciliation instead of being lost.
//!
//! ## Architecture
//!
//! Built on [Axum](https://github.com/tokio-rs/axum) with PostgreSQL for all
//! persistence. The database layer ([`db`]) uses the repository pattern; the
//! HTTP layer ([`api`]) keeps handlers thin over those repositories. JWT
//! bearer sessions ([`auth`]) authenticate users and agencies alike.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use tutiful::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = tutiful::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     tutiful::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! Migrations run automatically on startup; see [`migrator`].

pub mod api;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod payment_providers;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::openapi::ApiDoc;
use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, patch, post, put},
};
use bon::Builder;
pub use config::Config;
pub use db::migrator;
use payment_providers::PaymentProvider;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{AgencyId, LessonId, LessonInstanceId, LocationId, SubjectId, UserId};

/// Application state shared across all request handlers.
///
/// Cloned per request; everything inside is cheap to clone (pool handle,
/// config, provider behind an `Arc`).
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub payments: Arc<dyn PaymentProvider>,
}

/// Create CORS layer from configuration. An empty origin list allows any
/// origin, which suits local development.
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    if config.cors_allowed_origins.is_empty() {
        return Ok(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));
    }

    let mut origins = Vec::new();
    for origin in &config.cors_allowed_origins {
        origins.push(origin.parse::<HeaderValue>()?);
    }
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Build the application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route("/healthz", get(api::handlers::health))
        // Authentication
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/auth/password-resets", post(api::handlers::auth::request_password_reset))
        .route(
            "/auth/password-resets/confirm",
            post(api::handlers::auth::confirm_password_reset),
        )
        // Lesson catalog
        .route("/lessons", get(api::handlers::lessons::list_lessons))
        .route("/lessons", post(api::handlers::lessons::create_lesson))
        .route("/lessons/{lesson_id}", get(api::handlers::lessons::get_lesson))
        .route("/lessons/{lesson_id}", patch(api::handlers::lessons::update_lesson))
        .route("/lessons/{lesson_id}", delete(api::handlers::lessons::delete_lesson))
        // Enrollment
        .route("/lessons/students/{student_id}", post(api::handlers::lessons::enroll_student))
        .route(
            "/lessons/students/{student_id}",
            delete(api::handlers::lessons::unenroll_student),
        )
        .route(
            "/lessons/{lesson_id}/students/{student_id}/enrollment",
            get(api::handlers::lessons::enrollment_status),
        )
        .route("/students/{student_id}/lessons", get(api::handlers::lessons::student_lessons))
        // Student payments
        .route("/payments/calculate/{lesson_id}", get(api::handlers::payments::calculate_fees))
        .route("/payments/create-intent", post(api::handlers::payments::create_intent))
        .route("/payments/confirm", post(api::handlers::payments::confirm_payment))
        // Tutor sessions and earnings
        .route(
            "/tutors/{tutor_id}/payments/summary",
            get(api::handlers::tutors::payments_summary),
        )
        .route(
            "/tutors/lessons/{lesson_id}/sessions",
            get(api::handlers::tutors::lesson_sessions),
        )
        .route(
            "/tutors/lessons/{lesson_id}/attendance/{session_id}/mark",
            patch(api::handlers::tutors::mark_attendance),
        )
        // Agencies
        .route("/agencies/{agency_id}", get(api::handlers::agencies::get_agency))
        .route(
            "/agencies/{agency_id}/tenant-config",
            get(api::handlers::agencies::get_tenant_config),
        )
        .route(
            "/agencies/{agency_id}/tenant-config",
            put(api::handlers::agencies::put_tenant_config),
        )
        .route(
            "/agencies/tutor-payments/{payment_id}/settle",
            patch(api::handlers::agencies::settle_tutor_payment),
        );

    let router = Router::new()
        .route("/healthz", get(api::handlers::health))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .with_state(state.clone());

    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        config.validate().map_err(|e| anyhow::anyhow!(e))?;

        let pool = db::create_pool(&config.database).await?;
        migrator().run(&pool).await?;

        Self::new_with_pool(config, pool).await
    }

    /// Create an application on an existing pool. Migrations are assumed to
    /// have been applied already.
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let payments = payment_providers::create_provider(config.payment.clone());
        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .payments(payments)
            .build();

        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Listening on http://{bind_addr}");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
