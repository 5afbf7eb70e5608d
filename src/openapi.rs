//! OpenAPI documentation for the management API at `/api/v1/*`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

/// Bearer JWT security scheme shared by all authenticated endpoints.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token from `POST /auth/login`. Include it in the \
                             `Authorization` header:\n\n```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api/v1", description = "Management API")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::health,
        api::handlers::auth::login,
        api::handlers::auth::request_password_reset,
        api::handlers::auth::confirm_password_reset,
        api::handlers::lessons::list_lessons,
        api::handlers::lessons::create_lesson,
        api::handlers::lessons::get_lesson,
        api::handlers::lessons::update_lesson,
        api::handlers::lessons::delete_lesson,
        api::handlers::lessons::enroll_student,
        api::handlers::lessons::unenroll_student,
        api::handlers::lessons::enrollment_status,
        api::handlers::lessons::student_lessons,
        api::handlers::payments::calculate_fees,
        api::handlers::payments::create_intent,
        api::handlers::payments::confirm_payment,
        api::handlers::tutors::payments_summary,
        api::handlers::tutors::lesson_sessions,
        api::handlers::tutors::mark_attendance,
        api::handlers::agencies::get_agency,
        api::handlers::agencies::get_tenant_config,
        api::handlers::agencies::put_tenant_config,
        api::handlers::agencies::settle_tutor_payment,
    ),
    components(
        schemas(
            api::models::users::CurrentUser,
            api::models::users::LoginRequest,
            api::models::users::LoginResponse,
            api::models::users::PasswordResetRequest,
            api::models::users::PasswordResetConfirmRequest,
            api::models::users::UserResponse,
            api::models::lessons::LessonResponse,
            api::models::lessons::LessonCreate,
            api::models::lessons::LessonUpdate,
            api::models::lessons::EnrollRequest,
            api::models::lessons::EnrollmentResponse,
            api::models::lessons::EnrollmentStatusResponse,
            api::models::payments::FeeQuoteResponse,
            api::models::payments::CreateIntentRequest,
            api::models::payments::CreateIntentResponse,
            api::models::payments::ConfirmRequest,
            api::models::payments::ConfirmResponse,
            api::models::payments::TutorPaymentRowResponse,
            api::models::payments::TutorPaymentSummaryResponse,
            api::models::payments::TutorPaymentResponse,
            api::models::attendance::SessionResponse,
            api::models::agencies::AgencyResponse,
            api::models::agencies::TenantConfigResponse,
            api::models::agencies::TenantConfigUpdate,
        )
    ),
    tags(
        (name = "auth", description = "Authentication and password resets"),
        (name = "lessons", description = "Lesson catalog and enrollment"),
        (name = "payments", description = "Student payment flow"),
        (name = "tutors", description = "Sessions, attendance and earnings"),
        (name = "agencies", description = "Agency profile and settlement"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;
