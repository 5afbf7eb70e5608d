use crate::db::errors::DbError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

/// Business-rule rejections from the enrollment validator.
///
/// These are expected, recoverable outcomes and map to structured 4xx
/// responses with a machine-distinguishable reason code, never generic 500s.
/// The order of the variants mirrors the order the checks run in.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentRejection {
    #[error("Student is already enrolled in this lesson")]
    AlreadyEnrolled,

    #[error("Lesson is full")]
    LessonFull,

    #[error("Lesson time clashes with another lesson the student is enrolled in")]
    TimeClash,

    #[error("Student grade level does not match the lesson's grade level requirement")]
    GradeMismatch,
}

impl EnrollmentRejection {
    /// Stable reason code for API clients.
    pub fn reason_code(&self) -> &'static str {
        match self {
            EnrollmentRejection::AlreadyEnrolled => "already_enrolled",
            EnrollmentRejection::LessonFull => "lesson_full",
            EnrollmentRejection::TimeClash => "time_clash",
            EnrollmentRejection::GradeMismatch => "grade_level_mismatch",
        }
    }
}

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Authenticated principal is not allowed to perform the operation
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Request conflicts with current state (e.g. deleting a lesson that
    /// still has enrolled students)
    #[error("{message}")]
    Conflict { message: String },

    /// Enrollment validator rejected the candidate
    #[error(transparent)]
    Enrollment(#[from] EnrollmentRejection),

    /// The external payment provider declined or failed; the provider's
    /// message is surfaced verbatim to the caller.
    #[error("Payment provider error: {message}")]
    PaymentProvider { message: String },

    /// Payment succeeded but enrollment subsequently failed. Money has moved,
    /// so this is reported distinctly and the payment row is flagged for
    /// reconciliation rather than silently swallowed.
    #[error("Payment succeeded but enrollment failed: {rejection}")]
    PaymentUnreconciled {
        payment_id: uuid::Uuid,
        rejection: EnrollmentRejection,
    },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Enrollment(_) => StatusCode::CONFLICT,
            Error::PaymentProvider { .. } => StatusCode::PAYMENT_REQUIRED,
            Error::PaymentUnreconciled { .. } => StatusCode::CONFLICT,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message
                .clone()
                .unwrap_or_else(|| "Authentication required".to_string()),
            Error::Forbidden { message } => message.clone(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Conflict { message } => message.clone(),
            Error::Enrollment(rejection) => rejection.to_string(),
            Error::PaymentProvider { message } => message.clone(),
            Error::PaymentUnreconciled { rejection, .. } => format!(
                "Payment was captured but enrollment failed ({rejection}); the payment has been flagged for reconciliation"
            ),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => {
                    match (table.as_deref(), constraint.as_deref()) {
                        (Some("users"), Some(c)) if c.contains("email") => {
                            "An account with this email address already exists".to_string()
                        }
                        (Some("agencies"), Some(c)) if c.contains("email") => {
                            "An agency with this email address already exists".to_string()
                        }
                        (Some("tenant_configs"), _) => {
                            "This agency already has a tenant configuration".to_string()
                        }
                        _ => "Resource already exists".to_string(),
                    }
                }
                DbError::ForeignKeyViolation { .. } => {
                    "Invalid reference to related resource".to_string()
                }
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::PaymentUnreconciled { payment_id, .. } => {
                tracing::error!(%payment_id, "Payment captured without enrollment: {}", self);
            }
            Error::Unauthenticated { .. } | Error::Forbidden { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::Enrollment(_) | Error::PaymentProvider { .. } => {
                tracing::info!("Business-rule rejection: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::Conflict { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            Error::Enrollment(rejection) => {
                let body = json!({
                    "reason": rejection.reason_code(),
                    "message": rejection.to_string(),
                });
                (status, Json(body)).into_response()
            }
            Error::PaymentProvider { message } => {
                let body = json!({
                    "reason": "payment_declined",
                    "message": message,
                });
                (status, Json(body)).into_response()
            }
            Error::PaymentUnreconciled { payment_id, rejection } => {
                let body = json!({
                    "reason": "payment_succeeded_enrollment_failed",
                    "message": self.user_message(),
                    "payment_id": payment_id,
                    "enrollment_reason": rejection.reason_code(),
                });
                (status, Json(body)).into_response()
            }
            _ => {
                let user_message = self.user_message();
                (status, user_message).into_response()
            }
        }
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_reasons_are_distinct() {
        let reasons = [
            EnrollmentRejection::AlreadyEnrolled.reason_code(),
            EnrollmentRejection::LessonFull.reason_code(),
            EnrollmentRejection::TimeClash.reason_code(),
            EnrollmentRejection::GradeMismatch.reason_code(),
        ];
        let unique: std::collections::HashSet<_> = reasons.iter().collect();
        assert_eq!(unique.len(), reasons.len());
    }

    #[test]
    fn rejections_map_to_conflict_not_server_error() {
        for rejection in [
            EnrollmentRejection::AlreadyEnrolled,
            EnrollmentRejection::LessonFull,
            EnrollmentRejection::TimeClash,
            EnrollmentRejection::GradeMismatch,
        ] {
            assert_eq!(Error::from(rejection).status_code(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn provider_errors_surface_verbatim() {
        let err = Error::PaymentProvider {
            message: "Your card was declined.".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.user_message(), "Your card was declined.");
    }
}
