//! API models for accounts and authentication.

use crate::db::models::users::{UserDBResponse, UserRole};
use crate::errors::{Error, Result};
use crate::types::{AccountKind, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The authenticated principal of a request, reconstructed from JWT claims.
/// Either a user (student or tutor) or an agency.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = Uuid)]
    pub id: UserId,
    pub kind: AccountKind,
    /// Set when `kind` is `user`
    pub role: Option<UserRole>,
    pub email: String,
    pub name: String,
}

impl CurrentUser {
    pub fn is_agency(&self) -> bool {
        self.kind == AccountKind::Agency
    }

    pub fn is_tutor(&self) -> bool {
        self.role == Some(UserRole::Tutor)
    }

    pub fn is_student(&self) -> bool {
        self.role == Some(UserRole::Student)
    }

    /// Tutors may act on their own resources; agencies on anything.
    pub fn require_tutor_or_agency(&self) -> Result<()> {
        if self.is_tutor() || self.is_agency() {
            Ok(())
        } else {
            Err(Error::Forbidden {
                message: "This operation requires a tutor or agency account".to_string(),
            })
        }
    }

    pub fn require_agency(&self) -> Result<()> {
        if self.is_agency() {
            Ok(())
        } else {
            Err(Error::Forbidden {
                message: "This operation requires an agency account".to_string(),
            })
        }
    }
}

/// Login request for any account kind
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests
    pub token: String,
    pub account: CurrentUser,
}

/// Request a password reset code for the given email
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Redeem a password reset code
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PasswordResetConfirmRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// User details as returned by the API (never includes the password hash)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = Uuid)]
    pub id: UserId,
    pub role: UserRole,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub grade_level: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(user: UserDBResponse) -> Self {
        Self {
            id: user.id,
            role: user.role,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            grade_level: user.grade_level,
            created_at: user.created_at,
        }
    }
}
