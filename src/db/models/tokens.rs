//! Database models for one-time codes (password reset, email verification).
//!
//! Both token tables share a shape: a hashed code tied to either a user or an
//! agency account, with an expiry and a single-use marker.

use crate::types::AccountKind;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Row identifier for token tables.
pub type TokenId = i64;

/// Which token table a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    PasswordReset,
    EmailVerification,
}

impl TokenKind {
    /// Table backing this token kind. Both tables have identical columns.
    pub fn table(self) -> &'static str {
        match self {
            TokenKind::PasswordReset => "password_reset_tokens",
            TokenKind::EmailVerification => "email_verification_tokens",
        }
    }
}

/// Database response for a one-time code row
#[derive(Debug, Clone, FromRow)]
pub struct TokenDBResponse {
    pub id: TokenId,
    pub account_kind: AccountKind,
    pub account_id: Uuid,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

impl TokenDBResponse {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// Database request for issuing a one-time code
#[derive(Debug, Clone)]
pub struct TokenCreateDBRequest {
    pub account_kind: AccountKind,
    pub account_id: Uuid,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
}
