//! Common type definitions shared across the service.
//!
//! All entity IDs are UUIDs wrapped in type aliases for readability at call
//! sites: [`UserId`], [`AgencyId`], [`LessonId`], [`LessonInstanceId`],
//! [`SubjectId`], [`LocationId`].

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type AgencyId = Uuid;
pub type LessonId = Uuid;
pub type LessonInstanceId = Uuid;
pub type SubjectId = Uuid;
pub type LocationId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Which principal table a polymorphic token row points at.
///
/// The token tables serve both `users` and `agencies`, so they carry a
/// (kind, id) pair instead of a foreign key; lookups go through
/// [`crate::db::handlers::Tokens`] which resolves the pair against the right
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "token_account_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    User,
    Agency,
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKind::User => write!(f, "user"),
            AccountKind::Agency => write!(f, "agency"),
        }
    }
}
