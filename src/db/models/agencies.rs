//! Database models for agencies and their tenant configuration.

use crate::types::AgencyId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database response for an agency
#[derive(Debug, Clone, FromRow)]
pub struct AgencyDBResponse {
    pub id: AgencyId,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub about_us: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database request for creating an agency
#[derive(Debug, Clone)]
pub struct AgencyCreateDBRequest {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub about_us: Option<String>,
}

/// Database request for a partial agency update
#[derive(Debug, Clone, Default)]
pub struct AgencyUpdateDBRequest {
    pub name: Option<String>,
    pub about_us: Option<String>,
    pub password_hash: Option<String>,
}

/// One-to-one theming configuration for an agency.
#[derive(Debug, Clone, FromRow)]
pub struct TenantConfigDBResponse {
    pub id: Uuid,
    pub agency_id: AgencyId,
    pub website_url: Option<String>,
    pub use_custom_theme: bool,
    pub metadata: serde_json::Value,
    pub custom_theme: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert request for a tenant config; the unique constraint on `agency_id`
/// makes repeated writes converge on the single row.
#[derive(Debug, Clone)]
pub struct TenantConfigUpsertDBRequest {
    pub agency_id: AgencyId,
    pub website_url: Option<String>,
    pub use_custom_theme: bool,
    pub metadata: serde_json::Value,
    pub custom_theme: serde_json::Value,
    pub is_active: bool,
}
