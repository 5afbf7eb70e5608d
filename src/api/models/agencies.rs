//! API models for agencies and tenant configuration.

use crate::db::models::agencies::{AgencyDBResponse, TenantConfigDBResponse, TenantConfigUpsertDBRequest};
use crate::types::AgencyId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Agency details as returned by the API (never includes the password hash)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AgencyResponse {
    #[schema(value_type = Uuid)]
    pub id: AgencyId,
    pub name: String,
    pub email: String,
    pub about_us: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AgencyDBResponse> for AgencyResponse {
    fn from(agency: AgencyDBResponse) -> Self {
        Self {
            id: agency.id,
            name: agency.name,
            email: agency.email,
            about_us: agency.about_us,
            created_at: agency.created_at,
        }
    }
}

/// Tenant configuration as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TenantConfigResponse {
    pub id: Uuid,
    #[schema(value_type = Uuid)]
    pub agency_id: AgencyId,
    pub website_url: Option<String>,
    pub use_custom_theme: bool,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    #[schema(value_type = Object)]
    pub custom_theme: serde_json::Value,
    pub is_active: bool,
}

impl From<TenantConfigDBResponse> for TenantConfigResponse {
    fn from(config: TenantConfigDBResponse) -> Self {
        Self {
            id: config.id,
            agency_id: config.agency_id,
            website_url: config.website_url,
            use_custom_theme: config.use_custom_theme,
            metadata: config.metadata,
            custom_theme: config.custom_theme,
            is_active: config.is_active,
        }
    }
}

/// Request body for replacing an agency's tenant configuration
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TenantConfigUpdate {
    pub website_url: Option<String>,
    #[serde(default)]
    pub use_custom_theme: bool,
    #[serde(default = "default_json_object")]
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    #[serde(default = "default_json_object")]
    #[schema(value_type = Object)]
    pub custom_theme: serde_json::Value,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_json_object() -> serde_json::Value {
    serde_json::json!({})
}

fn default_true() -> bool {
    true
}

impl TenantConfigUpdate {
    pub fn into_db_request(self, agency_id: AgencyId) -> TenantConfigUpsertDBRequest {
        TenantConfigUpsertDBRequest {
            agency_id,
            website_url: self.website_url,
            use_custom_theme: self.use_custom_theme,
            metadata: self.metadata,
            custom_theme: self.custom_theme,
            is_active: self.is_active,
        }
    }
}
