//! Database repository for agencies and their tenant configuration.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::agencies::{
        AgencyCreateDBRequest, AgencyDBResponse, AgencyUpdateDBRequest, TenantConfigDBResponse,
        TenantConfigUpsertDBRequest,
    },
};
use crate::types::{AgencyId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

/// Filter for listing agencies
#[derive(Debug, Clone)]
pub struct AgencyFilter {
    pub skip: i64,
    pub limit: i64,
}

impl Default for AgencyFilter {
    fn default() -> Self {
        Self { skip: 0, limit: 100 }
    }
}

pub struct Agencies<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Agencies<'c> {
    type CreateRequest = AgencyCreateDBRequest;
    type UpdateRequest = AgencyUpdateDBRequest;
    type Response = AgencyDBResponse;
    type Id = AgencyId;
    type Filter = AgencyFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let agency = sqlx::query_as::<_, AgencyDBResponse>(
            r#"
            INSERT INTO agencies (name, email, password_hash, about_us)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(&request.about_us)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(agency)
    }

    #[instrument(skip(self), fields(agency_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let agency = sqlx::query_as::<_, AgencyDBResponse>("SELECT * FROM agencies WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(agency)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let agencies = sqlx::query_as::<_, AgencyDBResponse>(
            "SELECT * FROM agencies ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(agencies)
    }

    #[instrument(skip(self), fields(agency_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM agencies WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(agency_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let agency = sqlx::query_as::<_, AgencyDBResponse>(
            r#"
            UPDATE agencies SET
                name = COALESCE($2, name),
                about_us = COALESCE($3, about_us),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.about_us)
        .bind(&request.password_hash)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(agency)
    }
}

impl<'c> Agencies<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<AgencyDBResponse>> {
        let agency = sqlx::query_as::<_, AgencyDBResponse>("SELECT * FROM agencies WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(agency)
    }

    pub async fn tenant_config(&mut self, agency_id: AgencyId) -> Result<Option<TenantConfigDBResponse>> {
        let config = sqlx::query_as::<_, TenantConfigDBResponse>(
            "SELECT * FROM tenant_configs WHERE agency_id = $1",
        )
        .bind(agency_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(config)
    }

    /// Create or replace the agency's single tenant config. The unique
    /// constraint on `agency_id` makes repeated writes converge on one row.
    #[instrument(skip(self, request), fields(agency_id = %abbrev_uuid(&request.agency_id)), err)]
    pub async fn upsert_tenant_config(
        &mut self,
        request: &TenantConfigUpsertDBRequest,
    ) -> Result<TenantConfigDBResponse> {
        let config = sqlx::query_as::<_, TenantConfigDBResponse>(
            r#"
            INSERT INTO tenant_configs (agency_id, website_url, use_custom_theme, metadata, custom_theme, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (agency_id) DO UPDATE SET
                website_url = EXCLUDED.website_url,
                use_custom_theme = EXCLUDED.use_custom_theme,
                metadata = EXCLUDED.metadata,
                custom_theme = EXCLUDED.custom_theme,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(request.agency_id)
        .bind(&request.website_url)
        .bind(request.use_custom_theme)
        .bind(&request.metadata)
        .bind(&request.custom_theme)
        .bind(request.is_active)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::seed_agency;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn tenant_config_upserts_to_a_single_row(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let agency_id = seed_agency(&mut conn).await;

        let mut repo = Agencies::new(&mut conn);
        assert!(repo.tenant_config(agency_id).await.unwrap().is_none());

        let first = repo
            .upsert_tenant_config(&TenantConfigUpsertDBRequest {
                agency_id,
                website_url: Some("https://one.example.com".to_string()),
                use_custom_theme: false,
                metadata: json!({}),
                custom_theme: json!({}),
                is_active: true,
            })
            .await
            .unwrap();

        let second = repo
            .upsert_tenant_config(&TenantConfigUpsertDBRequest {
                agency_id,
                website_url: Some("https://two.example.com".to_string()),
                use_custom_theme: true,
                metadata: json!({"plan": "pro"}),
                custom_theme: json!({"accent": "#ff0000"}),
                is_active: true,
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.website_url.as_deref(), Some("https://two.example.com"));
        assert!(second.use_custom_theme);

        let fetched = repo.tenant_config(agency_id).await.unwrap().unwrap();
        assert_eq!(fetched.id, first.id);
        assert_eq!(fetched.metadata, json!({"plan": "pro"}));
    }

    #[sqlx::test]
    async fn duplicate_agency_email_is_a_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Agencies::new(&mut conn);

        let request = AgencyCreateDBRequest {
            name: "First".to_string(),
            email: "same@example.com".to_string(),
            password_hash: None,
            about_us: None,
        };
        repo.create(&request).await.unwrap();
        let err = repo.create(&request).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
