//! HTTP handlers for agencies: profile, tenant configuration, and settling
//! tutor payments.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        agencies::{AgencyResponse, TenantConfigResponse, TenantConfigUpdate},
        payments::TutorPaymentResponse,
        users::CurrentUser,
    },
    db::handlers::{Agencies, Repository, TutorPayments},
    errors::{Error, Result},
    types::{AgencyId, abbrev_uuid},
};

#[utoipa::path(
    get,
    path = "/agencies/{agency_id}",
    tag = "agencies",
    summary = "Fetch an agency's public profile",
    params(("agency_id" = Uuid, Path, description = "Agency")),
    responses(
        (status = 200, description = "The agency", body = AgencyResponse),
        (status = 404, description = "Agency not found")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(agency_id = %abbrev_uuid(&agency_id)))]
pub async fn get_agency(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(agency_id): Path<AgencyId>,
) -> Result<Json<AgencyResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut agencies = Agencies::new(&mut conn);
    let agency = agencies.get_by_id(agency_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Agency".to_string(),
        id: agency_id.to_string(),
    })?;

    Ok(Json(agency.into()))
}

#[utoipa::path(
    get,
    path = "/agencies/{agency_id}/tenant-config",
    tag = "agencies",
    summary = "Fetch an agency's tenant configuration",
    params(("agency_id" = Uuid, Path, description = "Agency")),
    responses(
        (status = 200, description = "The configuration", body = TenantConfigResponse),
        (status = 404, description = "No configuration for this agency")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(agency_id = %abbrev_uuid(&agency_id)))]
pub async fn get_tenant_config(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(agency_id): Path<AgencyId>,
) -> Result<Json<TenantConfigResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut agencies = Agencies::new(&mut conn);
    let config = agencies.tenant_config(agency_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Tenant configuration".to_string(),
        id: agency_id.to_string(),
    })?;

    Ok(Json(config.into()))
}

#[utoipa::path(
    put,
    path = "/agencies/{agency_id}/tenant-config",
    tag = "agencies",
    summary = "Create or replace an agency's tenant configuration",
    params(("agency_id" = Uuid, Path, description = "Agency")),
    request_body = TenantConfigUpdate,
    responses(
        (status = 200, description = "The stored configuration", body = TenantConfigResponse),
        (status = 403, description = "Not this agency")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(agency_id = %abbrev_uuid(&agency_id)))]
pub async fn put_tenant_config(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(agency_id): Path<AgencyId>,
    Json(request): Json<TenantConfigUpdate>,
) -> Result<Json<TenantConfigResponse>> {
    current.require_agency()?;
    if current.id != agency_id {
        return Err(Error::Forbidden {
            message: "Agencies can only manage their own configuration".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut agencies = Agencies::new(&mut conn);
    let stored = agencies.upsert_tenant_config(&request.into_db_request(agency_id)).await?;

    tracing::info!("Stored tenant configuration");
    Ok(Json(stored.into()))
}

#[utoipa::path(
    patch,
    path = "/agencies/tutor-payments/{payment_id}/settle",
    tag = "agencies",
    summary = "Settle a tutor payment",
    params(("payment_id" = Uuid, Path, description = "Tutor payment to settle")),
    responses(
        (status = 200, description = "The settled payment", body = TutorPaymentResponse),
        (status = 403, description = "Only agencies can settle payments"),
        (status = 404, description = "Payment not found")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(payment_id = %abbrev_uuid(&payment_id)))]
pub async fn settle_tutor_payment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<TutorPaymentResponse>> {
    current.require_agency()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut payments = TutorPayments::new(&mut conn);
    let settled = payments.settle(payment_id, Utc::now().date_naive()).await?;

    tracing::info!(tutor_id = %abbrev_uuid(&settled.tutor_id), "Settled tutor payment");
    Ok(Json(settled.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::LessonInstances;
    use crate::db::models::attendance::LessonInstanceCreateDBRequest;
    use crate::test_utils::{
        agency_token, create_test_app, seed_agency, seed_default_lesson, seed_tutor, tutor_token,
    };
    use axum::http::StatusCode;
    use chrono::NaiveDate;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn tenant_config_round_trip(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let agency_id = seed_agency(&mut conn).await;
        drop(conn);

        let server = create_test_app(pool).await;
        let token = agency_token(agency_id);
        let url = format!("/api/v1/agencies/{agency_id}/tenant-config");

        let response = server.get(&url).authorization_bearer(&token).await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = server
            .put(&url)
            .authorization_bearer(&token)
            .json(&json!({
                "website_url": "https://tutors.example.com",
                "use_custom_theme": true,
                "custom_theme": {"accent": "#336699"},
            }))
            .await;
        response.assert_status_ok();

        let response = server.get(&url).authorization_bearer(&token).await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["website_url"], "https://tutors.example.com");
        assert_eq!(body["use_custom_theme"], true);
        assert_eq!(body["custom_theme"]["accent"], "#336699");
    }

    #[sqlx::test]
    async fn agencies_cannot_edit_each_others_config(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let first = seed_agency(&mut conn).await;
        let second = seed_agency(&mut conn).await;
        drop(conn);

        let server = create_test_app(pool).await;
        let response = server
            .put(&format!("/api/v1/agencies/{first}/tenant-config"))
            .authorization_bearer(&agency_token(second))
            .json(&json!({}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    async fn settling_requires_an_agency(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (agency_id, lesson) = seed_default_lesson(&mut conn, "Grade 7").await;
        let tutor = seed_tutor(&mut conn, "earner@example.com").await;

        let mut instances = LessonInstances::new(&mut conn);
        let instance = instances
            .create(&LessonInstanceCreateDBRequest {
                lesson_id: lesson.id,
                tutor_id: Some(tutor.id),
                date: NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
            })
            .await
            .unwrap();
        instances
            .mark_attended(instance.id, tutor.id, lesson.tutor_rate, Utc::now())
            .await
            .unwrap();
        let payment_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM tutor_payments WHERE lesson_instance_id = $1",
        )
        .bind(instance.id)
        .fetch_one(&mut *conn)
        .await
        .unwrap();
        drop(conn);

        let server = create_test_app(pool).await;
        let url = format!("/api/v1/agencies/tutor-payments/{payment_id}/settle");

        let response = server.patch(&url).authorization_bearer(&tutor_token(&tutor)).await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = server.patch(&url).authorization_bearer(&agency_token(agency_id)).await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["payment_status"], "paid");
        assert!(body["payment_date"].is_string());
    }
}
