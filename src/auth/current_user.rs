//! Request-scoped authentication: extract the principal from a bearer JWT.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{instrument, trace};

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .ok_or(Error::Unauthenticated { message: None })?;

        let auth_str = auth_header.to_str().map_err(|e| Error::BadRequest {
            message: format!("Invalid authorization header: {e}"),
        })?;

        let token = auth_str.strip_prefix("Bearer ").ok_or(Error::Unauthenticated {
            message: Some("Expected a bearer token".to_string()),
        })?;

        let account = session::verify_session_token(token, &state.config)?;
        trace!(account_id = %account.id, kind = %account.kind, "Authenticated request");
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::create_session_token;
    use crate::db::models::users::UserRole;
    use crate::test_utils::{create_test_config, seed_student};
    use crate::types::AccountKind;
    use axum::extract::FromRequestParts as _;
    use sqlx::PgPool;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("http://localhost/test");
        if let Some(value) = value {
            builder = builder.header("authorization", value);
        }
        let (parts, _body) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[sqlx::test]
    async fn valid_bearer_token_authenticates(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let student = seed_student(&mut conn, "bearer@example.com", None).await;
        drop(conn);

        let config = create_test_config();
        let account = CurrentUser {
            id: student.id,
            kind: AccountKind::User,
            role: Some(UserRole::Student),
            email: student.email.clone(),
            name: student.full_name(),
        };
        let token = create_session_token(&account, &config).unwrap();
        let state = crate::AppState::builder()
            .db(pool)
            .config(config)
            .payments(crate::payment_providers::create_provider(Default::default()))
            .build();

        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));
        let current = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current.id, student.id);
        assert!(current.is_student());
    }

    #[sqlx::test]
    async fn missing_and_malformed_headers_are_unauthorized(pool: PgPool) {
        let state = crate::AppState::builder()
            .db(pool)
            .config(create_test_config())
            .payments(crate::payment_providers::create_provider(Default::default()))
            .build();

        let mut parts = parts_with_auth(None);
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);

        let mut parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"));
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);

        let mut parts = parts_with_auth(Some("Bearer not-a-jwt"));
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
