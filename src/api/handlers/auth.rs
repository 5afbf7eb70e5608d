//! HTTP handlers for authentication: login and password resets.
//!
//! Both users and agencies authenticate here; the email decides which
//! principal table a request resolves against. Reset codes are issued hashed
//! and single-use, and responses never reveal whether an email exists.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde_json::{Value, json};

use crate::{
    AppState,
    api::models::users::{
        CurrentUser, LoginRequest, LoginResponse, PasswordResetConfirmRequest, PasswordResetRequest,
    },
    auth::{password, session},
    db::{
        handlers::{Agencies, Repository, Tokens, Users},
        models::{
            agencies::AgencyUpdateDBRequest,
            tokens::{TokenCreateDBRequest, TokenKind},
            users::UserUpdateDBRequest,
        },
    },
    errors::{Error, Result},
    types::AccountKind,
};

const MAX_RESET_ATTEMPTS: i32 = 5;

/// An account found by email, from either principal table.
struct ResolvedAccount {
    principal: CurrentUser,
    password_hash: Option<String>,
}

async fn resolve_by_email(state: &AppState, email: &str) -> Result<Option<ResolvedAccount>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut users = Users::new(&mut conn);
    if let Some(user) = users.get_by_email(email).await? {
        return Ok(Some(ResolvedAccount {
            principal: CurrentUser {
                id: user.id,
                kind: AccountKind::User,
                role: Some(user.role),
                email: user.email.clone(),
                name: user.full_name(),
            },
            password_hash: user.password_hash,
        }));
    }

    let mut agencies = Agencies::new(&mut conn);
    if let Some(agency) = agencies.get_by_email(email).await? {
        return Ok(Some(ResolvedAccount {
            principal: CurrentUser {
                id: agency.id,
                kind: AccountKind::Agency,
                role: None,
                email: agency.email.clone(),
                name: agency.name.clone(),
            },
            password_hash: agency.password_hash,
        }));
    }

    Ok(None)
}

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    summary = "Log in as a user or agency",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let account = resolve_by_email(&state, &request.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    let hash = account.password_hash.ok_or_else(invalid_credentials)?;
    if !password::verify_password(&request.password, &hash)? {
        return Err(invalid_credentials());
    }

    let token = session::create_session_token(&account.principal, &state.config)?;
    Ok(Json(LoginResponse {
        token,
        account: account.principal,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/password-resets",
    tag = "auth",
    summary = "Request a password reset code",
    request_body = PasswordResetRequest,
    responses(
        (status = 202, description = "Reset code issued if the account exists")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    // The response is identical whether or not the email exists.
    let acknowledged = json!({
        "message": "If that email is registered, a reset code has been issued"
    });

    let Some(account) = resolve_by_email(&state, &request.email).await? else {
        return Ok((StatusCode::ACCEPTED, Json(acknowledged)));
    };

    let code = password::generate_reset_code();
    let code_hash = password::hash_password(&code)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut tokens = Tokens::new(&mut conn, TokenKind::PasswordReset);
    tokens
        .issue(&TokenCreateDBRequest {
            account_kind: account.principal.kind,
            account_id: account.principal.id,
            code_hash,
            expires_at: Utc::now() + state.config.auth.reset_code_expiry,
        })
        .await?;

    // Code delivery (email) happens out of band.
    tracing::info!(account_id = %account.principal.id, kind = %account.principal.kind, "Issued password reset code");

    Ok((StatusCode::ACCEPTED, Json(acknowledged)))
}

#[utoipa::path(
    post,
    path = "/auth/password-resets/confirm",
    tag = "auth",
    summary = "Redeem a password reset code",
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 401, description = "Invalid or expired code")
    )
)]
#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> Result<StatusCode> {
    let invalid_code = || Error::Unauthenticated {
        message: Some("Invalid or expired reset code".to_string()),
    };

    let account = resolve_by_email(&state, &request.email)
        .await?
        .ok_or_else(invalid_code)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut tokens = Tokens::new(&mut conn, TokenKind::PasswordReset);

    let token = tokens
        .find_active(account.principal.kind, account.principal.id, Utc::now())
        .await?
        .ok_or_else(invalid_code)?;

    if token.attempts >= MAX_RESET_ATTEMPTS {
        tokens.consume(token.id).await?;
        return Err(invalid_code());
    }

    if !password::verify_password(&request.code, &token.code_hash)? {
        tokens.record_attempt(token.id).await?;
        return Err(invalid_code());
    }

    tokens.consume(token.id).await?;

    let new_hash = password::hash_password(&request.new_password)?;
    match account.principal.kind {
        AccountKind::User => {
            let mut users = Users::new(&mut conn);
            users
                .update(
                    account.principal.id,
                    &UserUpdateDBRequest {
                        password_hash: Some(new_hash),
                        ..Default::default()
                    },
                )
                .await?;
        }
        AccountKind::Agency => {
            let mut agencies = Agencies::new(&mut conn);
            agencies
                .update(
                    account.principal.id,
                    &AgencyUpdateDBRequest {
                        password_hash: Some(new_hash),
                        ..Default::default()
                    },
                )
                .await?;
        }
    }

    tracing::info!(account_id = %account.principal.id, "Password reset completed");
    Ok(StatusCode::NO_CONTENT)
}
