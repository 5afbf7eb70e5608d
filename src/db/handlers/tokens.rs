//! Database repository for one-time codes.
//!
//! Password reset and email verification codes live in structurally identical
//! tables; `TokenKind` selects which one a repository instance targets.

use crate::db::{
    errors::{DbError, Result},
    models::tokens::{TokenCreateDBRequest, TokenDBResponse, TokenId, TokenKind},
};
use crate::types::{AccountKind, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct Tokens<'c> {
    db: &'c mut PgConnection,
    kind: TokenKind,
}

impl<'c> Tokens<'c> {
    pub fn new(db: &'c mut PgConnection, kind: TokenKind) -> Self {
        Self { db, kind }
    }

    /// Issue a new code, invalidating any outstanding ones for the same
    /// account so only the latest code is redeemable.
    #[instrument(skip(self, request), fields(kind = ?self.kind, account_id = %abbrev_uuid(&request.account_id)), err)]
    pub async fn issue(&mut self, request: &TokenCreateDBRequest) -> Result<TokenDBResponse> {
        let table = self.kind.table();

        sqlx::query(&format!(
            "UPDATE {table} SET used_at = NOW() WHERE account_kind = $1 AND account_id = $2 AND used_at IS NULL",
        ))
        .bind(request.account_kind)
        .bind(request.account_id)
        .execute(&mut *self.db)
        .await?;

        let token = sqlx::query_as::<_, TokenDBResponse>(&format!(
            r#"
            INSERT INTO {table} (account_kind, account_id, code_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        ))
        .bind(request.account_kind)
        .bind(request.account_id)
        .bind(&request.code_hash)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(token)
    }

    /// Latest unused, unexpired code for an account.
    #[instrument(skip(self), fields(kind = ?self.kind, account_id = %abbrev_uuid(&account_id)), err)]
    pub async fn find_active(
        &mut self,
        account_kind: AccountKind,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenDBResponse>> {
        let token = sqlx::query_as::<_, TokenDBResponse>(&format!(
            r#"
            SELECT * FROM {}
            WHERE account_kind = $1 AND account_id = $2 AND used_at IS NULL AND expires_at > $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            self.kind.table(),
        ))
        .bind(account_kind)
        .bind(account_id)
        .bind(now)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(token)
    }

    /// Count a failed redemption attempt against a code.
    pub async fn record_attempt(&mut self, id: TokenId) -> Result<i32> {
        let attempts = sqlx::query_scalar::<_, i32>(&format!(
            "UPDATE {} SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts",
            self.kind.table(),
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(attempts)
    }

    /// Burn a code so it cannot be redeemed again.
    #[instrument(skip(self), fields(kind = ?self.kind, token_id = id), err)]
    pub async fn consume(&mut self, id: TokenId) -> Result<()> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET used_at = NOW() WHERE id = $1 AND used_at IS NULL",
            self.kind.table(),
        ))
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::seed_student;
    use chrono::Duration;
    use sqlx::PgPool;

    fn request(account_id: Uuid, expires_at: DateTime<Utc>) -> TokenCreateDBRequest {
        TokenCreateDBRequest {
            account_kind: AccountKind::User,
            account_id,
            code_hash: "hashed-code".to_string(),
            expires_at,
        }
    }

    #[sqlx::test]
    async fn issuing_invalidates_previous_codes(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let student = seed_student(&mut conn, "reset@example.com", None).await;
        let now = Utc::now();

        let mut repo = Tokens::new(&mut conn, TokenKind::PasswordReset);
        let first = repo.issue(&request(student.id, now + Duration::minutes(15))).await.unwrap();
        let second = repo.issue(&request(student.id, now + Duration::minutes(15))).await.unwrap();

        let active = repo
            .find_active(AccountKind::User, student.id, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, second.id);
        assert_ne!(active.id, first.id);
    }

    #[sqlx::test]
    async fn consumed_and_expired_codes_are_not_active(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let student = seed_student(&mut conn, "burn@example.com", None).await;
        let now = Utc::now();

        let mut repo = Tokens::new(&mut conn, TokenKind::PasswordReset);
        let token = repo.issue(&request(student.id, now + Duration::minutes(15))).await.unwrap();
        repo.consume(token.id).await.unwrap();
        assert!(repo.find_active(AccountKind::User, student.id, now).await.unwrap().is_none());

        // Consuming twice is an error.
        assert!(matches!(repo.consume(token.id).await.unwrap_err(), DbError::NotFound));

        repo.issue(&request(student.id, now - Duration::minutes(1))).await.unwrap();
        assert!(repo.find_active(AccountKind::User, student.id, now).await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn attempts_accumulate(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let student = seed_student(&mut conn, "attempts@example.com", None).await;

        let mut repo = Tokens::new(&mut conn, TokenKind::EmailVerification);
        let token = repo
            .issue(&request(student.id, Utc::now() + Duration::minutes(15)))
            .await
            .unwrap();

        assert_eq!(repo.record_attempt(token.id).await.unwrap(), 1);
        assert_eq!(repo.record_attempt(token.id).await.unwrap(), 2);
    }
}
