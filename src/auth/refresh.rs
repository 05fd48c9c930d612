//! Refresh token store
//!
//! Raw refresh tokens are handed to clients once and never persisted; the
//! table only holds their SHA-256 digest. Rotation deletes the row.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::debug;

use super::models::RefreshTokenRecord;
use crate::common::id_generator::{generate_opaque_token, generate_row_id, SECRET_BYTES};

/// Generate a new raw refresh token
pub fn generate_refresh_token() -> String {
    generate_opaque_token(SECRET_BYTES)
}

/// Deterministic one-way hash of a raw refresh token (lowercase hex SHA-256)
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct RefreshStore {
    db: SqlitePool,
}

impl RefreshStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(generate_row_id())
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at.timestamp())
        .execute(&self.db)
        .await?;

        debug!(user_id = %user_id, "Refresh token stored");
        Ok(())
    }

    /// Find an unexpired record by hash
    pub async fn lookup(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        self.lookup_at(token_hash, Utc::now()).await
    }

    pub async fn lookup_at(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT id, user_id, token_hash, expires_at FROM refresh_tokens WHERE token_hash = ? AND expires_at > ?",
        )
        .bind(token_hash)
        .bind(now.timestamp())
        .fetch_optional(&self.db)
        .await
    }

    /// Delete the record for `token_hash`. Returns whether a row was removed.
    pub async fn revoke(&self, token_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::migrations::ensure_schema;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ensure_schema(&pool).await.unwrap();

        sqlx::query("INSERT INTO users (id, email, name) VALUES ('user-1', 'a@x.com', 'A')")
            .execute(&pool)
            .await
            .unwrap();

        pool
    }

    #[test]
    fn test_hash_token_is_deterministic_hex() {
        let a = hash_token("some-token");
        let b = hash_token("some-token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, hash_token("some-token2"));
    }

    #[test]
    fn test_hash_token_known_vector() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_generated_tokens_differ() {
        assert_ne!(generate_refresh_token(), generate_refresh_token());
    }

    #[tokio::test]
    async fn test_create_lookup_revoke() {
        let store = RefreshStore::new(setup_test_db().await);
        let raw = generate_refresh_token();
        let hash = hash_token(&raw);

        store
            .create("user-1", &hash, Utc::now() + Duration::days(7))
            .await
            .unwrap();

        let record = store.lookup(&hash).await.unwrap().expect("record present");
        assert_eq!(record.user_id, "user-1");
        assert_eq!(record.token_hash, hash);

        assert!(store.revoke(&hash).await.unwrap());
        assert!(store.lookup(&hash).await.unwrap().is_none());

        // Revoking again is not an error, just a no-op
        assert!(!store.revoke(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_raw_token_is_never_persisted() {
        let pool = setup_test_db().await;
        let store = RefreshStore::new(pool.clone());
        let raw = generate_refresh_token();

        store
            .create("user-1", &hash_token(&raw), Utc::now() + Duration::days(7))
            .await
            .unwrap();

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens WHERE token_hash = ?")
                .bind(&raw)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_expired_record_is_not_found() {
        let store = RefreshStore::new(setup_test_db().await);
        let hash = hash_token("expiring");
        let expires_at = Utc::now() + Duration::days(1);

        store.create("user-1", &hash, expires_at).await.unwrap();

        assert!(store
            .lookup_at(&hash, expires_at - Duration::seconds(1))
            .await
            .unwrap()
            .is_some());
        assert!(store.lookup_at(&hash, expires_at).await.unwrap().is_none());
    }
}
