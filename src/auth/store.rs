//! Identity store: users, OAuth linkage and email verification tokens

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::models::{NewOAuthAccount, NewUser, OAuthAccount, User};
use crate::common::id_generator::{generate_row_id, generate_user_id};

const USER_COLUMNS: &str =
    "id, email, password_hash, name, email_verified, image, region, city, created_at";

pub const EMAIL_VERIFICATION: &str = "email_verification";

#[derive(Debug, Clone)]
pub struct UserStore {
    db: SqlitePool,
}

impl UserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
    }

    pub async fn create_user(&self, new_user: &NewUser) -> Result<User, sqlx::Error> {
        let mut conn = self.db.acquire().await?;
        let user = insert_user(&mut conn, new_user).await?;
        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    /// Create a user and its provider linkage atomically
    pub async fn create_user_with_oauth(
        &self,
        new_user: &NewUser,
        account: &NewOAuthAccount,
    ) -> Result<User, sqlx::Error> {
        let mut tx = self.db.begin().await?;
        let user = insert_user(&mut tx, new_user).await?;
        insert_oauth_account(&mut tx, &user.id, account).await?;
        tx.commit().await?;

        info!(user_id = %user.id, provider = %account.provider, "User created via OAuth");
        Ok(user)
    }

    pub async fn update_user_image(&self, id: &str, image: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET image = ? WHERE id = ?")
            .bind(image)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Overwrite the name and any optional field that was provided
    pub async fn update_profile(
        &self,
        id: &str,
        name: &str,
        image: Option<&str>,
        region: Option<&str>,
        city: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users SET
                name = ?,
                image = COALESCE(?, image),
                region = COALESCE(?, region),
                city = COALESCE(?, city)
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(image)
        .bind(region)
        .bind(city)
        .bind(id)
        .execute(&self.db)
        .await?;

        self.get_user_by_id(id).await
    }

    pub async fn get_oauth_account(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<OAuthAccount>, sqlx::Error> {
        sqlx::query_as::<_, OAuthAccount>(
            r#"
            SELECT id, user_id, provider, provider_user_id, access_token, refresh_token, expires_at
            FROM oauth_accounts WHERE provider = ? AND provider_user_id = ?
            "#,
        )
        .bind(provider)
        .bind(provider_user_id)
        .fetch_optional(&self.db)
        .await
    }

    pub async fn create_oauth_account(
        &self,
        user_id: &str,
        account: &NewOAuthAccount,
    ) -> Result<(), sqlx::Error> {
        let mut conn = self.db.acquire().await?;
        insert_oauth_account(&mut conn, user_id, account).await
    }

    pub async fn create_verification_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO verification_tokens (token, user_id, type, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token)
        .bind(user_id)
        .bind(EMAIL_VERIFICATION)
        .bind(expires_at.timestamp())
        .execute(&self.db)
        .await?;

        debug!(user_id = %user_id, "Verification token stored");
        Ok(())
    }

    /// Atomically spend an unexpired verification token and mark its owner
    /// verified. Returns the user id, or `None` when the token is unknown,
    /// expired or already spent.
    pub async fn consume_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, sqlx::Error> {
        let mut tx = self.db.begin().await?;

        let user_id: Option<String> = sqlx::query_scalar(
            r#"
            DELETE FROM verification_tokens
            WHERE token = ? AND type = ? AND expires_at > ?
            RETURNING user_id
            "#,
        )
        .bind(token)
        .bind(EMAIL_VERIFICATION)
        .bind(now.timestamp())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(user_id) = &user_id {
            sqlx::query("UPDATE users SET email_verified = 1 WHERE id = ?")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(user_id)
    }
}

async fn insert_user(
    conn: &mut sqlx::SqliteConnection,
    new_user: &NewUser,
) -> Result<User, sqlx::Error> {
    let id = generate_user_id();

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, name, email_verified, image) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&new_user.email)
    .bind(new_user.password_hash.as_deref())
    .bind(&new_user.name)
    .bind(new_user.email_verified)
    .bind(new_user.image.as_deref())
    .execute(&mut *conn)
    .await?;

    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(&id)
        .fetch_one(&mut *conn)
        .await
}

async fn insert_oauth_account(
    conn: &mut sqlx::SqliteConnection,
    user_id: &str,
    account: &NewOAuthAccount,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO oauth_accounts
            (id, user_id, provider, provider_user_id, access_token, refresh_token, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(generate_row_id())
    .bind(user_id)
    .bind(&account.provider)
    .bind(&account.provider_user_id)
    .bind(account.access_token.as_deref())
    .bind(account.refresh_token.as_deref())
    .bind(account.expires_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
