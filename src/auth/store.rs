use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use super::{CredentialStore, PlayerRecord};
use crate::config::DatabaseConfig;
use crate::errors::CredentialStoreError;

/// Postgres-backed [`CredentialStore`], the sole concrete implementation
/// this crate ships. Schema:
///
/// ```sql
/// CREATE TABLE players (
///     username      TEXT PRIMARY KEY,
///     password_hash TEXT NOT NULL
/// );
/// ```
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.connection_url())
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get_player(&self, username: &str) -> Result<Option<PlayerRecord>, CredentialStoreError> {
        let row = sqlx::query("SELECT username, password_hash FROM players WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| PlayerRecord {
            username: row.get("username"),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn add_player(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<PlayerRecord>, CredentialStoreError> {
        let result = sqlx::query(
            "INSERT INTO players (username, password_hash) VALUES ($1, $2)
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(username)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // the username was already taken; nothing was inserted.
            return Ok(None);
        }

        Ok(Some(PlayerRecord {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        }))
    }
}
