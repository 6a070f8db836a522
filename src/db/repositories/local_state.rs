use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::models::{AuthToken, SessionId};

const AUTH_TOKEN: &str = "auth_token";
const USER_ID: &str = "user_id";
const USER_EMAIL: &str = "user_email";
const SESSION_ID: &str = "sid";

/// The signed-in account as remembered locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAccount {
    pub user_id: Option<i64>,
    pub email: Option<String>,
}

impl Database {
    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT value FROM local_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read local state '{key}'"))
        })
        .await
    }

    pub async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO local_state (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write local state '{key}'"))?;
            Ok(())
        })
        .await
    }

    pub async fn remove_values(&self, keys: &[&str]) -> Result<()> {
        let keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            for key in &keys {
                tx.execute("DELETE FROM local_state WHERE key = ?1", params![key])
                    .with_context(|| format!("failed to remove local state '{key}'"))?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn auth_token(&self) -> Result<Option<String>> {
        Ok(self
            .get_value(AUTH_TOKEN)
            .await?
            .filter(|token| !token.is_empty()))
    }

    pub async fn store_credentials(&self, token: &AuthToken) -> Result<()> {
        let token = token.clone();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            for (key, value) in [
                (AUTH_TOKEN, token.access_token.clone()),
                (USER_ID, token.user_id.to_string()),
                (USER_EMAIL, token.email.clone()),
            ] {
                tx.execute(
                    "INSERT INTO local_state (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, value, now],
                )?;
            }
            tx.commit().context("failed to store credentials")?;
            Ok(())
        })
        .await
    }

    /// Drops only the bearer token, as after a rejected request.
    pub async fn clear_auth_token(&self) -> Result<()> {
        self.remove_values(&[AUTH_TOKEN]).await
    }

    pub async fn clear_credentials(&self) -> Result<()> {
        self.remove_values(&[AUTH_TOKEN, USER_ID, USER_EMAIL]).await
    }

    pub async fn stored_account(&self) -> Result<StoredAccount> {
        let user_id = self
            .get_value(USER_ID)
            .await?
            .and_then(|raw| raw.parse::<i64>().ok());
        let email = self.get_value(USER_EMAIL).await?;
        Ok(StoredAccount { user_id, email })
    }

    pub async fn session_id(&self) -> Result<Option<SessionId>> {
        Ok(self
            .get_value(SESSION_ID)
            .await?
            .and_then(|raw| raw.parse::<SessionId>().ok()))
    }

    pub async fn set_session_id(&self, sid: SessionId) -> Result<()> {
        self.set_value(SESSION_ID, &sid.to_string()).await
    }

    pub async fn clear_session_id(&self) -> Result<()> {
        self.remove_values(&[SESSION_ID]).await
    }
}
