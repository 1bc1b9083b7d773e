use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use libsql::Connection;
use sha2::{Digest, Sha256};

use super::users::{User, row_to_user};
use crate::db::timestamp;

const TOKEN_BYTES: usize = 32;

/// How long a login redirect may take before its state is rejected.
pub const OAUTH_STATE_TTL_SECONDS: i64 = 10 * 60;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl_seconds: i64,
    pub cookie_secure: bool,
}

impl SessionSettings {
    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.ttl_seconds)
    }
}

/// A fresh random token, hex encoded.
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut bytes)
        .map_err(|e| anyhow::anyhow!("failed to generate random token: {e}"))?;
    Ok(hex::encode(bytes))
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub struct Sessions<'a> {
    conn: &'a Connection,
}

impl<'a> Sessions<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Creates a session and returns the raw token. The token itself is never
    /// stored.
    pub async fn create(&self, user_id: &str, ttl: Duration, now: DateTime<Utc>) -> Result<String> {
        let token = generate_token()?;
        self.conn
            .execute(
                "INSERT INTO sessions (token_hash, user_id, expires_at) VALUES (?, ?, ?)",
                libsql::params![hash_token(&token), user_id, timestamp(now + ttl)],
            )
            .await?;
        Ok(token)
    }

    /// The user behind an unexpired session token.
    pub async fn find_user(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let query = r#"
            SELECT users.id, users.subject, users.email, users.created_at
            FROM sessions
            JOIN users ON users.id = sessions.user_id
            WHERE sessions.token_hash = ? AND sessions.expires_at > ?
        "#;

        let mut rows = self
            .conn
            .query(query, libsql::params![hash_token(token), timestamp(now)])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row_to_user(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn delete(&self, token: &str) -> Result<bool> {
        let result = self
            .conn
            .execute(
                "DELETE FROM sessions WHERE token_hash = ?",
                libsql::params![hash_token(token)],
            )
            .await?;
        Ok(result > 0)
    }
}

pub struct OAuthStates<'a> {
    conn: &'a Connection,
}

impl<'a> OAuthStates<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Stores a single-use state carrying the post-login path.
    pub async fn create(&self, next: &str, now: DateTime<Utc>) -> Result<String> {
        let state = generate_token()?;
        let expires_at = now + Duration::seconds(OAUTH_STATE_TTL_SECONDS);
        self.conn
            .execute(
                "INSERT INTO oauth_states (state, next, expires_at) VALUES (?, ?, ?)",
                libsql::params![state.as_str(), next, timestamp(expires_at)],
            )
            .await?;
        Ok(state)
    }

    /// Removes the state and returns its `next` path if it was still valid.
    pub async fn consume(&self, state: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let query = r#"
            DELETE FROM oauth_states
            WHERE state = ? AND expires_at > ?
            RETURNING next
        "#;

        let mut rows = self
            .conn
            .query(query, libsql::params![state, timestamp(now)])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }
}

/// Drops expired sessions and login states. Returns how many rows went away.
pub async fn purge_expired(conn: &Connection, now: DateTime<Utc>) -> Result<u64> {
    let now = timestamp(now);
    let sessions = conn
        .execute("DELETE FROM sessions WHERE expires_at <= ?", libsql::params![now.as_str()])
        .await?;
    let states = conn
        .execute("DELETE FROM oauth_states WHERE expires_at <= ?", libsql::params![now.as_str()])
        .await?;
    Ok(sessions + states)
}
