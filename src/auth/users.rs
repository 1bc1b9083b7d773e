use anyhow::Result;
use libsql::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub subject: String,
    pub email: Option<String>,
    pub created_at: String,
}

pub struct Users<'a> {
    conn: &'a Connection,
}

impl<'a> Users<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Finds the user for a provider subject, creating it on first sign-in.
    /// The email is refreshed on every sign-in.
    pub async fn upsert(&self, subject: &str, email: Option<&str>) -> Result<User> {
        let query = r#"
            INSERT INTO users (id, subject, email)
            VALUES (?, ?, ?)
            ON CONFLICT(subject) DO UPDATE SET email = excluded.email
            RETURNING id, subject, email, created_at
        "#;

        let id = Uuid::new_v4().to_string();
        let mut rows = self
            .conn
            .query(query, libsql::params![id, subject, email])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(row_to_user(&row)?)
        } else {
            anyhow::bail!("Failed to upsert user: {}", subject)
        }
    }

}

pub(super) fn row_to_user(row: &libsql::Row) -> Result<User> {
    Ok(User {
        id: row.get(0)?,
        subject: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
    })
}
