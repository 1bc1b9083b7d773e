use anyhow::Result;
use libsql::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Title is required")]
    TitleRequired,
    #[error("URL is required")]
    UrlRequired,
    #[error("Please enter a valid URL (e.g., https://example.com)")]
    InvalidUrl,
}

fn parse_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::TitleRequired);
    }
    Ok(title.to_string())
}

fn parse_url(url: &str) -> Result<String, ValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ValidationError::UrlRequired);
    }

    // Links are rendered as anchors, so only web schemes are accepted.
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(url.to_string()),
        _ => Err(ValidationError::InvalidUrl),
    }
}

/// A validated bookmark ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    title: String,
    url: String,
}

impl NewBookmark {
    /// Checks the title first, then URL presence, then URL syntax.
    pub fn parse(title: &str, url: &str) -> Result<Self, ValidationError> {
        let title = parse_title(title)?;
        let url = parse_url(url)?;
        Ok(Self { title, url })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// A validated partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkChanges {
    title: Option<String>,
    url: Option<String>,
}

impl BookmarkChanges {
    pub fn parse(title: Option<&str>, url: Option<&str>) -> Result<Self, ValidationError> {
        Ok(Self {
            title: title.map(parse_title).transpose()?,
            url: url.map(parse_url).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.url.is_none()
    }
}

const COLUMNS: &str = "id, user_id, title, url, created_at";

pub struct Bookmarks<'a> {
    conn: &'a Connection,
}

impl<'a> Bookmarks<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// All of a user's bookmarks, newest first.
    pub async fn list(&self, user_id: &str) -> Result<Vec<Bookmark>> {
        let query = format!(
            "SELECT {COLUMNS} FROM bookmarks WHERE user_id = ? ORDER BY created_at DESC, rowid DESC"
        );

        let mut rows = self.conn.query(&query, libsql::params![user_id]).await?;
        let mut bookmarks = Vec::new();
        while let Some(row) = rows.next().await? {
            bookmarks.push(self.row_to_bookmark(&row)?);
        }

        Ok(bookmarks)
    }

    pub async fn create(&self, user_id: &str, input: NewBookmark) -> Result<Bookmark> {
        let query = format!(
            r#"
            INSERT INTO bookmarks (id, user_id, title, url)
            VALUES (?, ?, ?, ?)
            RETURNING {COLUMNS}
            "#
        );

        let id = Uuid::new_v4().to_string();
        let mut rows = self
            .conn
            .query(&query, libsql::params![id, user_id, input.title, input.url])
            .await?;

        if let Some(row) = rows.next().await? {
            self.row_to_bookmark(&row)
        } else {
            anyhow::bail!("Failed to create bookmark")
        }
    }

    pub async fn get(&self, user_id: &str, id: &str) -> Result<Option<Bookmark>> {
        let query = format!("SELECT {COLUMNS} FROM bookmarks WHERE id = ? AND user_id = ?");

        let mut rows = self.conn.query(&query, libsql::params![id, user_id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(self.row_to_bookmark(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        changes: BookmarkChanges,
    ) -> Result<Option<Bookmark>> {
        if changes.is_empty() {
            return self.get(user_id, id).await;
        }

        let query = format!(
            r#"
            UPDATE bookmarks
            SET title = COALESCE(?, title), url = COALESCE(?, url)
            WHERE id = ? AND user_id = ?
            RETURNING {COLUMNS}
            "#
        );

        let mut rows = self
            .conn
            .query(&query, libsql::params![changes.title, changes.url, id, user_id])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(self.row_to_bookmark(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Deletes only when both the id and the owner match.
    pub async fn delete(&self, user_id: &str, id: &str) -> Result<bool> {
        let result = self
            .conn
            .execute(
                "DELETE FROM bookmarks WHERE id = ? AND user_id = ?",
                libsql::params![id, user_id],
            )
            .await?;
        Ok(result > 0)
    }

    fn row_to_bookmark(&self, row: &libsql::Row) -> Result<Bookmark> {
        Ok(Bookmark {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            url: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Users;
    use crate::db::Database;

    async fn setup() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("pinned.db")).await.unwrap();
        (dir, db)
    }

    async fn user(db: &Database, subject: &str) -> String {
        Users::new(db.connection())
            .upsert(subject, Some(&format!("{subject}@example.com")))
            .await
            .unwrap()
            .id
    }

    #[test]
    fn test_validation_order() {
        assert_eq!(NewBookmark::parse("  ", ""), Err(ValidationError::TitleRequired));
        assert_eq!(NewBookmark::parse("Docs", "   "), Err(ValidationError::UrlRequired));
        assert_eq!(NewBookmark::parse("Docs", "nextjs.org"), Err(ValidationError::InvalidUrl));
        assert_eq!(
            NewBookmark::parse("Docs", "javascript:alert(1)"),
            Err(ValidationError::InvalidUrl)
        );
    }

    #[test]
    fn test_parse_trims_fields() {
        let input = NewBookmark::parse("  Next.js Documentation ", " https://nextjs.org ").unwrap();
        assert_eq!(input.title(), "Next.js Documentation");
        assert_eq!(input.url(), "https://nextjs.org");
    }

    #[test]
    fn test_changes_validate_only_present_fields() {
        assert!(BookmarkChanges::parse(None, None).unwrap().is_empty());
        assert_eq!(
            BookmarkChanges::parse(Some(""), None),
            Err(ValidationError::TitleRequired)
        );
        assert_eq!(
            BookmarkChanges::parse(None, Some("not a url")),
            Err(ValidationError::InvalidUrl)
        );
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_scoped_to_owner() {
        let (_dir, db) = setup().await;
        let alice = user(&db, "alice").await;
        let bob = user(&db, "bob").await;
        let lib = Bookmarks::new(db.connection());

        let first = lib
            .create(&alice, NewBookmark::parse("One", "https://one.example").unwrap())
            .await
            .unwrap();
        let second = lib
            .create(&alice, NewBookmark::parse("Two", "https://two.example").unwrap())
            .await
            .unwrap();
        lib.create(&bob, NewBookmark::parse("Bob's", "https://bob.example").unwrap())
            .await
            .unwrap();

        let ids: Vec<String> = lib.list(&alice).await.unwrap().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(lib.list(&bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let (_dir, db) = setup().await;
        let alice = user(&db, "alice").await;
        let bob = user(&db, "bob").await;
        let lib = Bookmarks::new(db.connection());

        let bookmark = lib
            .create(&alice, NewBookmark::parse("Rust", "https://rust-lang.org").unwrap())
            .await
            .unwrap();

        assert!(!lib.delete(&bob, &bookmark.id).await.unwrap());
        assert!(lib.get(&alice, &bookmark.id).await.unwrap().is_some());
        assert!(lib.delete(&alice, &bookmark.id).await.unwrap());
        assert!(lib.get(&alice, &bookmark.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_absent_fields() {
        let (_dir, db) = setup().await;
        let alice = user(&db, "alice").await;
        let lib = Bookmarks::new(db.connection());

        let bookmark = lib
            .create(&alice, NewBookmark::parse("Rust", "https://rust-lang.org").unwrap())
            .await
            .unwrap();

        let changes = BookmarkChanges::parse(Some("The Rust Language"), None).unwrap();
        let updated = lib.update(&alice, &bookmark.id, changes).await.unwrap().unwrap();
        assert_eq!(updated.title, "The Rust Language");
        assert_eq!(updated.url, "https://rust-lang.org");
        assert_eq!(updated.created_at, bookmark.created_at);

        let changes = BookmarkChanges::parse(Some("x"), None).unwrap();
        assert!(lib.update("someone-else", &bookmark.id, changes).await.unwrap().is_none());
    }
}
