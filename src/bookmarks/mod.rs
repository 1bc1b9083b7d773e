//! Bookmarks Module
//!
//! Per-user URL bookmarks: storage, validation and the HTTP API. Every
//! committed write is published on the realtime change feed so that open
//! lists can reconcile without refetching.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pinned::bookmarks;
//!
//! let app = Router::new()
//!     .nest("/bookmarks", bookmarks::routes())
//!     .with_state(app_state);
//!
//! let lib = bookmarks::Bookmarks::new(db.connection());
//! let bookmark = lib.create(&user_id, NewBookmark::parse("Rust", "https://rust-lang.org")?).await?;
//! ```

mod handler;
mod lib;
mod routes;

pub use lib::*;

pub use routes::routes;

/// Returns the migrations for the bookmarks table.
///
/// The table references `users`, so these run after the auth migrations.
pub fn migrations() -> &'static [(&'static str, &'static str)] {
    &[("bookmarks_001_schema.sql", include_str!("migrations/001_schema.sql"))]
}
