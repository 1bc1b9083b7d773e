//! HTTP Handlers for the Bookmarks API

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{BookmarkChanges, Bookmarks, NewBookmark, ValidationError};
use crate::api::{ApiJson, created, success};
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::handler::AppState;
use crate::realtime::Change;

#[derive(Debug, Deserialize)]
pub struct CreateBookmarkRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookmarkRequest {
    pub title: Option<String>,
    pub url: Option<String>,
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

const NOT_FOUND: &str = "Bookmark not found";

pub async fn list_bookmarks(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response, ApiError> {
    let lib = Bookmarks::new(state.db.connection());
    let bookmarks = lib.list(&user.id).await.context("failed to list bookmarks")?;

    tracing::debug!(user_id = %user.id, count = bookmarks.len(), "listed bookmarks");
    Ok(success(bookmarks))
}

pub async fn create_bookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<CreateBookmarkRequest>,
) -> Result<Response, ApiError> {
    let input = NewBookmark::parse(&payload.title, &payload.url)?;
    let lib = Bookmarks::new(state.db.connection());
    let bookmark = lib.create(&user.id, input).await.context("failed to add bookmark")?;

    tracing::info!(user_id = %user.id, bookmark_id = %bookmark.id, "bookmark added");
    state.feed.publish(Change::inserted(bookmark.clone()));
    Ok(created(bookmark))
}

pub async fn get_bookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let lib = Bookmarks::new(state.db.connection());

    match lib.get(&user.id, &id).await.context("failed to get bookmark")? {
        Some(bookmark) => Ok(success(bookmark)),
        None => Err(ApiError::NotFound(NOT_FOUND)),
    }
}

pub async fn update_bookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateBookmarkRequest>,
) -> Result<Response, ApiError> {
    let changes = BookmarkChanges::parse(payload.title.as_deref(), payload.url.as_deref())?;
    let publish = !changes.is_empty();
    let lib = Bookmarks::new(state.db.connection());

    let Some(bookmark) = lib
        .update(&user.id, &id, changes)
        .await
        .context("failed to update bookmark")?
    else {
        return Err(ApiError::NotFound(NOT_FOUND));
    };

    if publish {
        tracing::info!(user_id = %user.id, bookmark_id = %bookmark.id, "bookmark updated");
        state.feed.publish(Change::updated(bookmark.clone()));
    }
    Ok(success(bookmark))
}

pub async fn delete_bookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let lib = Bookmarks::new(state.db.connection());

    if !lib.delete(&user.id, &id).await.context("failed to delete bookmark")? {
        return Err(ApiError::NotFound(NOT_FOUND));
    }

    tracing::info!(user_id = %user.id, bookmark_id = %id, "bookmark deleted");
    state.feed.publish(Change::deleted(&user.id, &id));
    Ok(StatusCode::NO_CONTENT.into_response())
}
