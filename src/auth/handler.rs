//! HTTP Handlers for sign-in, sign-out and the current user

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;

use super::{CurrentUser, OAuthStates, SESSION_COOKIE, SessionSettings, Sessions, Users, session_token};
use crate::api::success;
use crate::error::ApiError;
use crate::handler::AppState;

const LOGIN_PATH: &str = "/login";

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub next: Option<String>,
}

/// Only same-site absolute paths are allowed as post-login targets.
pub(super) fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\") => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

fn session_cookie(token: &str, settings: &SessionSettings) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        settings.ttl_seconds
    );
    if settings.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cleared_cookie(settings: &SessionSettings) -> String {
    session_cookie("", &SessionSettings {
        ttl_seconds: 0,
        cookie_secure: settings.cookie_secure,
    })
}

pub async fn login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
) -> Result<Response, ApiError> {
    let next = safe_next(params.next.as_deref());
    let oauth_state = OAuthStates::new(state.db.connection())
        .create(&next, Utc::now())
        .await?;

    let url = state
        .provider
        .authorize_url(&oauth_state)
        .map_err(|e| ApiError::Internal(e.into()))?;

    tracing::info!("redirecting to identity provider");
    Ok(Redirect::to(&url).into_response())
}

pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let Some(code) = params.code else {
        tracing::info!("callback without code, back to login");
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    };

    let now = Utc::now();
    let stored_next = match params.state.as_deref() {
        Some(s) => OAuthStates::new(state.db.connection()).consume(s, now).await?,
        None => None,
    };
    let Some(stored_next) = stored_next else {
        tracing::warn!("callback with unknown or expired state");
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    };

    let identity = match state.provider.exchange(&code).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!(error = %crate::unpack_error(&e), "failed to exchange authorization code");
            return Ok(Redirect::to("/login?error=provider").into_response());
        }
    };

    let user = Users::new(state.db.connection())
        .upsert(&identity.subject, identity.email.as_deref())
        .await?;
    let token = Sessions::new(state.db.connection())
        .create(&user.id, state.sessions.ttl(), now)
        .await?;

    let next = safe_next(params.next.as_deref().or(Some(stored_next.as_str())));
    tracing::info!(user_id = %user.id, "signed in");

    Ok((
        [(header::SET_COOKIE, session_cookie(&token, &state.sessions))],
        Redirect::to(&next),
    )
        .into_response())
}

pub async fn signout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    if let Some(token) = session_token(&headers) {
        if Sessions::new(state.db.connection()).delete(&token).await? {
            tracing::info!("signed out");
        }
    }

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, cleared_cookie(&state.sessions))],
    )
        .into_response())
}

pub async fn me(user: CurrentUser) -> Response {
    success(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(None), "/");
        assert_eq!(safe_next(Some("/")), "/");
        assert_eq!(safe_next(Some("/bookmarks?x=1")), "/bookmarks?x=1");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(Some("")), "/");
    }

    #[test]
    fn test_session_cookie_attributes() {
        let settings = SessionSettings {
            ttl_seconds: 60,
            cookie_secure: true,
        };
        assert_eq!(
            session_cookie("abc", &settings),
            "pinned_session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=60; Secure"
        );
        assert_eq!(
            cleared_cookie(&settings),
            "pinned_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure"
        );
    }
}
