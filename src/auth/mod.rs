//! Auth Module
//!
//! Sign-in through an external OAuth2 identity provider (authorization-code
//! flow) and server-side sessions. The browser holds an opaque session token
//! in an `HttpOnly` cookie; API clients may send the same token as a bearer
//! token. Only a SHA-256 hash of each token is stored.
//!
//! # Flow
//!
//! 1. `GET /auth/login?next=/` stores a single-use state and redirects to the
//!    provider.
//! 2. The provider redirects back to `GET /auth/callback?code=..&state=..`,
//!    the code is exchanged for the user's identity, a session is created and
//!    the browser lands on `next`.
//! 3. `POST /auth/signout` drops the session.

mod extract;
mod handler;
mod provider;
mod routes;
mod session;
mod users;

pub use extract::{CurrentUser, SESSION_COOKIE, session_token};
pub use provider::{Identity, IdentityProvider, OAuthProvider};
pub use routes::routes;
pub use session::{OAuthStates, SessionSettings, Sessions, generate_token, hash_token, purge_expired};
pub use users::{User, Users};
