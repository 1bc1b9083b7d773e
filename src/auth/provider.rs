use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::Auth;
use crate::error::ProviderError;

/// Who the provider says signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start a sign-in carrying `state`.
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError>;

    /// Trades an authorization code for the signed-in identity.
    async fn exchange(&self, code: &str) -> Result<Identity, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: Option<String>,
    email: Option<String>,
}

/// OAuth2 authorization-code client for a standard provider exposing an
/// authorize endpoint, a token endpoint and an OpenID userinfo endpoint.
pub struct OAuthProvider {
    client: reqwest::Client,
    settings: Auth,
    redirect_uri: String,
}

impl OAuthProvider {
    pub fn new(settings: Auth, redirect_uri: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            redirect_uri,
        }
    }

    async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Status { status, body })
    }
}

#[async_trait]
impl IdentityProvider for OAuthProvider {
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        let url = Url::parse_with_params(
            &self.settings.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", self.settings.scopes.as_str()),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    async fn exchange(&self, code: &str) -> Result<Identity, ProviderError> {
        let response = self
            .client
            .post(&self.settings.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
            ])
            .send()
            .await?;
        let token: TokenResponse = Self::error_for_status(response).await?.json().await?;
        let access_token = token
            .access_token
            .ok_or(ProviderError::MissingField("access_token"))?;

        let response = self
            .client
            .get(&self.settings.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let info: UserInfo = Self::error_for_status(response).await?.json().await?;
        let subject = info.sub.ok_or(ProviderError::MissingField("sub"))?;

        tracing::debug!(subject = %subject, "identity provider exchange complete");
        Ok(Identity {
            subject,
            email: info.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base: &str) -> Auth {
        Auth {
            client_id: "client-1".to_string(),
            client_secret: "s3cret".to_string(),
            authorize_url: format!("{base}/authorize"),
            token_url: format!("{base}/token"),
            userinfo_url: format!("{base}/userinfo"),
            scopes: "openid email".to_string(),
        }
    }

    #[test]
    fn test_authorize_url_carries_client_and_state() {
        let provider = OAuthProvider::new(
            settings("https://id.example.com"),
            "http://localhost:8080/auth/callback".to_string(),
        );
        let url = Url::parse(&provider.authorize_url("abc123").unwrap()).unwrap();
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/authorize");
        assert!(params.contains(&("response_type".into(), "code".into())));
        assert!(params.contains(&("client_id".into(), "client-1".into())));
        assert!(params.contains(&(
            "redirect_uri".into(),
            "http://localhost:8080/auth/callback".into()
        )));
        assert!(params.contains(&("scope".into(), "openid email".into())));
        assert!(params.contains(&("state".into(), "abc123".into())));
    }

    #[tokio::test]
    async fn test_exchange_returns_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "user-42",
                "email": "ada@example.com"
            })))
            .mount(&server)
            .await;

        let provider = OAuthProvider::new(settings(&server.uri()), "http://localhost/cb".to_string());
        let identity = provider.exchange("the-code").await.unwrap();

        assert_eq!(
            identity,
            Identity {
                subject: "user-42".to_string(),
                email: Some("ada@example.com".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_exchange_surfaces_rejected_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let provider = OAuthProvider::new(settings(&server.uri()), "http://localhost/cb".to_string());
        match provider.exchange("stale").await {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "invalid_grant");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exchange_requires_subject() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "tok"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"email": "x@example.com"})),
            )
            .mount(&server)
            .await;

        let provider = OAuthProvider::new(settings(&server.uri()), "http://localhost/cb".to_string());
        assert!(matches!(
            provider.exchange("code").await,
            Err(ProviderError::MissingField("sub"))
        ));
    }
}
