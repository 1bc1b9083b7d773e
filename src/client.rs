//! HTTP client for a running pinned server.
//!
//! [`BookmarkClient::watch`] keeps a [`LiveBookmarks`] in step with the
//! server: it subscribes to the change feed, fetches the list, then applies
//! each change as it arrives and refetches on `resync`.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::{ApiResponse, ErrorResponse};
use crate::bookmarks::Bookmark;
use crate::realtime::{Change, LiveBookmarks};

/// One Server-Sent Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder. Chunks may split events and lines
/// anywhere.
#[derive(Debug, Default)]
pub struct SseParser {
    pending: Vec<u8>,
    buffer: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    /// Like [`SseParser::push`], holding back a UTF-8 sequence cut in half by
    /// the chunk boundary.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
        self.pending.drain(..valid);
        self.push(&text)
    }

    pub fn push(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() || self.event.is_some() {
                    events.push(SseEvent {
                        event: self.event.take().unwrap_or_else(|| "message".to_string()),
                        data: self.data.join("\n"),
                    });
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }

        events
    }
}

pub struct BookmarkClient {
    client: reqwest::Client,
    base: Url,
    token: String,
}

impl BookmarkClient {
    pub fn new(server: &str, token: &str) -> Result<Self> {
        let base = Url::parse(server).with_context(|| format!("invalid server url: {server}"))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base,
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
        };
        anyhow::bail!("server returned {}: {}", status.as_u16(), message)
    }

    async fn data<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body: ApiResponse<T> = Self::check(response).await?.json().await?;
        Ok(body.data)
    }

    pub async fn list(&self) -> Result<Vec<Bookmark>> {
        let response = self
            .client
            .get(self.url("/bookmarks")?)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::data(response).await
    }

    pub async fn add(&self, title: &str, url: &str) -> Result<Bookmark> {
        let response = self
            .client
            .post(self.url("/bookmarks")?)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "title": title, "url": url }))
            .send()
            .await?;
        Self::data(response).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/bookmarks/{id}"))?)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = Self::check(response).await?;
        if response.status() != StatusCode::NO_CONTENT {
            tracing::debug!(status = %response.status(), "unexpected delete status");
        }
        Ok(())
    }

    /// Follows the change feed until the server closes it, calling
    /// `on_update` with the list after the initial fetch and after every
    /// change.
    pub async fn watch<F>(&self, mut on_update: F) -> Result<()>
    where
        F: FnMut(&LiveBookmarks),
    {
        // Subscribe before fetching so nothing committed in between is lost.
        let response = self
            .client
            .get(self.url("/bookmarks/changes")?)
            .bearer_auth(&self.token)
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        let response = Self::check(response).await?;

        let mut live = LiveBookmarks::new(self.list().await?);
        on_update(&live);

        let mut parser = SseParser::default();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("change feed interrupted")?;

            for event in parser.push_bytes(&chunk) {
                match event.event.as_str() {
                    "change" => {
                        let change: Change = serde_json::from_str(&event.data)
                            .with_context(|| format!("malformed change: {}", event.data))?;
                        live.apply(change);
                    }
                    "resync" => {
                        tracing::warn!(skipped = %event.data, "change feed lagged, refetching");
                        live.reset(self.list().await?);
                    }
                    other => {
                        tracing::debug!(event = other, "ignoring feed event");
                        continue;
                    }
                }
                on_update(&live);
            }
        }

        tracing::info!("change feed closed by server");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn bookmark(id: &str, title: &str) -> Bookmark {
        Bookmark {
            id: id.to_string(),
            user_id: "alice".to_string(),
            title: title.to_string(),
            url: format!("https://example.com/{id}"),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_parser_handles_split_chunks_and_comments() {
        let mut parser = SseParser::default();
        assert!(parser.push(": keep-alive\n\nevent: cha").is_empty());
        assert!(parser.push("nge\ndata: {\"a\":").is_empty());
        let events = parser.push("1}\r\n\r\ndata: plain\n\n");

        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: "change".to_string(),
                    data: "{\"a\":1}".to_string()
                },
                SseEvent {
                    event: "message".to_string(),
                    data: "plain".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parser_keeps_split_utf8_sequence() {
        let mut parser = SseParser::default();
        let bytes = "data: café\n\n".as_bytes();
        let cut = bytes.len() - 3;
        assert!(parser.push_bytes(&bytes[..cut]).is_empty());
        let events = parser.push_bytes(&bytes[cut..]);
        assert_eq!(events[0].data, "café");
    }

    #[test]
    fn test_parser_joins_multiline_data() {
        let mut parser = SseParser::default();
        let events = parser.push("event: resync\ndata: 1\ndata: 2\n\n");
        assert_eq!(events[0].data, "1\n2");
    }

    #[tokio::test]
    async fn test_watch_applies_feed_to_fetched_list() {
        let server = MockServer::start().await;

        let feed = format!(
            "event: change\ndata: {}\n\n: keep-alive\n\nevent: change\ndata: {}\n\n",
            serde_json::to_string(&Change::inserted(bookmark("2", "two"))).unwrap(),
            serde_json::to_string(&Change::deleted("alice", "1")).unwrap(),
        );
        Mock::given(method("GET"))
            .and(path("/bookmarks/changes"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(feed, "text/event-stream"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bookmarks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [bookmark("1", "one")]
            })))
            .mount(&server)
            .await;

        let client = BookmarkClient::new(&server.uri(), "tok").unwrap();
        let mut snapshots: Vec<Vec<String>> = Vec::new();
        client
            .watch(|live| snapshots.push(live.items().iter().map(|b| b.id.clone()).collect()))
            .await
            .unwrap();

        assert_eq!(
            snapshots,
            vec![vec!["1".to_string()], vec!["2".to_string(), "1".to_string()], vec!["2".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_errors_carry_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bookmarks"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "Title is required"})),
            )
            .mount(&server)
            .await;

        let client = BookmarkClient::new(&server.uri(), "tok").unwrap();
        let err = client.add("", "https://example.com").await.unwrap_err();
        assert_eq!(err.to_string(), "server returned 400: Title is required");
    }
}
