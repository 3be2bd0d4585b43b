//! Periodic snapshot fetches and one-shot user-message sends over the
//! request/response channel.

use crate::error::ChannelError;
use crate::models::{ConversationResponse, Message};
use serde::Serialize;
use tracing::warn;

#[derive(Serialize)]
struct AskRequest {
    query: String,
}

/// Issues requests against the backend's HTTP surface.
///
/// Constructed once at startup and cloned where needed; `reqwest::Client`
/// carries its own connection pool.
#[derive(Clone)]
pub struct SnapshotPoller {
    http: reqwest::Client,
    base_url: String,
}

impl SnapshotPoller {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Sends one user message to `/ask`.
    ///
    /// The request runs in the background and the response body is
    /// disregarded; only the side effect on the remote conversation
    /// matters. A failure is reported and never escalated; the message is
    /// simply lost, and the conversation view will show whatever the
    /// backend actually recorded.
    pub fn send_user_message(&self, text: impl Into<String>) {
        let http = self.http.clone();
        let url = format!("{}/ask", self.base_url);
        let body = AskRequest { query: text.into() };
        tokio::spawn(async move {
            if let Err(e) = http.post(&url).json(&body).send().await {
                warn!(error = %e, "failed to deliver user message");
            }
        });
    }

    /// Fetches the complete conversation snapshot from `/get_updates`.
    ///
    /// The caller decides what a failure means; the scheduled-poll loop
    /// logs it and waits for the next tick.
    pub async fn poll(&self) -> Result<Vec<Message>, ChannelError> {
        let url = format!("{}/get_updates", self.base_url);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let body: ConversationResponse = response.json().await?;
        Ok(body.conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use axum::{
        Json, Router,
        extract::State,
        routing::{get, post},
    };
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn poll_decodes_a_snapshot() {
        let app = Router::new().route(
            "/get_updates",
            get(|| async {
                Json(serde_json::json!({
                    "conversation": [
                        {"role": "user", "text": "hi"},
                        {"role": "model", "text": "hello"},
                    ]
                }))
            }),
        );
        let poller = SnapshotPoller::new(serve(app).await);

        let snapshot = poller.poll().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].role, Role::User);
        assert_eq!(snapshot[1].role, Role::Agent);
        assert_eq!(snapshot[1].text, "hello");
    }

    #[tokio::test]
    async fn poll_reports_a_malformed_body_as_decode() {
        let app = Router::new().route("/get_updates", get(|| async { "definitely not json" }));
        let poller = SnapshotPoller::new(serve(app).await);

        let err = poller.poll().await.unwrap_err();
        assert!(matches!(err, ChannelError::Decode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn poll_reports_an_unreachable_backend_as_transport() {
        let poller = SnapshotPoller::new("http://127.0.0.1:9");

        let err = poller.poll().await.unwrap_err();
        assert!(matches!(err, ChannelError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn send_user_message_posts_the_query_and_ignores_the_response() {
        let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/ask",
                post(
                    |State(received): State<Arc<Mutex<Vec<String>>>>,
                     Json(body): Json<serde_json::Value>| async move {
                        let query = body["query"].as_str().unwrap_or_default().to_string();
                        received.lock().unwrap().push(query);
                        // The body is deliberately junk; the sender must not care.
                        "ok, whatever"
                    },
                ),
            )
            .with_state(received.clone());
        let poller = SnapshotPoller::new(serve(app).await);

        poller.send_user_message("turn on the lights");

        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if !received.lock().unwrap().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("query never arrived");
        assert_eq!(received.lock().unwrap().as_slice(), ["turn on the lights"]);
    }
}
