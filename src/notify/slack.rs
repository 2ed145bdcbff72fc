use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{Notifier, NotifyError};

#[derive(Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

/// Posts alerts to a Slack incoming webhook
#[derive(Clone)]
pub struct SlackWebhookNotifier {
    client: Client,
    webhook_url: String,
}

impl std::fmt::Debug for SlackWebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackWebhookNotifier")
            .field("webhook_url", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SlackWebhookNotifier {
    pub fn new(webhook_url: String, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl Notifier for SlackWebhookNotifier {
    #[instrument(skip_all)]
    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&WebhookMessage { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Alert delivered to webhook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<Value>>>;

    /// Start a webhook that records each body and answers with `status`
    async fn start_webhook(status: StatusCode) -> (String, Received) {
        async fn hook(
            State((received, status)): State<(Received, StatusCode)>,
            Json(body): Json<Value>,
        ) -> (StatusCode, &'static str) {
            received.lock().unwrap().push(body);
            let reply = if status.is_success() { "ok" } else { "invalid_token" };
            (status, reply)
        }

        let received = Received::default();
        let app = Router::new()
            .route("/services/T/B/x", post(hook))
            .with_state((Arc::clone(&received), status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (format!("http://{addr}/services/T/B/x"), received)
    }

    #[tokio::test]
    async fn posts_text_payload() {
        let (url, received) = start_webhook(StatusCode::OK).await;
        let notifier = SlackWebhookNotifier::new(url, Duration::from_secs(5)).unwrap();

        notifier.send_message("run failed:\nboom").await.unwrap();

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0], serde_json::json!({"text": "run failed:\nboom"}));
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let (url, _received) = start_webhook(StatusCode::FORBIDDEN).await;
        let notifier = SlackWebhookNotifier::new(url, Duration::from_secs(5)).unwrap();

        match notifier.send_message("hello").await {
            Err(NotifyError::Rejected { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "invalid_token");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn debug_hides_webhook_url() {
        let notifier = SlackWebhookNotifier::new(
            "https://hooks.slack.com/services/T/B/secret".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(!format!("{notifier:?}").contains("secret"));
    }
}
