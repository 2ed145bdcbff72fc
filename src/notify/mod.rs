//! Alert channel for fatal run failures

mod slack;

pub use slack::SlackWebhookNotifier;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::NotificationConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("notification endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Sends plain-text messages to a human-facing channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<(), NotifyError>;
}

/// Used when no webhook is configured; the alert only reaches the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        tracing::warn!("No notification channel configured, alert not sent:\n{text}");
        Ok(())
    }
}

/// Pick the notifier for a configuration
pub fn from_config(config: &NotificationConfig) -> Box<dyn Notifier> {
    match &config.webhook_url {
        Some(url) => match SlackWebhookNotifier::new(url.clone(), Duration::from_secs(10)) {
            Ok(notifier) => Box::new(notifier),
            Err(e) => {
                tracing::warn!("Falling back to log-only alerts: {e}");
                Box::new(LogNotifier)
            }
        },
        None => Box::new(LogNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn without_webhook_alerts_only_reach_the_log() {
        let notifier = from_config(&NotificationConfig { webhook_url: None });

        notifier.send_message("nothing to deliver").await.unwrap();
    }

    #[tokio::test]
    async fn configured_webhook_receives_alerts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/hook",
            post(move |Json(body): Json<serde_json::Value>| {
                let counter = Arc::clone(&counter);
                async move {
                    assert_eq!(body["text"], "disk full");
                    counter.fetch_add(1, Ordering::SeqCst);
                    "ok"
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let notifier = from_config(&NotificationConfig {
            webhook_url: Some(format!("http://{addr}/hook")),
        });
        notifier.send_message("disk full").await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
