//! Push transport implementations.
//!
//! `WebhookSender` POSTs to a push relay (the service that actually talks
//! to device tokens); `LogSender` is the dev-mode stand-in when no relay
//! is configured.

use async_trait::async_trait;
use reqwest::StatusCode;

use linkmind_core::{NotificationSender, PushMessage, SendOutcome, config::SenderConfig};

/// Sends notifications as JSON POSTs to a configured relay URL.
pub struct WebhookSender {
    client: reqwest::Client,
    url: String,
    timeout: std::time::Duration,
}

impl WebhookSender {
    pub fn new(config: &SenderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.push_url.clone(),
            timeout: std::time::Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(&self, user_id: &str, message: &PushMessage) -> SendOutcome {
        let result = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "user_id": user_id,
                "title": message.title,
                "body": message.body,
                "bookmark_id": message.bookmark_id,
            }))
            .timeout(self.timeout)
            .send()
            .await;

        match result {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    tracing::debug!("✅ Push accepted for user {user_id}");
                    SendOutcome::Delivered
                } else {
                    classify_status(status)
                }
            }
            // Timeouts and transport errors are transient by definition.
            Err(e) => SendOutcome::Retryable(format!("push relay unreachable: {e}")),
        }
    }
}

/// Map a relay HTTP status to a dispatch outcome.
///
/// 404/410 mean the device token is gone for good (unregistered); other
/// client errors are ours and retrying won't fix them either. Rate limits
/// and server errors are worth another attempt.
fn classify_status(status: StatusCode) -> SendOutcome {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            SendOutcome::Terminal(format!("device unregistered ({status})"))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            SendOutcome::Retryable(format!("push relay throttled ({status})"))
        }
        s if s.is_server_error() => SendOutcome::Retryable(format!("push relay error ({s})")),
        s => SendOutcome::Terminal(format!("push rejected ({s})")),
    }
}

/// Logs instead of sending. Used when no push relay is configured.
#[derive(Debug, Default)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, user_id: &str, message: &PushMessage) -> SendOutcome {
        tracing::info!("📢 [{}] {} — {}", user_id, message.title, message.body);
        SendOutcome::Delivered
    }
}
