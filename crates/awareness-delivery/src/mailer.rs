//! Email transports.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use awareness_core::config::EmailConfig;

use crate::error::{DeliveryError, Result};

/// Longest slice of the HTML body written to logs by [`LogMailer`].
const LOGGED_HTML_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// What happened to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Accepted by the email provider.
    Sent { id: Option<String> },
    /// Written to the log only; nobody received it.
    Logged,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: &EmailMessage) -> Result<DeliveryStatus>;
}

// ── Resend ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Sends through the Resend `/emails` API.
pub struct ResendMailer {
    base_url: String,
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl ResendMailer {
    pub fn new(config: &EmailConfig, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: config.from.clone(),
            client,
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    fn name(&self) -> &'static str {
        "resend"
    }

    async fn send(&self, message: &EmailMessage) -> Result<DeliveryStatus> {
        let request = SendEmailRequest {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // A 2xx with an unexpected body still counts as accepted.
        let id = serde_json::from_str::<SendEmailResponse>(&body)
            .ok()
            .and_then(|r| r.id);
        tracing::info!(to = %message.to, id = ?id, "Report email sent");
        Ok(DeliveryStatus::Sent { id })
    }
}

// ── Log only ────────────────────────────────────────────────────────────

/// Used when no email API key is configured.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &EmailMessage) -> Result<DeliveryStatus> {
        let preview: String = message.html.chars().take(LOGGED_HTML_LIMIT).collect();
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            html = %preview,
            "Email delivery disabled; logging report email"
        );
        Ok(DeliveryStatus::Logged)
    }
}

/// Pick the transport for this deployment: Resend when an API key is set,
/// otherwise log-only.
pub fn mailer_from_config(config: &EmailConfig) -> Result<Arc<dyn Mailer>> {
    match config.api_key() {
        Some(key) => Ok(Arc::new(ResendMailer::new(config, key)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status: u16, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(idx) = text.find("\r\n\r\n") {
                    let len = text[..idx]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if buf.len() >= idx + 4 + len {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            String::from_utf8_lossy(&buf).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn message() -> EmailMessage {
        EmailMessage {
            to: "reader@example.com".to_string(),
            subject: "Ready".to_string(),
            html: "<p>hi</p>".to_string(),
        }
    }

    fn config(base_url: String) -> EmailConfig {
        EmailConfig {
            api_key: Some("re_key".to_string()),
            base_url,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn resend_posts_message() {
        let (url, server) = serve_once(200, r#"{"id":"email-1"}"#).await;
        let mailer = ResendMailer::new(&config(url), "re_key").unwrap();

        let status = mailer.send(&message()).await.unwrap();
        assert_eq!(
            status,
            DeliveryStatus::Sent {
                id: Some("email-1".to_string())
            }
        );

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /emails "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer re_key"));
        let json_start = request.find("\r\n\r\n").unwrap() + 4;
        let sent: serde_json::Value = serde_json::from_str(&request[json_start..]).unwrap();
        assert_eq!(sent["to"], serde_json::json!(["reader@example.com"]));
        assert_eq!(sent["subject"], "Ready");
        assert_eq!(
            sent["from"],
            "Investment Awareness <noreply@investmentawareness.com>"
        );
    }

    #[tokio::test]
    async fn resend_rejection_is_an_error() {
        let (url, _server) = serve_once(422, r#"{"message":"invalid to"}"#).await;
        let mailer = ResendMailer::new(&config(url), "re_key").unwrap();
        let err = mailer.send(&message()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Status { status: 422, .. }));
    }

    #[tokio::test]
    async fn log_mailer_reports_logged() {
        assert_eq!(LogMailer.send(&message()).await.unwrap(), DeliveryStatus::Logged);
    }

    #[test]
    fn transport_follows_api_key() {
        let without = EmailConfig::default();
        assert_eq!(mailer_from_config(&without).unwrap().name(), "log");

        let with = config("http://127.0.0.1:9".to_string());
        assert_eq!(mailer_from_config(&with).unwrap().name(), "resend");
    }
}
