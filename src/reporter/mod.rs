//! Failure notifications
//!
//! The runner hands a `FailureReport` to a `Reporter` and moves on. The
//! webhook implementation queues reports on a channel that a background task
//! drains, so a slow or unreachable webhook never delays the run. Delivery
//! problems are logged and otherwise ignored.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::{debug, info, warn};
use serde::Serialize;
use sha2::Sha256;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::utils::config::Config;

/// Notice that a probe failed
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    pub probe: String,
    pub timestamp: DateTime<Utc>,
    pub detail: Option<String>,
}

impl FailureReport {
    pub fn new(probe: &str, detail: Option<String>) -> Self {
        Self {
            probe: probe.to_string(),
            timestamp: Utc::now(),
            detail,
        }
    }
}

/// Receives failure notices from the runner
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Queue a notice. Must not block and must not fail.
    fn report(&self, failure: FailureReport);

    /// Wait up to `timeout` for queued notices to be delivered
    async fn flush(&self, _timeout: Duration) {}
}

/// Reporter used when no webhook is configured
pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    fn report(&self, failure: FailureReport) {
        warn!(
            "Probe {} failed{} (no webhook configured)",
            failure.probe,
            failure
                .detail
                .as_deref()
                .map(|d| format!(": {}", d))
                .unwrap_or_default()
        );
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct TextContent {
    text: String,
}

/// Custom-bot text message, optionally signed
#[derive(Debug, Serialize, PartialEq)]
struct WebhookMessage {
    msg_type: &'static str,
    content: TextContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sign: Option<String>,
}

/// base64(HMAC-SHA256(key = "<timestamp>\n<secret>", message = ""))
pub fn sign(timestamp: i64, secret: &str) -> Result<String> {
    let key = format!("{}\n{}", timestamp, secret);
    let mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid signing key: {}", e))?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn build_message(failure: &FailureReport, secret: Option<&str>) -> Result<WebhookMessage> {
    let mut message = WebhookMessage {
        msg_type: "text",
        content: TextContent {
            text: failure.probe.clone(),
        },
        timestamp: None,
        sign: None,
    };
    if let Some(secret) = secret {
        let timestamp = failure.timestamp.timestamp();
        message.sign = Some(sign(timestamp, secret)?);
        message.timestamp = Some(timestamp.to_string());
    }
    Ok(message)
}

struct Webhook {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl Webhook {
    async fn deliver(&self, failure: &FailureReport) -> Result<()> {
        let message = build_message(failure, self.secret.as_deref())?;
        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .context("Failed to send webhook")?;

        let status = response.status();
        if status.is_success() {
            info!("Reported failure of {} ({})", failure.probe, status);
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!("Webhook answered {} for {}: {}", status, failure.probe, body);
        }
        Ok(())
    }
}

/// Posts failure notices to a chat webhook from a background task
pub struct WebhookReporter {
    sender: Mutex<Option<mpsc::UnboundedSender<FailureReport>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WebhookReporter {
    /// Spawn the delivery task. Must be called inside a tokio runtime.
    pub fn spawn(url: &str, secret: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        let webhook = Webhook {
            client,
            url: url.to_string(),
            secret,
        };

        let (sender, mut receiver) = mpsc::unbounded_channel::<FailureReport>();
        let worker = tokio::spawn(async move {
            while let Some(failure) = receiver.recv().await {
                if let Err(e) = webhook.deliver(&failure).await {
                    warn!("Could not report failure of {}: {:#}", failure.probe, e);
                }
            }
            debug!("Webhook reporter drained");
        });

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }
}

#[async_trait]
impl Reporter for WebhookReporter {
    fn report(&self, failure: FailureReport) {
        let sent = match self.sender.lock() {
            Ok(guard) => guard.as_ref().map(|tx| tx.send(failure.clone()).is_ok()),
            Err(_) => None,
        };
        if sent != Some(true) {
            warn!("Reporter closed, dropping failure of {}", failure.probe);
        }
    }

    async fn flush(&self, timeout: Duration) {
        // Closing the channel lets the worker exit once the queue is empty
        let sender = self.sender.lock().ok().and_then(|mut g| g.take());
        drop(sender);

        let worker = self.worker.lock().ok().and_then(|mut g| g.take());
        if let Some(worker) = worker {
            if tokio::time::timeout(timeout, worker).await.is_err() {
                warn!(
                    "Gave up waiting for webhook delivery after {}s",
                    timeout.as_secs()
                );
            }
        }
    }
}

/// Webhook reporter when a URL is configured, log-only otherwise
pub fn from_config(config: &Config) -> Result<Box<dyn Reporter>> {
    match config.reporter_url.as_deref() {
        Some(url) => Ok(Box::new(WebhookReporter::spawn(
            url,
            config.reporter_secret.clone(),
        )?)),
        None => Ok(Box::new(LogReporter)),
    }
}

/// Keeps every report in memory
#[cfg(test)]
#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<FailureReport>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub fn probes(&self) -> Vec<String> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.probe.clone())
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl Reporter for RecordingReporter {
    fn report(&self, failure: FailureReport) {
        self.reports.lock().unwrap().push(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_body() {
        let failure = FailureReport::new("login", Some("timed out".to_string()));
        let body = serde_json::to_value(build_message(&failure, None).unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "msg_type": "text", "content": { "text": "login" } })
        );
    }

    #[test]
    fn test_signed_body() {
        let failure = FailureReport::new("like", None);
        let body = serde_json::to_value(build_message(&failure, Some("s3cret")).unwrap()).unwrap();

        let timestamp = failure.timestamp.timestamp();
        assert_eq!(body["timestamp"], timestamp.to_string());
        assert_eq!(body["sign"], sign(timestamp, "s3cret").unwrap());
        assert_eq!(body["content"]["text"], "like");
    }

    #[test]
    fn test_signature() {
        let signature = sign(1_700_000_000, "s3cret").unwrap();
        // 32-byte digest, base64 encoded
        assert_eq!(signature.len(), 44);
        assert_eq!(STANDARD.decode(&signature).unwrap().len(), 32);
        assert_eq!(signature, sign(1_700_000_000, "s3cret").unwrap());
        assert_ne!(signature, sign(1_700_000_001, "s3cret").unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_never_fails_the_caller() {
        // Nothing listens on port 9 (discard) on the loopback in test sandboxes
        let reporter = WebhookReporter::spawn("http://127.0.0.1:9/hook", None).unwrap();
        reporter.report(FailureReport::new("post", None));
        reporter.flush(Duration::from_secs(15)).await;
        // Reports after flush are dropped with a warning
        reporter.report(FailureReport::new("reply", None));
    }

    #[test]
    fn test_recording_reporter() {
        let reporter = RecordingReporter::default();
        reporter.report(FailureReport::new("login", None));
        assert_eq!(reporter.probes(), vec!["login"]);
    }
}
