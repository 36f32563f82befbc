//! Operator notifications.
//!
//! Delivery is fire-and-forget: every method reports whether the message got
//! through and never returns an error. Failures are logged and dropped.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::TelegramConfig;
use crate::provider::InstanceInfo;

/// Somewhere to send free-text alerts.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one message. `true` if the remote side accepted it.
    async fn notify(&self, text: &str) -> bool;

    async fn notify_startup(&self) -> bool {
        self.notify(&startup_message()).await
    }

    async fn notify_success(&self, instance: &InstanceInfo) -> bool {
        self.notify(&success_message(instance)).await
    }

    async fn notify_error(&self, error: &str) -> bool {
        self.notify(&error_message(error)).await
    }
}

pub fn startup_message() -> String {
    "🚀 <b>Instance Auto-Register Started</b>\n\n\
     Polling for capacity. You will be notified once the instance is created."
        .to_string()
}

pub fn success_message(instance: &InstanceInfo) -> String {
    format!(
        "🎉 <b>Instance Created Successfully!</b>\n\n\
         <b>Instance Details:</b>\n\
         • <b>Name:</b> {}\n\
         • <b>Shape:</b> {}\n\
         • <b>Region:</b> {}\n\
         • <b>Availability Domain:</b> {}\n\
         • <b>Public IP:</b> {}\n\
         • <b>State:</b> {}\n\n\
         <b>Instance ID:</b>\n<code>{}</code>",
        escape_html(&instance.name),
        escape_html(&instance.shape),
        escape_html(&instance.region),
        escape_html(&instance.availability_domain),
        escape_html(&instance.public_ip),
        escape_html(&instance.lifecycle_state),
        escape_html(&instance.id),
    )
}

pub fn error_message(error: &str) -> String {
    format!(
        "⚠️ <b>Instance Auto-Register Stopped</b>\n\n<b>Error:</b> {}",
        escape_html(error)
    )
}

/// Telegram's HTML parse mode only needs these three escaped.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Telegram Bot API sink.
pub struct TelegramNotifier {
    client: reqwest::Client,
    url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            url: format!("{}/bot{}/sendMessage", config.api_base, config.bot_token),
            chat_id: config.chat_id.clone(),
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn notify(&self, text: &str) -> bool {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };

        match self.client.post(&self.url).json(&request).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Telegram notification sent");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "Telegram API rejected notification");
                false
            }
            // reqwest errors can embed the URL, which carries the bot token.
            Err(e) => {
                warn!(error = %e.without_url(), "Failed to send Telegram notification");
                false
            }
        }
    }
}
