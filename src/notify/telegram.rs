use crate::config::TelegramConfig;
use crate::error::NotifyError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Trait for notification sink implementations
///
/// A sink delivers one UTF-8 text message to one pre-configured destination.
/// There is no retry inside the sink; the caller decides whether a delivery
/// failure is fatal to its cycle (it is not: the monitor logs and continues).
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn send(&self, message: &str) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send>>;
}

/// Request payload for the Bot API `sendMessage` method
#[derive(Debug, Serialize)]
struct SendMessageRequest {
    chat_id: String,
    text: String,
}

/// Response envelope returned by the Bot API
#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram notification sink
///
/// Posts messages to a single chat via the Bot API. The HTTP client carries
/// the configured request timeout so a hung delivery call cannot stall an
/// evaluation cycle beyond that bound.
pub struct TelegramNotifier {
    client: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Create a new notifier from configuration
    pub fn new(config: &TelegramConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        }
    }

    fn api_url(&self) -> String {
        format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token)
    }

    /// Map the Bot API response envelope to a delivery result
    fn check_response(response: SendMessageResponse) -> Result<(), NotifyError> {
        if response.ok {
            Ok(())
        } else {
            Err(NotifyError::Delivery(
                response
                    .description
                    .unwrap_or_else(|| "no description given".to_string()),
            ))
        }
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, message: &str) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send>> {
        let client = self.client.clone();
        let url = self.api_url();
        let request = SendMessageRequest {
            chat_id: self.chat_id.clone(),
            text: message.to_string(),
        };

        Box::pin(async move {
            let response = client.post(&url).json(&request).send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                return Err(NotifyError::Delivery(format!(
                    "sendMessage returned {}: {}",
                    status, body
                )));
            }

            let envelope: SendMessageResponse = response
                .json()
                .await
                .map_err(|e| NotifyError::Delivery(format!("malformed response: {}", e)))?;
            Self::check_response(envelope)
        })
    }
}
