//! Telegram Bot API client (sendMessage only)

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::services::delivery::DeliveryError;

#[derive(Clone)]
pub struct TelegramService {
    client: Client,
    api_base: String,
    bot_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramApiResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramService {
    pub fn new(config: &TelegramConfig, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_base: config.api_base.clone(),
            bot_token: config.bot_token.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some()
    }

    /// POST /bot<token>/sendMessage
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), DeliveryError> {
        let token = self.bot_token.as_ref().ok_or(DeliveryError::NotConfigured)?;

        let url = format!("{}/bot{}/sendMessage", self.api_base, token);

        // Numeric ids go out as numbers, @channel handles as strings
        let chat = match chat_id.parse::<i64>() {
            Ok(id) => serde_json::json!(id),
            Err(_) => serde_json::json!(chat_id),
        };

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": chat,
                "text": text,
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: TelegramApiResponse = response.json().await?;
        if !body.ok {
            return Err(DeliveryError::Api(body.description.unwrap_or_default()));
        }

        debug!(chat_id = %chat_id, "Telegram message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_not_configured() {
        let service = TelegramService::new(
            &TelegramConfig {
                bot_token: None,
                api_base: "http://127.0.0.1:9".to_string(),
                webhook_secret: None,
            },
            Duration::from_secs(10),
        );
        assert!(!service.is_configured());
        let result = service.send_message("1", "hi").await;
        assert!(matches!(result, Err(DeliveryError::NotConfigured)));
    }
}
