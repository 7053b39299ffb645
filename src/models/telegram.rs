use serde::{Deserialize, Serialize};

/// Webhook acknowledgement; Telegram only looks at the status code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub ok: bool,
}
