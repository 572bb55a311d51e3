//! Forwarding of incoming messages to the tenant's automation/AI webhook

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::MessageType;

#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("automation endpoint returned HTTP {0}")]
    Status(u16),
}

/// Normalised payload sent to the automation endpoint
#[derive(Debug, Clone, Serialize)]
pub struct AutomationEvent {
    pub event: &'static str,
    pub company_id: String,
    pub instance: String,
    pub conversation_id: i64,
    pub contact_id: i64,
    pub message_id: i64,
    pub external_id: String,
    pub phone: String,
    pub contact_name: String,
    pub message_type: MessageType,
    pub content: String,
    pub media_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AutomationEvent {
    pub const MESSAGE_RECEIVED: &'static str = "message.received";
}

pub struct AutomationForwarder {
    http: reqwest::Client,
}

impl AutomationForwarder {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn forward(
        &self,
        url: &str,
        api_key: Option<&str>,
        event: &AutomationEvent,
    ) -> Result<(), AutomationError> {
        let mut request = self.http.post(url).json(event);
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AutomationError::Status(response.status().as_u16()));
        }
        log::info!(
            "[AUTOMATION] Forwarded message {} of conversation {}",
            event.external_id,
            event.conversation_id
        );
        Ok(())
    }
}
