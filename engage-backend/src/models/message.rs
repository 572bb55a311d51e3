use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Payload classification of a WhatsApp message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    Sticker,
    Document,
    Poll,
    List,
    Contact,
    Location,
}

impl MessageType {
    /// Whether the payload carries a downloadable file
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            MessageType::Image
                | MessageType::Video
                | MessageType::Audio
                | MessageType::Sticker
                | MessageType::Document
        )
    }

    pub fn from_str_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Delivery status of a message. Ordered: a status never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Map a provider ack string (`SERVER_ACK`, `DELIVERY_ACK`, ...)
    pub fn from_provider_ack(ack: &str) -> Option<Self> {
        match ack.to_uppercase().as_str() {
            "PENDING" => Some(MessageStatus::Pending),
            "SERVER_ACK" => Some(MessageStatus::Sent),
            "DELIVERY_ACK" => Some(MessageStatus::Delivered),
            "READ" | "PLAYED" => Some(MessageStatus::Read),
            "ERROR" => Some(MessageStatus::Failed),
            _ => None,
        }
    }

    /// Position in the delivery lifecycle. `Failed` can replace anything but `Read`.
    pub fn rank(&self) -> i32 {
        match self {
            MessageStatus::Pending => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Delivered => 2,
            MessageStatus::Failed => 2,
            MessageStatus::Read => 3,
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub company_id: String,
    pub conversation_id: i64,
    pub contact_id: i64,
    /// Provider message id (`key.id`)
    pub external_id: String,
    pub from_me: bool,
    pub message_type: MessageType,
    pub content: String,
    pub media_url: Option<String>,
    pub media_mime: Option<String>,
    pub file_name: Option<String>,
    pub status: MessageStatus,
    pub is_deleted: bool,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Fields of a message about to be inserted
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub external_id: String,
    pub from_me: bool,
    pub message_type: MessageType,
    pub content: String,
    pub media_url: Option<String>,
    pub media_mime: Option<String>,
    pub file_name: Option<String>,
    pub status: MessageStatus,
    pub raw_payload: String,
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_parsing() {
        assert_eq!(MessageType::from_str_or_default("image"), MessageType::Image);
        assert_eq!(MessageType::from_str_or_default("location"), MessageType::Location);
        assert_eq!(MessageType::from_str_or_default("reaction"), MessageType::Text);
        assert_eq!(MessageType::Document.as_ref(), "document");
    }

    #[test]
    fn test_provider_ack_mapping() {
        assert_eq!(MessageStatus::from_provider_ack("SERVER_ACK"), Some(MessageStatus::Sent));
        assert_eq!(MessageStatus::from_provider_ack("delivery_ack"), Some(MessageStatus::Delivered));
        assert_eq!(MessageStatus::from_provider_ack("PLAYED"), Some(MessageStatus::Read));
        assert_eq!(MessageStatus::from_provider_ack("ERROR"), Some(MessageStatus::Failed));
        assert_eq!(MessageStatus::from_provider_ack("UNKNOWN"), None);
    }

    #[test]
    fn test_status_rank_is_monotonic() {
        assert!(MessageStatus::Read.rank() > MessageStatus::Delivered.rank());
        assert!(MessageStatus::Delivered.rank() > MessageStatus::Sent.rank());
        assert!(MessageStatus::Failed.rank() < MessageStatus::Read.rank());
    }
}
