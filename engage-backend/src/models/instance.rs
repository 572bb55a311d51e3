use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection state of a provider instance as reported by `connection.update`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Open,
    #[default]
    Close,
    Connecting,
    /// Waiting for the QR code to be scanned
    Qrcode,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Open => "open",
            ConnectionState::Close => "close",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Qrcode => "qrcode",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(ConnectionState::Open),
            "close" | "closed" => Some(ConnectionState::Close),
            "connecting" => Some(ConnectionState::Connecting),
            "qrcode" => Some(ConnectionState::Qrcode),
            _ => None,
        }
    }
}

/// A WhatsApp number connected through the provider, owned by one tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsappInstance {
    pub id: i64,
    pub company_id: String,
    pub instance_name: String,
    pub connection_state: ConnectionState,
    pub qrcode: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
