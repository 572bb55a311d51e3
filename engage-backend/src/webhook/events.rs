//! Wire shapes of the provider webhook (Evolution API) and event-name dispatch

use serde::Deserialize;
use serde_json::Value;
use strum::{AsRefStr, EnumIter, EnumString};

/// Event types the handler understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, EnumIter)]
pub enum EventType {
    #[strum(serialize = "qrcode.updated")]
    QrcodeUpdated,
    #[strum(serialize = "connection.update")]
    ConnectionUpdate,
    #[strum(serialize = "messages.update")]
    MessagesUpdate,
    #[strum(serialize = "send.message")]
    SendMessage,
    #[strum(serialize = "presence.update")]
    PresenceUpdate,
    #[strum(serialize = "chats.update")]
    ChatsUpdate,
    #[strum(serialize = "messages.delete")]
    MessagesDelete,
    #[strum(serialize = "messages.upsert")]
    MessagesUpsert,
    #[strum(serialize = "contacts.update")]
    ContactsUpdate,
    #[strum(serialize = "groups.upsert")]
    GroupsUpsert,
}

impl EventType {
    /// Parse an event name. `MESSAGES_UPSERT`, `messages-upsert` and
    /// `messages.upsert` are the same event.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '_' | '-' => '.',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        normalized.parse().ok()
    }
}

/// Top-level webhook body
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub instance: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
}

impl WebhookEnvelope {
    /// `data` as a list of items; events may carry one object or an array
    pub fn items(&self) -> Vec<&Value> {
        match &self.data {
            Value::Array(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    #[serde(default)]
    pub remote_jid: Option<String>,
    /// Alternate addressing for the same chat (phone JID when `remoteJid` is a LID)
    #[serde(default)]
    pub remote_jid_alt: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub id: Option<String>,
}

/// `data` of `messages.upsert` / `send.message`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    #[serde(default)]
    pub key: MessageKey,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub message: Value,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub message_timestamp: Option<Value>,
}

impl MessageData {
    /// Unix seconds from `messageTimestamp`, which arrives as a number or a string
    pub fn timestamp_secs(&self) -> Option<i64> {
        match self.message_timestamp.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Read a string field trying several key spellings in order
pub fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

/// External message id of a status/delete item: `keyId`, `key.id`, `id` or `messageId`
pub fn item_message_id(item: &Value) -> Option<&str> {
    str_field(item, &["keyId"])
        .or_else(|| item.get("key").and_then(|k| str_field(k, &["id"])))
        .or_else(|| str_field(item, &["id", "messageId"]))
}
