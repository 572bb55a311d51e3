use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub company_id: String,
    /// Digits only; for groups this is the group id
    pub phone: String,
    /// Name set by an agent in the CRM
    pub name: Option<String>,
    /// Name the contact set on WhatsApp
    pub push_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub is_group: bool,
    pub presence: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Best name to show for the contact
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.push_name.as_deref())
            .unwrap_or(&self.phone)
    }
}
