use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_DELAY_SECONDS: i64 = 1;
pub const DEFAULT_DELAY_SECONDS: i64 = 5;
pub const MAX_DELAY_SECONDS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Running,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Running => "running",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CampaignStatus::Draft),
            "running" => Some(CampaignStatus::Running),
            "completed" => Some(CampaignStatus::Completed),
            "cancelled" => Some(CampaignStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub company_id: String,
    pub name: String,
    pub message: String,
    pub status: CampaignStatus,
    /// Pause between two sends, honoured by the external sender
    pub delay_seconds: i64,
    pub total_recipients: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub message: String,
    pub delay_seconds: Option<i64>,
    /// Explicit audience; all tenant contacts when absent
    pub contact_ids: Option<Vec<i64>>,
}

impl CreateCampaignRequest {
    /// Form validation for the campaign wizard
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Campaign name is required".to_string());
        }
        if self.message.trim().is_empty() {
            return Err("Campaign message is required".to_string());
        }
        if let Some(delay) = self.delay_seconds {
            if !(MIN_DELAY_SECONDS..=MAX_DELAY_SECONDS).contains(&delay) {
                return Err(format!(
                    "delay_seconds must be between {} and {}",
                    MIN_DELAY_SECONDS, MAX_DELAY_SECONDS
                ));
            }
        }
        if matches!(&self.contact_ids, Some(ids) if ids.is_empty()) {
            return Err("contact_ids must not be empty when provided".to_string());
        }
        Ok(())
    }
}
