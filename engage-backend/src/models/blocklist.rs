use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// Contact sent an opt-out keyword
    OptOut,
    /// Added by an agent
    Manual,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::OptOut => "opt_out",
            BlockReason::Manual => "manual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "opt_out" => Some(BlockReason::OptOut),
            "manual" => Some(BlockReason::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedContact {
    pub id: i64,
    pub company_id: String,
    pub phone: String,
    pub reason: BlockReason,
    pub created_at: DateTime<Utc>,
}
