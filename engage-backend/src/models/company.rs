use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant. Every other table is scoped by `company_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCompanyRequest {
    /// Optional caller-chosen id; a UUID is generated when absent
    pub id: Option<String>,
    pub name: String,
}
