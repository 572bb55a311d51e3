//! Table modules - extend Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for a specific table group.

mod ai_settings;   // ai_agent_settings
mod blocklist;     // blocked_contacts
pub mod campaigns; // campaigns, campaign_audience, campaign_recipients
mod companies;     // companies
pub mod contacts;  // contacts
mod conversations; // conversations
mod instances;     // whatsapp_instances
pub mod messages;  // messages (+ transactional ingestion)
