//! Inbound provider webhook: parsing, classification and ingestion of Evolution API events

pub mod automation;
pub mod content;
pub mod events;
pub mod jid;
pub mod media;
pub mod opt_out;
pub mod processor;
pub mod provider;

pub use events::WebhookEnvelope;
pub use processor::{WebhookError, WebhookProcessor};
