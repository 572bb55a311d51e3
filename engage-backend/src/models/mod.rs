pub mod ai_settings;
pub mod blocklist;
pub mod campaign;
pub mod company;
pub mod contact;
pub mod conversation;
pub mod instance;
pub mod message;

pub use ai_settings::{AiAgentSettings, AiAgentSettingsResponse, UpdateAiAgentSettingsRequest};
pub use blocklist::{BlockReason, BlockedContact};
pub use campaign::{Campaign, CampaignStatus, CreateCampaignRequest};
pub use company::{Company, CreateCompanyRequest};
pub use contact::Contact;
pub use conversation::{Conversation, ConversationStatus};
pub use instance::{ConnectionState, WhatsappInstance};
pub use message::{Message, MessageStatus, MessageType, NewMessage};
