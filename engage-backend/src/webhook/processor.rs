//! Event dispatch and the message ingestion pipeline

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use dashmap::DashMap;
use serde_json::Value;

use crate::db::{ContactUpsert, Database};
use crate::models::{BlockReason, ConnectionState, MessageStatus, MessageType, NewMessage, WhatsappInstance};
use super::automation::{AutomationEvent, AutomationForwarder};
use super::content::{self, ExtractedContent};
use super::events::{item_message_id, str_field, EventType, MessageData, WebhookEnvelope};
use super::jid::{phone_from_jid, resolve_sender, Sender};
use super::media::{MediaRehoster, MediaTarget};
use super::opt_out::{detect_opt_intent, OptIntent};
use super::provider::ProviderClient;

pub const MESSAGE_PROCESSED: &str = "Message processed";
pub const DUPLICATE_IGNORED: &str = "Duplicate message ignored";
pub const STATUS_BROADCAST_IGNORED: &str = "Status broadcast ignored";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Unknown instance: {0}")]
    UnknownInstance(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result of a handled event, reported back to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookOutcome {
    pub message: String,
}

impl WebhookOutcome {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Removes its key from the in-flight set when dropped
struct InFlightGuard<'a> {
    set: &'a DashMap<String, ()>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

pub struct WebhookProcessor {
    db: Arc<Database>,
    media: MediaRehoster,
    automation: AutomationForwarder,
    provider: Option<ProviderClient>,
    /// `<company_id>:<external_id>` of messages currently being ingested
    in_flight: DashMap<String, ()>,
}

impl WebhookProcessor {
    pub fn new(
        db: Arc<Database>,
        media: MediaRehoster,
        automation: AutomationForwarder,
        provider: Option<ProviderClient>,
    ) -> Self {
        Self {
            db,
            media,
            automation,
            provider,
            in_flight: DashMap::new(),
        }
    }

    pub async fn process(&self, envelope: &WebhookEnvelope) -> Result<WebhookOutcome, WebhookError> {
        let Some(event) = EventType::parse(&envelope.event) else {
            log::debug!("[WEBHOOK] Ignoring event {}", envelope.event);
            return Ok(WebhookOutcome::new(format!("Event {} ignored", envelope.event)));
        };

        log::info!("[WEBHOOK] {} instance={}", event.as_ref(), envelope.instance);

        if envelope.instance.trim().is_empty() {
            return Err(WebhookError::InvalidPayload("missing instance".to_string()));
        }
        let instance = self
            .db
            .get_instance_by_name(&envelope.instance)?
            .ok_or_else(|| WebhookError::UnknownInstance(envelope.instance.clone()))?;

        match event {
            EventType::QrcodeUpdated => self.handle_qrcode(&instance, &envelope.data),
            EventType::ConnectionUpdate => self.handle_connection(&instance, &envelope.data),
            EventType::MessagesUpdate => self.handle_status_updates(&instance, envelope),
            EventType::PresenceUpdate => self.handle_presence(&instance, envelope),
            EventType::ChatsUpdate => self.handle_chats(&instance, envelope),
            EventType::MessagesDelete => self.handle_deletes(&instance, envelope),
            EventType::ContactsUpdate => self.handle_contacts(&instance, envelope),
            EventType::GroupsUpsert => self.handle_groups(&instance, envelope),
            EventType::MessagesUpsert => self.handle_messages(&instance, envelope, false).await,
            EventType::SendMessage => self.handle_messages(&instance, envelope, true).await,
        }
    }

    fn handle_qrcode(&self, instance: &WhatsappInstance, data: &Value) -> Result<WebhookOutcome, WebhookError> {
        let qrcode = data
            .get("qrcode")
            .and_then(|q| str_field(q, &["base64", "code"]))
            .ok_or_else(|| WebhookError::InvalidPayload("missing qrcode".to_string()))?;

        self.db.update_instance_qrcode(&instance.instance_name, qrcode)?;
        Ok(WebhookOutcome::new("QR code updated"))
    }

    fn handle_connection(&self, instance: &WhatsappInstance, data: &Value) -> Result<WebhookOutcome, WebhookError> {
        let raw_state = str_field(data, &["state", "status"])
            .ok_or_else(|| WebhookError::InvalidPayload("missing connection state".to_string()))?;
        let state = ConnectionState::from_str(raw_state)
            .ok_or_else(|| WebhookError::InvalidPayload(format!("unknown connection state '{}'", raw_state)))?;
        let phone = str_field(data, &["wuid"]).and_then(phone_from_jid);

        self.db
            .update_instance_connection(&instance.instance_name, state, phone.as_deref())?;
        log::info!(
            "[WEBHOOK] Instance {} is now {}",
            instance.instance_name,
            state.as_str()
        );
        Ok(WebhookOutcome::new("Connection state updated"))
    }

    fn handle_status_updates(
        &self,
        instance: &WhatsappInstance,
        envelope: &WebhookEnvelope,
    ) -> Result<WebhookOutcome, WebhookError> {
        let mut updated = 0;
        for item in envelope.items() {
            let Some(external_id) = item_message_id(item) else {
                continue;
            };
            let Some(status) = str_field(item, &["status"]).and_then(MessageStatus::from_provider_ack) else {
                continue;
            };
            if self.db.update_message_status(&instance.company_id, external_id, status)? {
                updated += 1;
            }
        }
        Ok(WebhookOutcome::new(format!("Updated {} message status(es)", updated)))
    }

    fn handle_presence(
        &self,
        instance: &WhatsappInstance,
        envelope: &WebhookEnvelope,
    ) -> Result<WebhookOutcome, WebhookError> {
        let mut updated = 0;
        for item in envelope.items() {
            // `presences` is keyed by JID: { "<jid>": { "lastKnownPresence": "composing" } }
            let Some(presences) = item.get("presences").and_then(Value::as_object) else {
                continue;
            };
            for (jid, presence) in presences {
                let Some(phone) = phone_from_jid(jid) else {
                    continue;
                };
                let Some(state) = str_field(presence, &["lastKnownPresence", "presence"]) else {
                    continue;
                };
                let seen_at = presence
                    .get("lastSeen")
                    .and_then(Value::as_i64)
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                    .unwrap_or_else(Utc::now);
                if self
                    .db
                    .update_contact_presence(&instance.company_id, &phone, state, seen_at)?
                {
                    updated += 1;
                }
            }
        }
        Ok(WebhookOutcome::new(format!("Updated presence of {} contact(s)", updated)))
    }

    fn handle_chats(&self, instance: &WhatsappInstance, envelope: &WebhookEnvelope) -> Result<WebhookOutcome, WebhookError> {
        let mut updated = 0;
        for item in envelope.items() {
            let Some(phone) = str_field(item, &["remoteJid", "id"]).and_then(phone_from_jid) else {
                continue;
            };
            let Some(unread) = item.get("unreadMessages").and_then(Value::as_i64) else {
                continue;
            };
            if self
                .db
                .set_unread_count_by_phone(&instance.company_id, &phone, unread)?
            {
                updated += 1;
            }
        }
        Ok(WebhookOutcome::new(format!("Updated {} chat(s)", updated)))
    }

    fn handle_deletes(&self, instance: &WhatsappInstance, envelope: &WebhookEnvelope) -> Result<WebhookOutcome, WebhookError> {
        let mut deleted = 0;
        for item in envelope.items() {
            let Some(external_id) = item_message_id(item) else {
                continue;
            };
            if self.db.mark_message_deleted(&instance.company_id, external_id)? {
                deleted += 1;
            }
        }
        Ok(WebhookOutcome::new(format!("Deleted {} message(s)", deleted)))
    }

    fn handle_contacts(&self, instance: &WhatsappInstance, envelope: &WebhookEnvelope) -> Result<WebhookOutcome, WebhookError> {
        let mut updated = 0;
        for item in envelope.items() {
            let Some(phone) = str_field(item, &["remoteJid", "id"]).and_then(phone_from_jid) else {
                continue;
            };
            if self.db.update_contact_profile(
                &instance.company_id,
                &phone,
                str_field(item, &["pushName"]),
                str_field(item, &["profilePicUrl", "profilePictureUrl"]),
            )? {
                updated += 1;
            }
        }
        Ok(WebhookOutcome::new(format!("Updated {} contact(s)", updated)))
    }

    fn handle_groups(&self, instance: &WhatsappInstance, envelope: &WebhookEnvelope) -> Result<WebhookOutcome, WebhookError> {
        let mut upserted = 0;
        for item in envelope.items() {
            let Some(Sender::Group { group_id }) = str_field(item, &["id"]).and_then(|id| resolve_sender(Some(id), None)) else {
                continue;
            };
            self.db.upsert_contact(
                &instance.company_id,
                &ContactUpsert {
                    phone: group_id,
                    push_name: str_field(item, &["subject"]).map(str::to_string),
                    profile_picture_url: str_field(item, &["pictureUrl"]).map(str::to_string),
                    is_group: true,
                },
            )?;
            upserted += 1;
        }
        Ok(WebhookOutcome::new(format!("Upserted {} group(s)", upserted)))
    }

    async fn handle_messages(
        &self,
        instance: &WhatsappInstance,
        envelope: &WebhookEnvelope,
        outbound: bool,
    ) -> Result<WebhookOutcome, WebhookError> {
        let items = envelope.items();
        if items.is_empty() {
            return Err(WebhookError::InvalidPayload("missing message data".to_string()));
        }

        let mut first_outcome = None;
        let mut any_processed = false;
        for item in items {
            let outcome = self.ingest_one(instance, item, outbound).await?;
            any_processed |= outcome == MESSAGE_PROCESSED;
            first_outcome.get_or_insert(outcome);
        }

        let message = if any_processed {
            MESSAGE_PROCESSED
        } else {
            first_outcome.unwrap_or(MESSAGE_PROCESSED)
        };
        Ok(WebhookOutcome::new(message))
    }

    async fn ingest_one(
        &self,
        instance: &WhatsappInstance,
        item: &Value,
        outbound: bool,
    ) -> Result<&'static str, WebhookError> {
        let data: MessageData = serde_json::from_value(item.clone())
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
        let company_id = instance.company_id.as_str();
        let from_me = outbound || data.key.from_me;
        let incoming = !from_me;

        let sender = resolve_sender(data.key.remote_jid.as_deref(), data.key.remote_jid_alt.as_deref())
            .ok_or_else(|| WebhookError::InvalidPayload("no usable remoteJid".to_string()))?;
        let phone = match sender.contact_key() {
            Some(phone) => phone.to_string(),
            None => return Ok(STATUS_BROADCAST_IGNORED),
        };

        let external_id = data
            .key
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| WebhookError::InvalidPayload("missing key.id".to_string()))?
            .to_string();

        if self.db.message_exists(company_id, &external_id)? {
            return Ok(DUPLICATE_IGNORED);
        }
        let in_flight_key = format!("{}:{}", company_id, external_id);
        if self.in_flight.insert(in_flight_key.clone(), ()).is_some() {
            return Ok(DUPLICATE_IGNORED);
        }
        let _guard = InFlightGuard {
            set: &self.in_flight,
            key: in_flight_key,
        };

        let extracted = content::extract(data.message_type.as_deref(), &data.message);
        let media_url = self
            .rehost_media(company_id, &phone, &external_id, &extracted)
            .await;

        let is_new_contact = self.db.get_contact_by_phone(company_id, &phone)?.is_none();
        let profile_picture_url = if incoming && is_new_contact && !sender.is_group() {
            self.fetch_profile_picture(&instance.instance_name, &phone).await
        } else {
            None
        };

        let contact = ContactUpsert {
            phone: phone.clone(),
            // In groups pushName belongs to the participant, not the chat
            push_name: if incoming && !sender.is_group() {
                data.push_name.clone()
            } else {
                None
            },
            profile_picture_url,
            is_group: sender.is_group(),
        };

        let sent_at = data
            .timestamp_secs()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);
        let media = extracted.media.as_ref();
        let message = NewMessage {
            external_id: external_id.clone(),
            from_me,
            message_type: extracted.message_type,
            content: extracted.content.clone(),
            media_url,
            media_mime: media.and_then(|m| m.mimetype.clone()),
            file_name: media.and_then(|m| m.file_name.clone()),
            status: if incoming { MessageStatus::Delivered } else { MessageStatus::Sent },
            raw_payload: item.to_string(),
            sent_at,
        };

        let ingested = self
            .db
            .ingest_message(company_id, &instance.instance_name, &contact, &message)?;
        let Some(message_id) = ingested.message_id else {
            return Ok(DUPLICATE_IGNORED);
        };

        if !incoming {
            return Ok(MESSAGE_PROCESSED);
        }

        if let Sender::Contact { phone } = &sender {
            if message.message_type == MessageType::Text {
                self.apply_opt_intent(company_id, phone, &message.content)?;
            }
        }

        self.forward_to_automation(instance, &phone, ingested.contact_id, ingested.conversation_id, message_id, &message)
            .await?;

        Ok(MESSAGE_PROCESSED)
    }

    async fn rehost_media(
        &self,
        company_id: &str,
        phone: &str,
        external_id: &str,
        extracted: &ExtractedContent,
    ) -> Option<String> {
        if !extracted.message_type.is_media() {
            return None;
        }
        let media = extracted.media.as_ref()?;
        let target = MediaTarget {
            company_id,
            phone,
            external_id,
            message_type: extracted.message_type,
        };
        self.media.rehost(media, &target).await
    }

    async fn fetch_profile_picture(&self, instance_name: &str, phone: &str) -> Option<String> {
        let provider = self.provider.as_ref()?;
        match provider.fetch_profile_picture(instance_name, phone).await {
            Ok(url) => url,
            Err(e) => {
                log::warn!("[PROVIDER] Profile picture lookup failed for {}: {}", phone, e);
                None
            }
        }
    }

    fn apply_opt_intent(&self, company_id: &str, phone: &str, text: &str) -> Result<(), WebhookError> {
        match detect_opt_intent(text) {
            Some(OptIntent::OptOut) => {
                if self.db.block_phone(company_id, phone, BlockReason::OptOut)? {
                    log::info!("[WEBHOOK] {} opted out (company {})", phone, company_id);
                }
            }
            Some(OptIntent::OptIn) => {
                if self.db.unblock_phone(company_id, phone)? {
                    log::info!("[WEBHOOK] {} opted back in (company {})", phone, company_id);
                }
            }
            None => {}
        }
        Ok(())
    }

    async fn forward_to_automation(
        &self,
        instance: &WhatsappInstance,
        phone: &str,
        contact_id: i64,
        conversation_id: i64,
        message_id: i64,
        message: &NewMessage,
    ) -> Result<(), WebhookError> {
        let company_id = instance.company_id.as_str();
        let settings = self.db.get_ai_settings(company_id)?;
        let Some(url) = settings.forwarding_target() else {
            return Ok(());
        };

        let ai_enabled = self
            .db
            .get_conversation(conversation_id)?
            .is_some_and(|c| c.ai_enabled);
        if !ai_enabled || self.db.is_phone_blocked(company_id, phone)? {
            log::debug!("[AUTOMATION] Skipping conversation {} (handed off or blocked)", conversation_id);
            return Ok(());
        }

        let contact_name = self
            .db
            .get_contact(company_id, contact_id)?
            .map(|c| c.display_name().to_string())
            .unwrap_or_else(|| phone.to_string());

        let event = AutomationEvent {
            event: AutomationEvent::MESSAGE_RECEIVED,
            company_id: company_id.to_string(),
            instance: instance.instance_name.clone(),
            conversation_id,
            contact_id,
            message_id,
            external_id: message.external_id.clone(),
            phone: phone.to_string(),
            contact_name,
            message_type: message.message_type,
            content: message.content.clone(),
            media_url: message.media_url.clone(),
            timestamp: message.sent_at,
        };

        if let Err(e) = self
            .automation
            .forward(url, settings.api_key.as_deref(), &event)
            .await
        {
            log::warn!("[AUTOMATION] Forwarding to {} failed: {}", url, e);
        }
        Ok(())
    }
}
