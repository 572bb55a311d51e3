//! Message database operations, including the transactional ingestion used by
//! the webhook pipeline (contact + conversation + message in one commit).

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult};

use crate::db::sqlite::parse_timestamp;
use crate::models::{Message, MessageStatus, MessageType, NewMessage};
use super::contacts::{upsert_contact_on, ContactUpsert};
use super::conversations::upsert_conversation_on;
use super::super::Database;

const MESSAGE_COLUMNS: &str = "id, company_id, conversation_id, contact_id, external_id, from_me, message_type,
     content, media_url, media_mime, file_name, status, is_deleted, sent_at, created_at";

/// Ids produced by [`Database::ingest_message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestedMessage {
    pub contact_id: i64,
    pub conversation_id: i64,
    /// None when a concurrent delivery inserted the same external id first
    pub message_id: Option<i64>,
}

impl Database {
    /// Whether a message with this provider id was already stored for the tenant
    pub fn message_exists(&self, company_id: &str, external_id: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE company_id = ?1 AND external_id = ?2",
            rusqlite::params![company_id, external_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Upsert the contact, upsert its conversation and insert the message, atomically.
    /// A duplicate `external_id` is ignored (`message_id` is None).
    pub fn ingest_message(
        &self,
        company_id: &str,
        instance_name: &str,
        contact: &ContactUpsert,
        message: &NewMessage,
    ) -> SqliteResult<IngestedMessage> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let sent_at = message.sent_at.to_rfc3339();
        let incoming = !message.from_me;

        let contact_id = upsert_contact_on(&tx, company_id, contact, &now)?;
        let conversation_id = upsert_conversation_on(
            &tx,
            company_id,
            contact_id,
            instance_name,
            &preview_for(message),
            &sent_at,
            incoming,
            &now,
        )?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO messages (company_id, conversation_id, contact_id, external_id, from_me,
                 message_type, content, media_url, media_mime, file_name, status, raw_payload, sent_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            rusqlite::params![
                company_id,
                conversation_id,
                contact_id,
                &message.external_id,
                message.from_me as i32,
                message.message_type.as_ref(),
                &message.content,
                &message.media_url,
                &message.media_mime,
                &message.file_name,
                message.status.as_ref(),
                &message.raw_payload,
                &sent_at,
                &now,
            ],
        )?;

        if inserted == 0 {
            // Roll back the conversation bump made for a message we did not store
            tx.rollback()?;
            return Ok(IngestedMessage {
                contact_id,
                conversation_id,
                message_id: None,
            });
        }

        let message_id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(IngestedMessage {
            contact_id,
            conversation_id,
            message_id: Some(message_id),
        })
    }

    pub fn get_message(&self, id: i64) -> SqliteResult<Option<Message>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS),
            [id],
            Self::row_to_message,
        )
        .optional()
    }

    pub fn get_message_by_external_id(&self, company_id: &str, external_id: &str) -> SqliteResult<Option<Message>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {} FROM messages WHERE company_id = ?1 AND external_id = ?2",
                MESSAGE_COLUMNS
            ),
            rusqlite::params![company_id, external_id],
            Self::row_to_message,
        )
        .optional()
    }

    /// Page through a conversation, newest first. `before` is a message id cursor.
    pub fn list_messages(&self, conversation_id: i64, limit: i64, before: Option<i64>) -> SqliteResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages
             WHERE conversation_id = ?1 AND (?2 IS NULL OR id < ?2)
             ORDER BY sent_at DESC, id DESC LIMIT ?3",
            MESSAGE_COLUMNS
        ))?;
        let messages = stmt
            .query_map(rusqlite::params![conversation_id, before, limit], Self::row_to_message)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(messages)
    }

    /// Apply a delivery status. Never downgrades (a late DELIVERY_ACK after READ is a no-op).
    pub fn update_message_status(&self, company_id: &str, external_id: &str, status: MessageStatus) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM messages WHERE company_id = ?1 AND external_id = ?2",
                rusqlite::params![company_id, external_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(current) = current else {
            return Ok(false);
        };
        if MessageStatus::from_str_or_default(&current).rank() >= status.rank() {
            return Ok(false);
        }

        conn.execute(
            "UPDATE messages SET status = ?1 WHERE company_id = ?2 AND external_id = ?3",
            rusqlite::params![status.as_ref(), company_id, external_id],
        )?;
        Ok(true)
    }

    /// Soft delete (`messages.delete`); the row stays for the transcript
    pub fn mark_message_deleted(&self, company_id: &str, external_id: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows_affected = conn.execute(
            "UPDATE messages SET is_deleted = 1 WHERE company_id = ?1 AND external_id = ?2",
            rusqlite::params![company_id, external_id],
        )?;
        Ok(rows_affected > 0)
    }

    fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
        let message_type: String = row.get(6)?;
        let status: String = row.get(11)?;
        let sent_at: String = row.get(13)?;
        let created_at: String = row.get(14)?;
        Ok(Message {
            id: row.get(0)?,
            company_id: row.get(1)?,
            conversation_id: row.get(2)?,
            contact_id: row.get(3)?,
            external_id: row.get(4)?,
            from_me: row.get::<_, i32>(5)? != 0,
            message_type: MessageType::from_str_or_default(&message_type),
            content: row.get(7)?,
            media_url: row.get(8)?,
            media_mime: row.get(9)?,
            file_name: row.get(10)?,
            status: MessageStatus::from_str_or_default(&status),
            is_deleted: row.get::<_, i32>(12)? != 0,
            sent_at: parse_timestamp(13, &sent_at)?,
            created_at: parse_timestamp(14, &created_at)?,
        })
    }
}

/// Inbox preview line for a message
fn preview_for(message: &NewMessage) -> String {
    if !message.content.trim().is_empty() {
        return message.content.clone();
    }
    match message.message_type {
        MessageType::Text => String::new(),
        other => format!("[{}]", other.as_ref()),
    }
}
