//! Conversation database operations

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};

use crate::db::sqlite::{parse_optional_timestamp, parse_timestamp};
use crate::models::{Conversation, ConversationStatus};
use super::super::Database;

const CONVERSATION_COLUMNS: &str = "id, company_id, contact_id, instance_name, status, ai_enabled, assigned_to,
     unread_count, last_message, last_message_at, created_at, updated_at";

/// Longest preview stored in `last_message`
const PREVIEW_CHARS: usize = 200;

/// Create or touch the conversation of a contact on an open connection/transaction.
/// Incoming messages bump `unread_count` in SQL and reopen a closed conversation.
/// The preview only moves forward in time; a late, older message leaves it alone.
pub(crate) fn upsert_conversation_on(
    conn: &Connection,
    company_id: &str,
    contact_id: i64,
    instance_name: &str,
    preview: &str,
    message_at: &str,
    incoming: bool,
    now: &str,
) -> SqliteResult<i64> {
    let preview: String = preview.chars().take(PREVIEW_CHARS).collect();
    let unread_delta = if incoming { 1 } else { 0 };

    conn.execute(
        "INSERT INTO conversations (company_id, contact_id, instance_name, status, ai_enabled, unread_count,
             last_message, last_message_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'open', 1, ?4, ?5, ?6, ?7, ?7)
         ON CONFLICT(company_id, contact_id) DO UPDATE SET
             instance_name = excluded.instance_name,
             unread_count = conversations.unread_count + ?4,
             status = CASE WHEN ?4 > 0 AND conversations.status = 'closed' THEN 'open' ELSE conversations.status END,
             last_message = CASE
                 WHEN conversations.last_message_at IS NULL OR excluded.last_message_at >= conversations.last_message_at
                 THEN excluded.last_message ELSE conversations.last_message END,
             last_message_at = CASE
                 WHEN conversations.last_message_at IS NULL OR excluded.last_message_at >= conversations.last_message_at
                 THEN excluded.last_message_at ELSE conversations.last_message_at END,
             updated_at = excluded.updated_at",
        rusqlite::params![company_id, contact_id, instance_name, unread_delta, &preview, message_at, now],
    )?;

    conn.query_row(
        "SELECT id FROM conversations WHERE company_id = ?1 AND contact_id = ?2",
        rusqlite::params![company_id, contact_id],
        |row| row.get(0),
    )
}

impl Database {
    pub fn get_conversation(&self, id: i64) -> SqliteResult<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS),
            [id],
            Self::row_to_conversation,
        )
        .optional()
    }

    pub fn get_conversation_by_contact(&self, company_id: &str, contact_id: i64) -> SqliteResult<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {} FROM conversations WHERE company_id = ?1 AND contact_id = ?2",
                CONVERSATION_COLUMNS
            ),
            rusqlite::params![company_id, contact_id],
            Self::row_to_conversation,
        )
        .optional()
    }

    /// Inbox listing, most recent activity first
    pub fn list_conversations(
        &self,
        company_id: &str,
        status: Option<ConversationStatus>,
        limit: i64,
    ) -> SqliteResult<Vec<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM conversations
             WHERE company_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY COALESCE(last_message_at, created_at) DESC LIMIT ?3",
            CONVERSATION_COLUMNS
        ))?;
        let conversations = stmt
            .query_map(
                rusqlite::params![company_id, status.map(|s| s.as_str()), limit],
                Self::row_to_conversation,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(conversations)
    }

    pub fn mark_conversation_read(&self, id: i64) -> SqliteResult<Option<Conversation>> {
        self.update_conversation(id, "unread_count = 0", rusqlite::params![])
    }

    /// Hand the conversation over to a human: AI off, waiting for an agent
    pub fn handoff_conversation(&self, id: i64, assigned_to: Option<&str>) -> SqliteResult<Option<Conversation>> {
        self.update_conversation(
            id,
            "ai_enabled = 0, status = 'pending', assigned_to = COALESCE(?1, assigned_to)",
            rusqlite::params![assigned_to],
        )
    }

    /// Return the conversation to automated handling
    pub fn resume_ai_conversation(&self, id: i64) -> SqliteResult<Option<Conversation>> {
        self.update_conversation(
            id,
            "ai_enabled = 1, status = 'open', assigned_to = NULL",
            rusqlite::params![],
        )
    }

    pub fn close_conversation(&self, id: i64) -> SqliteResult<Option<Conversation>> {
        self.update_conversation(id, "status = 'closed', unread_count = 0", rusqlite::params![])
    }

    /// Provider-side unread counter (`chats.update`)
    pub fn set_unread_count_by_phone(&self, company_id: &str, phone: &str, unread: i64) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let rows_affected = conn.execute(
            "UPDATE conversations SET unread_count = ?1, updated_at = ?2
             WHERE company_id = ?3
               AND contact_id = (SELECT id FROM contacts WHERE company_id = ?3 AND phone = ?4)",
            rusqlite::params![unread.max(0), &now, company_id, phone],
        )?;
        Ok(rows_affected > 0)
    }

    /// Apply a SET clause to one conversation. Extra params are numbered from ?1;
    /// the id and timestamp are appended after them.
    fn update_conversation(
        &self,
        id: i64,
        set_clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> SqliteResult<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let n = params.len();
        let sql = format!(
            "UPDATE conversations SET {}, updated_at = ?{} WHERE id = ?{}",
            set_clause,
            n + 1,
            n + 2
        );
        let mut all: Vec<&dyn rusqlite::ToSql> = params.to_vec();
        all.push(&now);
        all.push(&id);
        let rows_affected = conn.execute(&sql, all.as_slice())?;
        drop(conn);

        if rows_affected == 0 {
            return Ok(None);
        }
        self.get_conversation(id)
    }

    fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
        let status: String = row.get(4)?;
        let created_at: String = row.get(10)?;
        let updated_at: String = row.get(11)?;
        Ok(Conversation {
            id: row.get(0)?,
            company_id: row.get(1)?,
            contact_id: row.get(2)?,
            instance_name: row.get(3)?,
            status: ConversationStatus::from_str(&status).unwrap_or_default(),
            ai_enabled: row.get::<_, i32>(5)? != 0,
            assigned_to: row.get(6)?,
            unread_count: row.get(7)?,
            last_message: row.get(8)?,
            last_message_at: parse_optional_timestamp(9, row.get(9)?)?,
            created_at: parse_timestamp(10, &created_at)?,
            updated_at: parse_timestamp(11, &updated_at)?,
        })
    }
}
