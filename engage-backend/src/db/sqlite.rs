//! SQLite database - schema definitions and connection management
//!
//! This file contains:
//! - Database struct definition
//! - Connection management (new, init)
//! - Schema creation and migrations
//!
//! All table operations are in the tables/ subdirectory.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::Mutex;

/// Main database wrapper; a single connection serialises all writers
pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

impl Database {
    /// Create a new database connection and initialize schema
    pub fn new(database_url: &str) -> SqliteResult<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let conn = Connection::open(database_url)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // journal_mode answers with the resulting mode, so it has to be read back
        let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    /// Initialize all database tables and run migrations
    fn init(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        // Tenants
        conn.execute(
            "CREATE TABLE IF NOT EXISTS companies (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        // Provider instances (one per connected WhatsApp number)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS whatsapp_instances (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id TEXT NOT NULL,
                instance_name TEXT UNIQUE NOT NULL,
                connection_state TEXT NOT NULL DEFAULT 'close',
                qrcode TEXT,
                phone_number TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (company_id) REFERENCES companies(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id TEXT NOT NULL,
                phone TEXT NOT NULL,
                name TEXT,
                push_name TEXT,
                profile_picture_url TEXT,
                is_group INTEGER NOT NULL DEFAULT 0,
                presence TEXT,
                last_seen_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(company_id, phone),
                FOREIGN KEY (company_id) REFERENCES companies(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id TEXT NOT NULL,
                contact_id INTEGER NOT NULL,
                instance_name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                ai_enabled INTEGER NOT NULL DEFAULT 1,
                assigned_to TEXT,
                unread_count INTEGER NOT NULL DEFAULT 0,
                last_message TEXT,
                last_message_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(company_id, contact_id),
                FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_conversations_company ON conversations(company_id, last_message_at DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id TEXT NOT NULL,
                conversation_id INTEGER NOT NULL,
                contact_id INTEGER NOT NULL,
                external_id TEXT NOT NULL,
                from_me INTEGER NOT NULL DEFAULT 0,
                message_type TEXT NOT NULL DEFAULT 'text',
                content TEXT NOT NULL DEFAULT '',
                media_url TEXT,
                media_mime TEXT,
                file_name TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                is_deleted INTEGER NOT NULL DEFAULT 0,
                raw_payload TEXT,
                sent_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(company_id, external_id),
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, sent_at DESC)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_external ON messages(external_id)",
            [],
        )?;

        // AI agent configuration, one row per tenant
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ai_agent_settings (
                company_id TEXT PRIMARY KEY,
                enabled INTEGER NOT NULL DEFAULT 0,
                webhook_url TEXT,
                api_key TEXT,
                agent_name TEXT,
                system_prompt TEXT,
                temperature REAL NOT NULL DEFAULT 0.7,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (company_id) REFERENCES companies(id) ON DELETE CASCADE
            )",
            [],
        )?;

        // Opt-out blocklist
        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocked_contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id TEXT NOT NULL,
                phone TEXT NOT NULL,
                reason TEXT NOT NULL DEFAULT 'manual',
                created_at TEXT NOT NULL,
                UNIQUE(company_id, phone)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS campaigns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id TEXT NOT NULL,
                name TEXT NOT NULL,
                message TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft',
                delay_seconds INTEGER NOT NULL DEFAULT 5,
                total_recipients INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                started_at TEXT,
                audience_explicit INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (company_id) REFERENCES companies(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS campaign_recipients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL,
                contact_id INTEGER NOT NULL,
                phone TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued',
                created_at TEXT NOT NULL,
                UNIQUE(campaign_id, contact_id),
                FOREIGN KEY (campaign_id) REFERENCES campaigns(id) ON DELETE CASCADE
            )",
            [],
        )?;

        // Audience selection for draft campaigns
        conn.execute(
            "CREATE TABLE IF NOT EXISTS campaign_audience (
                campaign_id INTEGER NOT NULL,
                contact_id INTEGER NOT NULL,
                PRIMARY KEY (campaign_id, contact_id),
                FOREIGN KEY (campaign_id) REFERENCES campaigns(id) ON DELETE CASCADE
            )",
            [],
        )?;

        // Migration: presence tracking came after the first contacts schema
        let has_presence: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('contacts') WHERE name='presence'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|c| c > 0)
            .unwrap_or(false);

        if !has_presence {
            conn.execute("ALTER TABLE contacts ADD COLUMN presence TEXT", [])?;
            conn.execute("ALTER TABLE contacts ADD COLUMN last_seen_at TEXT", [])?;
        }

        // Migration: campaigns remember whether contact_ids were given, even if none survived
        let has_audience_flag: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('campaigns') WHERE name='audience_explicit'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|c| c > 0)
            .unwrap_or(false);

        if !has_audience_flag {
            conn.execute(
                "ALTER TABLE campaigns ADD COLUMN audience_explicit INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
        }

        Ok(())
    }
}

/// Parse an RFC 3339 column value, surfacing bad data as a conversion error
pub(crate) fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Nullable variant of [`parse_timestamp`]
pub(crate) fn parse_optional_timestamp(
    idx: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(idx, &v)).transpose()
}
