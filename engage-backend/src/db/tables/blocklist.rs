//! Opt-out blocklist database operations

use chrono::Utc;
use rusqlite::Result as SqliteResult;

use crate::db::sqlite::parse_timestamp;
use crate::models::{BlockReason, BlockedContact};
use super::super::Database;

impl Database {
    /// Add a phone to the tenant's blocklist. Returns false if it was already there.
    pub fn block_phone(&self, company_id: &str, phone: &str, reason: BlockReason) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO blocked_contacts (company_id, phone, reason, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![company_id, phone, reason.as_str(), &now],
        )?;
        Ok(inserted > 0)
    }

    /// Remove a phone from the blocklist. Returns false if it was not blocked.
    pub fn unblock_phone(&self, company_id: &str, phone: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows_affected = conn.execute(
            "DELETE FROM blocked_contacts WHERE company_id = ?1 AND phone = ?2",
            rusqlite::params![company_id, phone],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn is_phone_blocked(&self, company_id: &str, phone: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM blocked_contacts WHERE company_id = ?1 AND phone = ?2",
            rusqlite::params![company_id, phone],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list_blocked(&self, company_id: &str) -> SqliteResult<Vec<BlockedContact>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, company_id, phone, reason, created_at FROM blocked_contacts
             WHERE company_id = ?1 ORDER BY created_at DESC",
        )?;
        let blocked = stmt
            .query_map([company_id], |row| {
                let reason: String = row.get(3)?;
                let created_at: String = row.get(4)?;
                Ok(BlockedContact {
                    id: row.get(0)?,
                    company_id: row.get(1)?,
                    phone: row.get(2)?,
                    reason: BlockReason::from_str(&reason).unwrap_or(BlockReason::Manual),
                    created_at: parse_timestamp(4, &created_at)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(blocked)
    }
}
