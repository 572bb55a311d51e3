//! Contact database operations

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};

use crate::db::sqlite::{parse_optional_timestamp, parse_timestamp};
use crate::models::Contact;
use super::super::Database;

const CONTACT_COLUMNS: &str = "id, company_id, phone, name, push_name, profile_picture_url, is_group,
     presence, last_seen_at, created_at, updated_at";

/// Contact fields learned from a webhook event
#[derive(Debug, Clone, Default)]
pub struct ContactUpsert {
    pub phone: String,
    pub push_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub is_group: bool,
}

/// Insert or refresh a contact on an open connection/transaction; returns its id.
/// An existing agent-set `name` is never touched; `push_name` and the picture are
/// only overwritten by non-empty values.
pub(crate) fn upsert_contact_on(
    conn: &Connection,
    company_id: &str,
    contact: &ContactUpsert,
    now: &str,
) -> SqliteResult<i64> {
    let push_name = contact.push_name.as_deref().filter(|n| !n.trim().is_empty());
    let picture = contact.profile_picture_url.as_deref().filter(|p| !p.is_empty());

    conn.execute(
        "INSERT INTO contacts (company_id, phone, push_name, profile_picture_url, is_group, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(company_id, phone) DO UPDATE SET
             push_name = COALESCE(excluded.push_name, contacts.push_name),
             profile_picture_url = COALESCE(excluded.profile_picture_url, contacts.profile_picture_url),
             is_group = MAX(contacts.is_group, excluded.is_group),
             updated_at = excluded.updated_at",
        rusqlite::params![company_id, &contact.phone, push_name, picture, contact.is_group as i32, now],
    )?;

    conn.query_row(
        "SELECT id FROM contacts WHERE company_id = ?1 AND phone = ?2",
        rusqlite::params![company_id, &contact.phone],
        |row| row.get(0),
    )
}

impl Database {
    pub fn upsert_contact(&self, company_id: &str, contact: &ContactUpsert) -> SqliteResult<Contact> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let id = upsert_contact_on(&conn, company_id, contact, &now)?;
        drop(conn);
        self.get_contact(company_id, id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn get_contact(&self, company_id: &str, id: i64) -> SqliteResult<Option<Contact>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM contacts WHERE company_id = ?1 AND id = ?2", CONTACT_COLUMNS),
            rusqlite::params![company_id, id],
            Self::row_to_contact,
        )
        .optional()
    }

    pub fn get_contact_by_phone(&self, company_id: &str, phone: &str) -> SqliteResult<Option<Contact>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM contacts WHERE company_id = ?1 AND phone = ?2", CONTACT_COLUMNS),
            rusqlite::params![company_id, phone],
            Self::row_to_contact,
        )
        .optional()
    }

    /// List contacts, optionally filtered by a name/phone substring
    pub fn list_contacts(&self, company_id: &str, search: Option<&str>, limit: i64) -> SqliteResult<Vec<Contact>> {
        let conn = self.conn.lock().unwrap();
        let pattern = search
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM contacts
             WHERE company_id = ?1
               AND (?2 IS NULL OR phone LIKE ?2 OR name LIKE ?2 OR push_name LIKE ?2)
             ORDER BY updated_at DESC LIMIT ?3",
            CONTACT_COLUMNS
        ))?;
        let contacts = stmt
            .query_map(rusqlite::params![company_id, pattern, limit], Self::row_to_contact)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(contacts)
    }

    /// Set the agent-facing name of a contact
    pub fn update_contact_name(&self, company_id: &str, id: i64, name: Option<&str>) -> SqliteResult<Option<Contact>> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let rows_affected = conn.execute(
            "UPDATE contacts SET name = ?1, updated_at = ?2 WHERE company_id = ?3 AND id = ?4",
            rusqlite::params![name, &now, company_id, id],
        )?;
        drop(conn);
        if rows_affected == 0 {
            return Ok(None);
        }
        self.get_contact(company_id, id)
    }

    /// Refresh provider-side profile data of an existing contact (`contacts.update`)
    pub fn update_contact_profile(
        &self,
        company_id: &str,
        phone: &str,
        push_name: Option<&str>,
        profile_picture_url: Option<&str>,
    ) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let rows_affected = conn.execute(
            "UPDATE contacts
             SET push_name = COALESCE(?1, push_name),
                 profile_picture_url = COALESCE(?2, profile_picture_url),
                 updated_at = ?3
             WHERE company_id = ?4 AND phone = ?5",
            rusqlite::params![
                push_name.filter(|n| !n.is_empty()),
                profile_picture_url.filter(|p| !p.is_empty()),
                &now,
                company_id,
                phone
            ],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn update_contact_presence(
        &self,
        company_id: &str,
        phone: &str,
        presence: &str,
        seen_at: DateTime<Utc>,
    ) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows_affected = conn.execute(
            "UPDATE contacts SET presence = ?1, last_seen_at = ?2 WHERE company_id = ?3 AND phone = ?4",
            rusqlite::params![presence, seen_at.to_rfc3339(), company_id, phone],
        )?;
        Ok(rows_affected > 0)
    }

    fn row_to_contact(row: &rusqlite::Row) -> rusqlite::Result<Contact> {
        let created_at: String = row.get(9)?;
        let updated_at: String = row.get(10)?;
        Ok(Contact {
            id: row.get(0)?,
            company_id: row.get(1)?,
            phone: row.get(2)?,
            name: row.get(3)?,
            push_name: row.get(4)?,
            profile_picture_url: row.get(5)?,
            is_group: row.get::<_, i32>(6)? != 0,
            presence: row.get(7)?,
            last_seen_at: parse_optional_timestamp(8, row.get(8)?)?,
            created_at: parse_timestamp(9, &created_at)?,
            updated_at: parse_timestamp(10, &updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::test_support::seeded_db;

    fn upsert(phone: &str, push_name: Option<&str>) -> ContactUpsert {
        ContactUpsert {
            phone: phone.to_string(),
            push_name: push_name.map(|s| s.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_keeps_agent_name_and_refreshes_push_name() {
        let (_dir, db) = seeded_db();
        let contact = db.upsert_contact("acme", &upsert("5511988887777", Some("Ana"))).unwrap();
        db.update_contact_name("acme", contact.id, Some("Ana Souza (VIP)")).unwrap();

        let again = db.upsert_contact("acme", &upsert("5511988887777", Some("Ana S."))).unwrap();
        assert_eq!(again.id, contact.id);
        assert_eq!(again.name.as_deref(), Some("Ana Souza (VIP)"));
        assert_eq!(again.push_name.as_deref(), Some("Ana S."));
        assert_eq!(again.display_name(), "Ana Souza (VIP)");

        // Empty push name does not erase the known one
        let again = db.upsert_contact("acme", &upsert("5511988887777", Some(""))).unwrap();
        assert_eq!(again.push_name.as_deref(), Some("Ana S."));
    }

    #[test]
    fn test_contacts_are_tenant_scoped() {
        let (_dir, db) = seeded_db();
        db.create_company(Some("other"), "Other").unwrap();
        let a = db.upsert_contact("acme", &upsert("5511900000001", None)).unwrap();
        let b = db.upsert_contact("other", &upsert("5511900000001", None)).unwrap();
        assert_ne!(a.id, b.id);
        assert!(db.get_contact("other", a.id).unwrap().is_none());
    }

    #[test]
    fn test_search_contacts() {
        let (_dir, db) = seeded_db();
        db.upsert_contact("acme", &upsert("5511900000001", Some("Bruno"))).unwrap();
        db.upsert_contact("acme", &upsert("5521900000002", Some("Carla"))).unwrap();

        assert_eq!(db.list_contacts("acme", None, 50).unwrap().len(), 2);
        let found = db.list_contacts("acme", Some("carl"), 50).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].phone, "5521900000002");
        assert_eq!(db.list_contacts("acme", Some("5511"), 50).unwrap().len(), 1);
    }

    #[test]
    fn test_profile_and_presence_updates() {
        let (_dir, db) = seeded_db();
        db.upsert_contact("acme", &upsert("5511900000001", Some("Bruno"))).unwrap();

        assert!(db
            .update_contact_profile("acme", "5511900000001", None, Some("https://pps.whatsapp.net/p.jpg"))
            .unwrap());
        assert!(!db.update_contact_profile("acme", "0000", Some("x"), None).unwrap());

        assert!(db.update_contact_presence("acme", "5511900000001", "composing", Utc::now()).unwrap());
        let contact = db.get_contact_by_phone("acme", "5511900000001").unwrap().unwrap();
        assert_eq!(contact.push_name.as_deref(), Some("Bruno"));
        assert_eq!(contact.profile_picture_url.as_deref(), Some("https://pps.whatsapp.net/p.jpg"));
        assert_eq!(contact.presence.as_deref(), Some("composing"));
        assert!(contact.last_seen_at.is_some());
    }
}
