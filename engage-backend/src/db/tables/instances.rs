//! Provider instance database operations

use chrono::Utc;
use rusqlite::Result as SqliteResult;

use crate::db::sqlite::parse_timestamp;
use crate::models::{ConnectionState, WhatsappInstance};
use super::super::Database;

const INSTANCE_COLUMNS: &str =
    "id, company_id, instance_name, connection_state, qrcode, phone_number, created_at, updated_at";

impl Database {
    /// Attach a provider instance name to a tenant
    pub fn register_instance(&self, company_id: &str, instance_name: &str) -> SqliteResult<WhatsappInstance> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO whatsapp_instances (company_id, instance_name, connection_state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            rusqlite::params![company_id, instance_name, ConnectionState::default().as_str(), &now],
        )?;
        drop(conn);

        self.get_instance_by_name(instance_name)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn get_instance_by_name(&self, instance_name: &str) -> SqliteResult<Option<WhatsappInstance>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM whatsapp_instances WHERE instance_name = ?1",
            INSTANCE_COLUMNS
        ))?;
        let mut rows = stmt.query_map([instance_name], Self::row_to_instance)?;
        rows.next().transpose()
    }

    pub fn list_instances(&self, company_id: &str) -> SqliteResult<Vec<WhatsappInstance>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM whatsapp_instances WHERE company_id = ?1 ORDER BY instance_name",
            INSTANCE_COLUMNS
        ))?;
        let instances = stmt
            .query_map([company_id], Self::row_to_instance)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(instances)
    }

    pub fn delete_instance(&self, instance_name: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows_affected = conn.execute(
            "DELETE FROM whatsapp_instances WHERE instance_name = ?1",
            [instance_name],
        )?;
        Ok(rows_affected > 0)
    }

    /// Store a fresh QR code; the instance is waiting to be paired
    pub fn update_instance_qrcode(&self, instance_name: &str, qrcode: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let rows_affected = conn.execute(
            "UPDATE whatsapp_instances SET qrcode = ?1, connection_state = ?2, updated_at = ?3 WHERE instance_name = ?4",
            rusqlite::params![qrcode, ConnectionState::Qrcode.as_str(), &now, instance_name],
        )?;
        Ok(rows_affected > 0)
    }

    /// Record a connection state change. Opening clears the QR code.
    pub fn update_instance_connection(
        &self,
        instance_name: &str,
        state: ConnectionState,
        phone_number: Option<&str>,
    ) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let rows_affected = conn.execute(
            "UPDATE whatsapp_instances
             SET connection_state = ?1,
                 qrcode = CASE WHEN ?1 = 'open' THEN NULL ELSE qrcode END,
                 phone_number = COALESCE(?2, phone_number),
                 updated_at = ?3
             WHERE instance_name = ?4",
            rusqlite::params![state.as_str(), phone_number, &now, instance_name],
        )?;
        Ok(rows_affected > 0)
    }

    fn row_to_instance(row: &rusqlite::Row) -> rusqlite::Result<WhatsappInstance> {
        let state: String = row.get(3)?;
        let created_at: String = row.get(6)?;
        let updated_at: String = row.get(7)?;
        Ok(WhatsappInstance {
            id: row.get(0)?,
            company_id: row.get(1)?,
            instance_name: row.get(2)?,
            connection_state: ConnectionState::from_str(&state).unwrap_or_default(),
            qrcode: row.get(4)?,
            phone_number: row.get(5)?,
            created_at: parse_timestamp(6, &created_at)?,
            updated_at: parse_timestamp(7, &updated_at)?,
        })
    }
}
