//! Company (tenant) database operations

use chrono::Utc;
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use crate::db::sqlite::parse_timestamp;
use crate::models::Company;
use super::super::Database;

impl Database {
    /// Create a tenant. A UUID is generated when no id is given.
    pub fn create_company(&self, id: Option<&str>, name: &str) -> SqliteResult<Company> {
        let id = id
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO companies (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            rusqlite::params![&id, name, &now],
        )?;
        drop(conn);

        self.get_company(&id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn get_company(&self, id: &str) -> SqliteResult<Option<Company>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, updated_at FROM companies WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map([id], Self::row_to_company)?;
        rows.next().transpose()
    }

    pub fn list_companies(&self) -> SqliteResult<Vec<Company>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, updated_at FROM companies ORDER BY name",
        )?;
        let companies = stmt
            .query_map([], Self::row_to_company)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(companies)
    }

    fn row_to_company(row: &rusqlite::Row) -> rusqlite::Result<Company> {
        let created_at: String = row.get(2)?;
        let updated_at: String = row.get(3)?;
        Ok(Company {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: parse_timestamp(2, &created_at)?,
            updated_at: parse_timestamp(3, &updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::db::sqlite::test_support::temp_db;

    #[test]
    fn test_create_and_list_companies() {
        let (_dir, db) = temp_db();
        let generated = db.create_company(None, "Zeta").unwrap();
        assert_eq!(generated.id.len(), 36);
        db.create_company(Some("acme"), "Acme").unwrap();

        let names: Vec<String> = db.list_companies().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Acme", "Zeta"]);
        assert!(db.get_company("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_company_id_rejected() {
        let (_dir, db) = temp_db();
        db.create_company(Some("acme"), "Acme").unwrap();
        assert!(db.create_company(Some("acme"), "Other").is_err());
    }
}
