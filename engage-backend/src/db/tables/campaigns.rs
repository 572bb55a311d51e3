//! Campaign database operations

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult};

use crate::db::sqlite::{parse_optional_timestamp, parse_timestamp};
use crate::models::{Campaign, CampaignStatus, CreateCampaignRequest};
use crate::models::campaign::DEFAULT_DELAY_SECONDS;
use super::super::Database;

const CAMPAIGN_COLUMNS: &str = "id, company_id, name, message, status, delay_seconds, total_recipients,
     created_at, updated_at, started_at";

/// Result of trying to start a campaign
#[derive(Debug)]
pub enum StartCampaignOutcome {
    Started(Campaign),
    NotFound,
    /// Only drafts can be started
    InvalidStatus(CampaignStatus),
}

impl Database {
    /// Create a draft campaign. Audience ids that do not belong to the tenant are dropped,
    /// but the campaign stays scoped to its explicit audience even if none survive.
    pub fn create_campaign(&self, company_id: &str, request: &CreateCampaignRequest) -> SqliteResult<Campaign> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO campaigns (company_id, name, message, status, delay_seconds, audience_explicit,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            rusqlite::params![
                company_id,
                request.name.trim(),
                &request.message,
                CampaignStatus::Draft.as_str(),
                request.delay_seconds.unwrap_or(DEFAULT_DELAY_SECONDS),
                request.contact_ids.is_some() as i32,
                &now
            ],
        )?;
        let id = tx.last_insert_rowid();

        if let Some(contact_ids) = &request.contact_ids {
            for contact_id in contact_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO campaign_audience (campaign_id, contact_id)
                     SELECT ?1, id FROM contacts WHERE id = ?2 AND company_id = ?3",
                    rusqlite::params![id, contact_id, company_id],
                )?;
            }
        }
        tx.commit()?;
        drop(conn);

        self.get_campaign(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn get_campaign(&self, id: i64) -> SqliteResult<Option<Campaign>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM campaigns WHERE id = ?1", CAMPAIGN_COLUMNS),
            [id],
            Self::row_to_campaign,
        )
        .optional()
    }

    pub fn list_campaigns(&self, company_id: &str) -> SqliteResult<Vec<Campaign>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM campaigns WHERE company_id = ?1 ORDER BY created_at DESC, id DESC",
            CAMPAIGN_COLUMNS
        ))?;
        let campaigns = stmt
            .query_map([company_id], Self::row_to_campaign)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(campaigns)
    }

    /// Queue recipients and flip a draft to running. Without an explicit audience every
    /// non-group contact of the tenant is targeted. Blocklisted phones are skipped.
    pub fn start_campaign(&self, id: i64) -> SqliteResult<StartCampaignOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let row: Option<(String, String, bool)> = tx
            .query_row(
                "SELECT company_id, status, audience_explicit FROM campaigns WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get::<_, i32>(2)? != 0)),
            )
            .optional()?;
        let Some((company_id, status, audience_explicit)) = row else {
            return Ok(StartCampaignOutcome::NotFound);
        };

        // Claim the draft; a concurrent start sees zero rows and gets InvalidStatus
        let claimed = tx.execute(
            "UPDATE campaigns SET status = ?1, started_at = ?2, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            rusqlite::params![CampaignStatus::Running.as_str(), &now, id, CampaignStatus::Draft.as_str()],
        )?;
        if claimed == 0 {
            return Ok(StartCampaignOutcome::InvalidStatus(
                CampaignStatus::from_str(&status).unwrap_or_default(),
            ));
        }

        let audience_filter = if audience_explicit {
            "AND c.id IN (SELECT contact_id FROM campaign_audience WHERE campaign_id = ?1)"
        } else {
            ""
        };
        let queued = tx.execute(
            &format!(
                "INSERT OR IGNORE INTO campaign_recipients (campaign_id, contact_id, phone, status, created_at)
                 SELECT ?1, c.id, c.phone, 'queued', ?3 FROM contacts c
                 WHERE c.company_id = ?2 AND c.is_group = 0 {}
                   AND NOT EXISTS (
                       SELECT 1 FROM blocked_contacts b WHERE b.company_id = c.company_id AND b.phone = c.phone
                   )",
                audience_filter
            ),
            rusqlite::params![id, &company_id, &now],
        )?;

        tx.execute(
            "UPDATE campaigns SET total_recipients = ?1 WHERE id = ?2",
            rusqlite::params![queued as i64, id],
        )?;
        tx.commit()?;
        drop(conn);

        let campaign = self.get_campaign(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        Ok(StartCampaignOutcome::Started(campaign))
    }

    /// Phones queued for a started campaign
    pub fn list_campaign_recipients(&self, campaign_id: i64) -> SqliteResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT phone FROM campaign_recipients WHERE campaign_id = ?1 ORDER BY id",
        )?;
        let phones = stmt
            .query_map([campaign_id], |row| row.get(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(phones)
    }

    fn row_to_campaign(row: &rusqlite::Row) -> rusqlite::Result<Campaign> {
        let status: String = row.get(4)?;
        let created_at: String = row.get(7)?;
        let updated_at: String = row.get(8)?;
        Ok(Campaign {
            id: row.get(0)?,
            company_id: row.get(1)?,
            name: row.get(2)?,
            message: row.get(3)?,
            status: CampaignStatus::from_str(&status).unwrap_or_default(),
            delay_seconds: row.get(5)?,
            total_recipients: row.get(6)?,
            created_at: parse_timestamp(7, &created_at)?,
            updated_at: parse_timestamp(8, &updated_at)?,
            started_at: parse_optional_timestamp(9, row.get(9)?)?,
        })
    }
}
