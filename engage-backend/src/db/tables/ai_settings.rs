//! AI agent settings database operations

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult};

use crate::db::sqlite::parse_timestamp;
use crate::models::{AiAgentSettings, UpdateAiAgentSettingsRequest};
use super::super::Database;

impl Database {
    /// Settings for a tenant; a disabled default when none were saved
    pub fn get_ai_settings(&self, company_id: &str) -> SqliteResult<AiAgentSettings> {
        let conn = self.conn.lock().unwrap();
        let settings = conn
            .query_row(
                "SELECT company_id, enabled, webhook_url, api_key, agent_name, system_prompt, temperature,
                 created_at, updated_at FROM ai_agent_settings WHERE company_id = ?1",
                [company_id],
                |row| {
                    let created_at: String = row.get(7)?;
                    let updated_at: String = row.get(8)?;
                    Ok(AiAgentSettings {
                        company_id: row.get(0)?,
                        enabled: row.get::<_, i32>(1)? != 0,
                        webhook_url: row.get(2)?,
                        api_key: row.get(3)?,
                        agent_name: row.get(4)?,
                        system_prompt: row.get(5)?,
                        temperature: row.get(6)?,
                        created_at: parse_timestamp(7, &created_at)?,
                        updated_at: parse_timestamp(8, &updated_at)?,
                    })
                },
            )
            .optional()?;

        Ok(settings.unwrap_or_else(|| AiAgentSettings::disabled(company_id)))
    }

    /// Merge a partial update into the stored settings. An empty string clears
    /// `webhook_url`, `api_key`, `agent_name` or `system_prompt`.
    pub fn update_ai_settings(
        &self,
        company_id: &str,
        update: &UpdateAiAgentSettingsRequest,
    ) -> SqliteResult<AiAgentSettings> {
        let current = self.get_ai_settings(company_id)?;
        let merge = |new: &Option<String>, old: Option<String>| match new {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(v.trim().to_string()),
            None => old,
        };

        let enabled = update.enabled.unwrap_or(current.enabled);
        let webhook_url = merge(&update.webhook_url, current.webhook_url);
        let api_key = merge(&update.api_key, current.api_key);
        let agent_name = merge(&update.agent_name, current.agent_name);
        let system_prompt = merge(&update.system_prompt, current.system_prompt);
        let temperature = update.temperature.unwrap_or(current.temperature);

        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO ai_agent_settings (company_id, enabled, webhook_url, api_key, agent_name, system_prompt,
                 temperature, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(company_id) DO UPDATE SET
                 enabled = excluded.enabled,
                 webhook_url = excluded.webhook_url,
                 api_key = excluded.api_key,
                 agent_name = excluded.agent_name,
                 system_prompt = excluded.system_prompt,
                 temperature = excluded.temperature,
                 updated_at = excluded.updated_at",
            rusqlite::params![
                company_id,
                enabled as i32,
                webhook_url,
                api_key,
                agent_name,
                system_prompt,
                temperature,
                &now
            ],
        )?;
        drop(conn);

        self.get_ai_settings(company_id)
    }
}
