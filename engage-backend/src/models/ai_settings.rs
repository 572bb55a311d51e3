use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Per-tenant AI agent configuration. When enabled, incoming messages are
/// forwarded to `webhook_url` on the external automation platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAgentSettings {
    pub company_id: String,
    pub enabled: bool,
    pub webhook_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub agent_name: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AiAgentSettings {
    pub fn disabled(company_id: &str) -> Self {
        Self {
            company_id: company_id.to_string(),
            enabled: false,
            webhook_url: None,
            api_key: None,
            agent_name: None,
            system_prompt: None,
            temperature: DEFAULT_TEMPERATURE,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Webhook to forward to, if forwarding is active for this tenant
    pub fn forwarding_target(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.webhook_url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

/// Response type for the settings endpoint (hides the API key)
#[derive(Debug, Clone, Serialize)]
pub struct AiAgentSettingsResponse {
    pub company_id: String,
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub has_api_key: bool,
    pub agent_name: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub updated_at: DateTime<Utc>,
}

impl From<AiAgentSettings> for AiAgentSettingsResponse {
    fn from(settings: AiAgentSettings) -> Self {
        Self {
            company_id: settings.company_id,
            enabled: settings.enabled,
            webhook_url: settings.webhook_url,
            has_api_key: settings.api_key.as_deref().is_some_and(|k| !k.is_empty()),
            agent_name: settings.agent_name,
            system_prompt: settings.system_prompt,
            temperature: settings.temperature,
            updated_at: settings.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAiAgentSettingsRequest {
    pub enabled: Option<bool>,
    pub webhook_url: Option<String>,
    pub api_key: Option<String>,
    pub agent_name: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
}

impl UpdateAiAgentSettingsRequest {
    /// Check the update against the settings it will be merged into
    pub fn validate(&self, current: &AiAgentSettings) -> Result<(), String> {
        if let Some(temperature) = self.temperature {
            if !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
                return Err(format!("temperature must be between 0 and {}", MAX_TEMPERATURE));
            }
        }

        let webhook_url = match self.webhook_url.as_deref().map(str::trim) {
            Some("") => None,
            Some(raw) => {
                let parsed = url::Url::parse(raw).map_err(|e| format!("invalid webhook_url: {}", e))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err("webhook_url must use http or https".to_string());
                }
                Some(raw)
            }
            None => current.webhook_url.as_deref(),
        };

        let enabled = self.enabled.unwrap_or(current.enabled);
        if enabled && webhook_url.is_none() {
            return Err("webhook_url is required to enable the AI agent".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabling_requires_url() {
        let current = AiAgentSettings::disabled("acme");
        let enable = UpdateAiAgentSettingsRequest {
            enabled: Some(true),
            ..Default::default()
        };
        assert!(enable.validate(&current).is_err());

        let with_url = UpdateAiAgentSettingsRequest {
            enabled: Some(true),
            webhook_url: Some("https://n8n.example.com/webhook/abc".into()),
            ..Default::default()
        };
        assert!(with_url.validate(&current).is_ok());
    }

    #[test]
    fn test_clearing_url_of_enabled_agent_is_rejected() {
        let mut current = AiAgentSettings::disabled("acme");
        current.enabled = true;
        current.webhook_url = Some("https://n8n.example.com/webhook/abc".into());

        let clear = UpdateAiAgentSettingsRequest {
            webhook_url: Some(String::new()),
            ..Default::default()
        };
        assert!(clear.validate(&current).is_err());
    }

    #[test]
    fn test_url_scheme_and_temperature() {
        let current = AiAgentSettings::disabled("acme");
        let ftp = UpdateAiAgentSettingsRequest {
            webhook_url: Some("ftp://example.com/hook".into()),
            ..Default::default()
        };
        assert!(ftp.validate(&current).is_err());

        let garbage = UpdateAiAgentSettingsRequest {
            webhook_url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(garbage.validate(&current).is_err());

        let hot = UpdateAiAgentSettingsRequest {
            temperature: Some(2.5),
            ..Default::default()
        };
        assert!(hot.validate(&current).is_err());

        let edge = UpdateAiAgentSettingsRequest {
            temperature: Some(2.0),
            ..Default::default()
        };
        assert!(edge.validate(&current).is_ok());
    }

    #[test]
    fn test_forwarding_target() {
        let mut settings = AiAgentSettings::disabled("acme");
        settings.webhook_url = Some("https://hook".into());
        assert!(settings.forwarding_target().is_none());
        settings.enabled = true;
        assert_eq!(settings.forwarding_target(), Some("https://hook"));
    }
}
