use std::env;
use std::path::PathBuf;

/// Default cap on downloaded media (25 MiB)
pub const DEFAULT_MAX_MEDIA_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} must be a valid number, got '{1}'")]
    InvalidNumber(&'static str, String),
}

/// Credentials for the messaging provider's REST API (profile pictures)
#[derive(Debug, Clone)]
pub struct ProviderApiConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub api_token: String,
    pub media_dir: PathBuf,
    pub public_base_url: String,
    pub provider_api: Option<ProviderApiConfig>,
    pub http_timeout_secs: u64,
    pub max_media_bytes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the process env in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_number(&lookup, "PORT", 8080)?;
        let api_token = lookup("API_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("API_TOKEN"))?;

        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let provider_api = match (lookup("EVOLUTION_API_URL"), lookup("EVOLUTION_API_KEY")) {
            (Some(base_url), Some(api_key)) if !base_url.is_empty() => Some(ProviderApiConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
            }),
            _ => None,
        };

        Ok(Self {
            port,
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "./.db/engage.db".to_string()),
            api_token,
            media_dir: PathBuf::from(lookup("MEDIA_DIR").unwrap_or_else(|| "./.media".to_string())),
            public_base_url,
            provider_api,
            http_timeout_secs: parse_number(&lookup, "HTTP_TIMEOUT_SECS", 15)?,
            max_media_bytes: parse_number(&lookup, "MAX_MEDIA_BYTES", DEFAULT_MAX_MEDIA_BYTES)?,
        })
    }
}

fn parse_number<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(key, raw)),
        None => Ok(default),
    }
}
