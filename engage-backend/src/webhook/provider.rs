//! Minimal client for the messaging provider's REST API

use serde::Deserialize;
use serde_json::json;

use crate::config::ProviderApiConfig;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider returned HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfilePictureResponse {
    #[serde(default)]
    profile_picture_url: Option<String>,
}

pub struct ProviderClient {
    http: reqwest::Client,
    config: ProviderApiConfig,
}

impl ProviderClient {
    pub fn new(http: reqwest::Client, config: ProviderApiConfig) -> Self {
        Self { http, config }
    }

    /// Profile picture URL of `phone` as seen by `instance`. `None` when the contact has none.
    pub async fn fetch_profile_picture(
        &self,
        instance: &str,
        phone: &str,
    ) -> Result<Option<String>, ProviderError> {
        let url = format!(
            "{}/chat/fetchProfilePictureUrl/{}",
            self.config.base_url, instance
        );
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&json!({ "number": phone }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let body: ProfilePictureResponse = response.json().await?;
        Ok(body.profile_picture_url.filter(|u| !u.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> ProviderClient {
        ProviderClient::new(
            reqwest::Client::new(),
            ProviderApiConfig {
                base_url: server.base_url(),
                api_key: "evo-key".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_fetch_profile_picture() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/fetchProfilePictureUrl/acme-main")
                    .header("apikey", "evo-key");
                then.status(200).json_body(serde_json::json!({
                    "wuid": "5511999990000@s.whatsapp.net",
                    "profilePictureUrl": "https://pps.whatsapp.net/p.jpg"
                }));
            })
            .await;

        let url = client(&server)
            .fetch_profile_picture("acme-main", "5511999990000")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(url.as_deref(), Some("https://pps.whatsapp.net/p.jpg"));
    }

    #[tokio::test]
    async fn test_missing_picture_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/fetchProfilePictureUrl/acme-main");
                then.status(200).json_body(serde_json::json!({ "profilePictureUrl": null }));
            })
            .await;

        let url = client(&server)
            .fetch_profile_picture("acme-main", "5511999990000")
            .await
            .unwrap();
        assert!(url.is_none());
    }

    #[tokio::test]
    async fn test_provider_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/fetchProfilePictureUrl/acme-main");
                then.status(401);
            })
            .await;

        let err = client(&server)
            .fetch_profile_picture("acme-main", "5511999990000")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status(401)));
    }
}
