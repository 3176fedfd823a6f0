//! Posts processed media to a social provider.
//!
//! Each provider is an HTTP endpoint taken from `SHARE_ENDPOINTS`. The request is a
//! JSON `POST` authorized with the user's access token; the provider may answer
//! with an `id` (or `postId`) for the created post.

use std::time::Duration;

use panomedia_core::models::{SharePayload, ShareResult};
use panomedia_core::Config;
use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShareRequest<'a> {
    media_id: &'a str,
    link: &'a str,
    caption: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    post_id: Option<String>,
}

#[derive(Clone)]
pub struct ShareClient {
    http: reqwest::Client,
    endpoints: Vec<(String, String)>,
}

impl ShareClient {
    pub fn new(endpoints: Vec<(String, String)>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build share HTTP client: {}", e))?;
        Ok(Self { http, endpoints })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(config.share_endpoints.clone(), Duration::from_secs(30))
    }

    fn endpoint(&self, provider: &str) -> Option<&str> {
        self.endpoints
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(provider))
            .map(|(_, url)| url.as_str())
    }

    #[tracing::instrument(
        skip(self, payload),
        fields(media_id = %payload.media_id, provider = %payload.provider)
    )]
    pub async fn share(&self, payload: &SharePayload) -> Result<ShareResult> {
        let endpoint = self.endpoint(&payload.provider).ok_or_else(|| {
            ProcessingError::Share(format!("no endpoint for provider {}", payload.provider))
        })?;

        let response = self
            .http
            .post(endpoint)
            .bearer_auth(&payload.access_token)
            .json(&ShareRequest {
                media_id: &payload.media_id,
                link: &payload.link,
                caption: &payload.caption,
            })
            .send()
            .await
            .map_err(|e| ProcessingError::Share(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProcessingError::Share(format!(
                "provider responded with {}: {}",
                status, body
            )));
        }

        // Providers that answer with an empty body still count as shared.
        let body: ShareResponse = response.json().await.unwrap_or_default();
        let post_id = body.post_id.or(body.id);

        tracing::info!(post_id = ?post_id, "Media shared");
        Ok(ShareResult {
            provider: payload.provider.clone(),
            post_id,
        })
    }
}
