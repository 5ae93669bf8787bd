//! WhatsApp Business (Graph API) client.
//!
//! Two concerns live here: outbound text delivery for pipeline narrations,
//! and inbound media download (webhook messages carry a media id, not the
//! image itself; the image is fetched and re-encoded as a `data:` URI for
//! the vision classifier).

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};

use challan_core::{ChallanError, Result, TextDelivery};

/// Configuration for the Graph API client.
#[derive(Clone)]
pub struct WhatsAppConfig {
    /// Graph API base URL.
    pub api_url: String,
    /// WhatsApp Business access token.
    pub token: String,
    /// Business phone number id messages are sent from.
    pub phone_number_id: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("api_url", &self.api_url)
            .field("token", &"[REDACTED]")
            .field("phone_number_id", &self.phone_number_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl WhatsAppConfig {
    pub fn new(token: String, phone_number_id: String) -> Self {
        Self {
            api_url: "https://graph.facebook.com/v22.0".to_string(),
            token,
            phone_number_id,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MediaMetadata {
    url: Option<String>,
}

/// Graph API client for sending texts and fetching media.
pub struct WhatsAppClient {
    client: reqwest::Client,
    config: WhatsAppConfig,
}

impl WhatsAppClient {
    pub fn new(config: WhatsAppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .https_only(true)
            .build()
            .map_err(|e| ChallanError::Delivery(format!("Failed to create HTTP client: {e}")))?;

        info!(phone_number_id = %config.phone_number_id, "WhatsApp client created");
        Ok(Self { client, config })
    }

    /// Download a webhook media object and inline it as a `data:` URI.
    ///
    /// The Graph API needs two authorized requests: one for the short-lived
    /// media URL, one for the content itself.
    #[instrument(level = "debug", skip(self))]
    pub async fn download_media_data_uri(&self, media_id: &str) -> Result<String> {
        let meta_url = format!("{}/{}", self.config.api_url, media_id);
        let metadata: MediaMetadata = self
            .client
            .get(&meta_url)
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| ChallanError::Delivery(format!("Media metadata request failed: {e}")))?
            .error_for_status()
            .map_err(|e| ChallanError::Delivery(format!("Media metadata request failed: {e}")))?
            .json()
            .await
            .map_err(|e| ChallanError::Delivery(format!("Malformed media metadata: {e}")))?;

        let media_url = metadata
            .url
            .ok_or_else(|| ChallanError::Delivery("Media url missing".into()))?;

        let response = self
            .client
            .get(&media_url)
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| ChallanError::Delivery(format!("Media download failed: {e}")))?
            .error_for_status()
            .map_err(|e| ChallanError::Delivery(format!("Media download failed: {e}")))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChallanError::Delivery(format!("Failed to read media body: {e}")))?;

        debug!(media_id, bytes = bytes.len(), content_type = %content_type, "Media downloaded");
        Ok(format!("data:{};base64,{}", content_type, BASE64.encode(&bytes)))
    }
}

#[async_trait]
impl TextDelivery for WhatsAppClient {
    #[instrument(level = "info", skip(self, body), fields(chars = body.chars().count()))]
    async fn send_text(&self, recipient: &str, body: &str) -> Result<()> {
        let url = format!(
            "{}/{}/messages",
            self.config.api_url, self.config.phone_number_id
        );

        let payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": recipient,
            "type": "text",
            "text": {
                "preview_url": false,
                "body": body,
            },
        });

        self.client
            .post(&url)
            .bearer_auth(&self.config.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChallanError::Delivery(format!("Message send failed: {e}")))?
            .error_for_status()
            .map_err(|e| ChallanError::Delivery(format!("Message send rejected: {e}")))?;

        debug!(recipient, "Text delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_debug_redacts_token() {
        let config = WhatsAppConfig::new("secret-token".into(), "12345".into());
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn test_config_defaults() {
        let config = WhatsAppConfig::new("t".into(), "12345".into());
        assert_eq!(config.api_url, "https://graph.facebook.com/v22.0");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
