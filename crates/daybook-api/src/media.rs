//! Media gateway: the binary-asset collaborator over HTTP.
//!
//! Entries never hold bytes, only opaque asset ids issued by an external
//! media service (an Immich-compatible API). Uploads go out as multipart
//! forms; reads proxy the asset back, forwarding `Range` so video scrubbing
//! works through us.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header;
use tracing::{info, warn};
use uuid::Uuid;

use daybook_core::{Error, MediaAsset, MediaStore, MediaVariant, Result};

/// HTTP client for the external media service.
pub struct MediaGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MediaGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!(
            subsystem = "media",
            component = "gateway",
            base_url = %base_url,
            "Media gateway initialized"
        );
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Build a gateway from `MEDIA_BASE_URL` / `MEDIA_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("MEDIA_BASE_URL")
            .map_err(|_| Error::Config("MEDIA_BASE_URL is required".to_string()))?;
        let api_key = std::env::var("MEDIA_API_KEY")
            .map_err(|_| Error::Config("MEDIA_API_KEY is required".to_string()))?;
        Ok(Self::new(base_url, api_key))
    }

    fn asset_endpoint(&self, asset_id: &str, variant: MediaVariant) -> String {
        match variant {
            MediaVariant::Thumbnail => {
                format!("{}/api/assets/{}/thumbnail", self.base_url, asset_id)
            }
            MediaVariant::Full => format!("{}/api/assets/{}/original", self.base_url, asset_id),
        }
    }
}

#[async_trait]
impl MediaStore for MediaGateway {
    async fn upload_asset(
        &self,
        user_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let start = Instant::now();
        let now = Utc::now().to_rfc3339();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| Error::Media(format!("invalid content type: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .part("assetData", part)
            .text("deviceId", format!("daybook-backend-{}", user_id))
            .text("deviceAssetId", Uuid::new_v4().to_string())
            .text("fileCreatedAt", now.clone())
            .text("fileModifiedAt", now);

        let response = self
            .client
            .post(format!("{}/api/assets", self.base_url))
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                subsystem = "media",
                component = "gateway",
                op = "upload_asset",
                status = status.as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Media upload rejected upstream"
            );
            return Err(Error::Media(format!("upload failed: {} {}", status, body)));
        }

        let body: serde_json::Value = response.json().await?;
        let asset_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Media("upload response missing asset id".to_string()))?
            .to_string();

        info!(
            subsystem = "media",
            component = "gateway",
            op = "upload_asset",
            asset_id = %asset_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Media upload complete"
        );
        Ok(asset_id)
    }

    async fn fetch_asset(
        &self,
        asset_id: &str,
        variant: MediaVariant,
        range: Option<&str>,
    ) -> Result<MediaAsset> {
        let mut request = self
            .client
            .get(self.asset_endpoint(asset_id, variant))
            .header("x-api-key", &self.api_key);
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();

        let content_type = header_string(response.headers(), header::CONTENT_TYPE);
        let content_length = header_string(response.headers(), header::CONTENT_LENGTH);
        let content_range = header_string(response.headers(), header::CONTENT_RANGE);

        let body = response.bytes().await?.to_vec();

        Ok(MediaAsset {
            status,
            content_type,
            content_length,
            content_range,
            body,
        })
    }
}

fn header_string(headers: &header::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
