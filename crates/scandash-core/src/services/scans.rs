use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::models::{ConsolidatedInfo, ScanKind, ScanReport, ScannedUrl};

#[derive(Debug, Serialize)]
struct ScanRequest<'a> {
    url: &'a str,
}

/// URL scanning endpoints
pub struct ScanService<'a> {
    api: &'a ApiClient,
}

impl<'a> ScanService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Submit a URL for scanning; returns the service's first analysis
    pub async fn detect_protocol(&self, url: &str) -> Result<Value, ApiError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ApiError::InvalidRequest("URL is required".to_string()));
        }
        let result = self
            .api
            .send_json(
                "/v1/urlscan/detect-protocol",
                RequestOptions::post().json(&ScanRequest { url })?,
            )
            .await?;
        info!(url, "Scan submitted");
        Ok(result)
    }

    /// URLs the signed-in user has scanned
    pub async fn history(&self) -> Result<Vec<ScannedUrl>, ApiError> {
        self.api
            .send_json("/v1/urlscan/user-urls", RequestOptions::get())
            .await
    }

    /// Delete a scanned URL together with its analyses
    pub async fn delete(&self, url_id: &str) -> Result<(), ApiError> {
        self.api
            .send_empty(&format!("/v1/urlscan/user-urls/{}", url_id), RequestOptions::delete())
            .await
    }

    pub async fn result(&self, kind: ScanKind, url_id: &str) -> Result<Value, ApiError> {
        self.api
            .send_json(&kind.result_path(url_id), RequestOptions::get())
            .await
    }

    pub async fn summary(&self, url_id: &str) -> Result<Value, ApiError> {
        self.api
            .send_json(
                &format!("/v1/urlscan/summary-recommendations/{}", url_id),
                RequestOptions::get(),
            )
            .await
    }

    pub async fn consolidated(&self, url_id: &str) -> Result<ConsolidatedInfo, ApiError> {
        self.api
            .send_json(
                &format!("/v1/urlscan/consolidated-url-info/{}", url_id),
                RequestOptions::get(),
            )
            .await
    }

    /// Build the printable report for a scanned URL, attributed to the
    /// signed-in user
    pub async fn report(&self, url_id: &str) -> Result<ScanReport, ApiError> {
        let info = self.consolidated(url_id).await?;
        let profile = self.api.session().profile();
        Ok(ScanReport::from_consolidated(
            info,
            profile.username.as_deref(),
            Utc::now(),
        ))
    }
}
