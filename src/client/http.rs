// HTTP client for the scanning backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use super::{
    CreateScanRequest, HealthPayload, ScanCreated, ScanService, ScanStatusPayload,
    VulnerabilityListPayload, VulnerabilityPayload,
};
use crate::config::Settings;
use crate::error::ServiceError;
use crate::models::{JobId, ScanConfiguration};

// ============================================
// Configuration Constants
// ============================================

/// Connection timeout for reaching the backend
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default request timeout for status and cancel calls
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Longest error body kept in a `ServiceError::Status`
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpScanClient {
    client: Client,
    base_url: String,
}

impl HttpScanClient {
    /// Create a client for the API rooted at `base_url` (e.g. `http://localhost:8000/api`).
    ///
    /// No request is made here; an unreachable backend only shows up on the first call.
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        Self::with_timeouts(
            base_url,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
        )
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Self::with_timeouts(
            &settings.api_base_url,
            settings.request_timeout(),
            settings.connect_timeout(),
        )
    }

    pub fn with_timeouts(
        base_url: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Service root without the `/api` suffix, where `/health` lives.
    fn root_url(&self) -> &str {
        self.base_url
            .strip_suffix("/api")
            .unwrap_or(&self.base_url)
    }

    /// Backend liveness check.
    pub async fn health_check(&self) -> Result<HealthPayload, ServiceError> {
        let url = format!("{}/health", self.root_url());
        execute(self.client.get(url)).await
    }
}

/// Send a request and return the body, mapping every non-2xx to `ServiceError::Status`.
async fn send(request: RequestBuilder) -> Result<String, ServiceError> {
    let response = request.send().await?;
    let status = response.status();
    let mut body = response.text().await?;

    if !status.is_success() {
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ServiceError> {
    let body = send(request).await?;
    serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
}

#[async_trait]
impl ScanService for HttpScanClient {
    async fn create_scan(
        &self,
        target: &str,
        config: &ScanConfiguration,
    ) -> Result<ScanCreated, ServiceError> {
        let request = CreateScanRequest {
            target,
            scan_config: config,
        };
        execute(self.client.post(self.url("scans/")).json(&request)).await
    }

    async fn get_scan(&self, id: &JobId) -> Result<ScanStatusPayload, ServiceError> {
        execute(self.client.get(self.url(&format!("scans/{}", id)))).await
    }

    async fn get_scan_vulnerabilities(
        &self,
        id: &JobId,
    ) -> Result<Vec<VulnerabilityPayload>, ServiceError> {
        let list: VulnerabilityListPayload = execute(
            self.client
                .get(self.url(&format!("scans/{}/vulnerabilities", id))),
        )
        .await?;
        Ok(list.into_records())
    }

    async fn cancel_scan(&self, id: &JobId) -> Result<(), ServiceError> {
        // Any 2xx is an acknowledgement; the body is not needed.
        send(self.client.post(self.url(&format!("scans/{}/cancel", id)))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_joined_without_double_slashes() {
        let client = HttpScanClient::new("http://localhost:8000/api/").expect("client");
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(client.url("scans/"), "http://localhost:8000/api/scans/");
        assert_eq!(client.url("/scans/7"), "http://localhost:8000/api/scans/7");
        assert_eq!(client.root_url(), "http://localhost:8000");
    }

    #[test]
    fn root_url_is_base_when_there_is_no_api_suffix() {
        let client = HttpScanClient::new("http://scanner:9000").expect("client");
        assert_eq!(client.root_url(), "http://scanner:9000");
    }
}
