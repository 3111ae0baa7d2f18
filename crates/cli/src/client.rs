//! API client for the heapwatch agent

use anyhow::{Context, Result};
use heapwatch_lib::{
    analysis::LeakAnalysis, EngineConfig, GcRequest, GcState, Sample, Severity, Snapshot,
    SnapshotComparison,
};
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Non-success answer from the agent
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message} (HTTP {status}, {code})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// HTTP client for the agent API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        // Relative joins replace the last segment unless the base ends in '/'
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(path).context("Invalid path")?;
        Ok(self.client.request(method, url))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.context("Failed to send request")?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(e) => (e.code, e.error),
            Err(_) => ("unknown".to_string(), body),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        }
        .into())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        response.json().await.context("Failed to parse response")
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .send(self.request(Method::POST, path)?.json(body))
            .await?;
        response.json().await.context("Failed to parse response")
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.send(self.request(Method::PUT, path)?.json(body)).await?;
        response.json().await.context("Failed to parse response")
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, path)?).await?;
        Ok(())
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        self.get("api/v1/status").await
    }

    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<Sample>> {
        match limit {
            Some(n) => self.get(&format!("api/v1/history?limit={}", n)).await,
            None => self.get("api/v1/history").await,
        }
    }

    pub async fn force_gc(&self) -> Result<GcRequest> {
        self.post("api/v1/gc", &serde_json::json!({})).await
    }

    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.get("api/v1/snapshots").await
    }

    pub async fn capture_snapshot(&self, label: Option<&str>) -> Result<Snapshot> {
        let body = CaptureRequest {
            label: label.unwrap_or_default().to_string(),
        };
        self.post("api/v1/snapshots", &body).await
    }

    pub async fn delete_snapshot(&self, id: u64) -> Result<()> {
        self.delete(&format!("api/v1/snapshots/{}", id)).await
    }

    pub async fn compare_snapshots(&self, a: u64, b: u64) -> Result<SnapshotComparison> {
        self.get(&format!("api/v1/snapshots/compare?a={}&b={}", a, b))
            .await
    }

    pub async fn config(&self) -> Result<EngineConfig> {
        self.get("api/v1/config").await
    }

    pub async fn update_config(&self, config: &EngineConfig) -> Result<EngineConfig> {
        self.put("api/v1/config", config).await
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub source: String,
    pub sample: Option<Sample>,
    pub usage_percentage: f64,
    pub severity: Severity,
    pub analysis: LeakAnalysis,
    pub gc_state: GcState,
    pub last_gc_at: Option<u64>,
    pub history_len: usize,
    pub history_capacity: usize,
    pub snapshot_count: usize,
    pub ticks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub label: String,
}
