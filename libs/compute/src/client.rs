//! HTTP/JSON client for the GCE compute API.
//!
//! Reference: https://cloud.google.com/compute/docs/reference/rest/v1

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::error::{ComputeError, ComputeErrorKind};
use crate::model::{Instance, Operation, Zone};
use crate::service::ComputeService;

/// Default compute API base URL.
pub const DEFAULT_COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// Token endpoint of the GCE metadata server.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Where bearer tokens come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// A fixed access token.
    Static(String),

    /// The metadata server of the VM the actuator runs on.
    MetadataServer { url: String },

    /// No authorization header (emulators, tests).
    Anonymous,
}

impl TokenSource {
    pub fn metadata_server() -> Self {
        Self::MetadataServer {
            url: METADATA_TOKEN_URL.to_string(),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct GceClientConfig {
    /// API base URL, without trailing slash.
    pub endpoint: String,

    pub token: TokenSource,

    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for GceClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_COMPUTE_ENDPOINT.to_string(),
            token: TokenSource::metadata_server(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
}

/// Compute API client.
pub struct GceClient {
    http: reqwest::Client,
    endpoint: String,
    token: TokenSource,
    cached_token: Mutex<Option<CachedToken>>,
}

impl GceClient {
    /// Create a new client.
    pub fn new(config: GceClientConfig) -> Result<Self, ComputeError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token,
            cached_token: Mutex::new(None),
        })
    }

    fn zone_url(&self, project: &str, zone: &str) -> String {
        format!("{}/projects/{}/zones/{}", self.endpoint, project, zone)
    }

    /// Current bearer token, if the source provides one.
    async fn bearer_token(&self) -> Result<Option<String>, ComputeError> {
        let url = match &self.token {
            TokenSource::Anonymous => return Ok(None),
            TokenSource::Static(token) => return Ok(Some(token.clone())),
            TokenSource::MetadataServer { url } => url,
        };

        let mut cached = self.cached_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(Some(token.value.clone()));
            }
        }

        debug!(url = %url, "Fetching access token from metadata server");
        let response = self
            .http
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, body = %body, "Failed to fetch access token");
            return Err(ComputeError::new(
                ComputeErrorKind::PermissionDenied,
                format!("metadata server returned {status}: {body}"),
            ));
        }

        let token: MetadataToken = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(Some(token.access_token))
    }

    /// Authorize, send, and decode a request.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ComputeError> {
        let request = match self.bearer_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.header("Accept", "application/json").send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GoogleErrorBody>(&body)
                .map(|b| b.error.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            debug!(status = %status, message = %message, "Compute API call failed");
            return Err(ComputeError::from_status(status.as_u16(), message));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ComputeService for GceClient {
    async fn instances_insert(
        &self,
        project: &str,
        zone: &str,
        instance: &Instance,
    ) -> Result<Operation, ComputeError> {
        let url = format!("{}/instances", self.zone_url(project, zone));
        debug!(url = %url, instance = %instance.name, "Inserting instance");
        self.execute(self.http.post(&url).json(instance)).await
    }

    async fn instances_get(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Instance, ComputeError> {
        let url = format!("{}/instances/{}", self.zone_url(project, zone), name);
        debug!(url = %url, "Getting instance");
        self.execute(self.http.get(&url)).await
    }

    async fn instances_delete(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Operation, ComputeError> {
        let url = format!("{}/instances/{}", self.zone_url(project, zone), name);
        debug!(url = %url, "Deleting instance");
        self.execute(self.http.delete(&url)).await
    }

    async fn zones_get(&self, project: &str, zone: &str) -> Result<Zone, ComputeError> {
        let url = self.zone_url(project, zone);
        debug!(url = %url, "Getting zone");
        self.execute(self.http.get(&url)).await
    }

    async fn zone_operations_get(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, ComputeError> {
        let url = format!("{}/operations/{}", self.zone_url(project, zone), operation);
        debug!(url = %url, "Getting zone operation");
        self.execute(self.http.get(&url)).await
    }
}
