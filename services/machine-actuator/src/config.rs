//! Machine actuator configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use capg_compute::{GceClientConfig, TokenSource, DEFAULT_COMPUTE_ENDPOINT};
use capg_reconcile::{PollConfig, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};

use crate::actuator::ActuatorConfig;

/// Actuator configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// Compute API base URL.
    pub compute_endpoint: String,

    /// Static bearer token; the metadata server is used when unset.
    pub access_token: Option<String>,

    /// Project for machines whose spec names none.
    pub default_project: Option<String>,

    /// Interval between zone operation polls.
    pub operation_poll_interval: Duration,

    /// Overall budget for one zone operation.
    pub operation_timeout: Duration,

    /// Root of mounted secrets, laid out as `{namespace}/{name}/{key}`.
    pub secrets_dir: PathBuf,

    /// Per-request HTTP timeout.
    pub http_timeout: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let compute_endpoint = non_empty("CAPG_COMPUTE_ENDPOINT")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_COMPUTE_ENDPOINT.to_string());

        let access_token = non_empty("CAPG_ACCESS_TOKEN");
        let default_project = non_empty("CAPG_DEFAULT_PROJECT");

        let operation_poll_interval = seconds(
            &lookup,
            "CAPG_OPERATION_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL,
        )?;
        let operation_timeout =
            seconds(&lookup, "CAPG_OPERATION_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT)?;
        ensure!(
            !operation_poll_interval.is_zero(),
            "CAPG_OPERATION_POLL_INTERVAL_SECS must be greater than zero."
        );

        let secrets_dir = non_empty("CAPG_SECRETS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/var/run/secrets/capg"));

        let http_timeout = seconds(&lookup, "CAPG_HTTP_TIMEOUT_SECS", Duration::from_secs(30))?;

        let log_level = non_empty("CAPG_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            compute_endpoint,
            access_token,
            default_project,
            operation_poll_interval,
            operation_timeout,
            secrets_dir,
            http_timeout,
            log_level,
        })
    }

    pub fn gce_client_config(&self) -> GceClientConfig {
        GceClientConfig {
            endpoint: self.compute_endpoint.clone(),
            token: match &self.access_token {
                Some(token) => TokenSource::Static(token.clone()),
                None => TokenSource::metadata_server(),
            },
            request_timeout: self.http_timeout,
        }
    }

    pub fn actuator_config(&self) -> ActuatorConfig {
        ActuatorConfig {
            default_project: self.default_project.clone(),
            operation_poll: PollConfig::new(self.operation_poll_interval, self.operation_timeout),
        }
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    let value: Option<u64> = lookup(key)
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.trim().parse())
        .transpose()
        .with_context(|| format!("{key} must be an integer (seconds)."))?;
    Ok(value.map(Duration::from_secs).unwrap_or(default))
}
