//! Mock server configuration.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_drain_timeout_ms() -> u64 {
    2000
}

fn default_worker_threads() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockServerConfig {
    /// Answer unmatched `OPTIONS` requests as CORS preflights
    #[serde(default)]
    pub cors_preflight: bool,

    /// How long shutdown waits for open connections before aborting them
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Worker threads of the registry's runtime. Read when the process-wide
    /// registry is created; per-server configs do not change it.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        MockServerConfig {
            cors_preflight: false,
            drain_timeout_ms: default_drain_timeout_ms(),
            worker_threads: default_worker_threads(),
        }
    }
}

impl MockServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<Self, anyhow::Error> {
        let config: MockServerConfig =
            serde_json::from_str(json).context("Invalid mock server config")?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `PACT_MOCK_SERVER_CORS`,
    /// `PACT_MOCK_SERVER_DRAIN_TIMEOUT_MS` and
    /// `PACT_MOCK_SERVER_WORKER_THREADS`.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let mut config = MockServerConfig::default();
        if let Ok(value) = std::env::var("PACT_MOCK_SERVER_CORS") {
            config.cors_preflight = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Ok(value) = std::env::var("PACT_MOCK_SERVER_DRAIN_TIMEOUT_MS") {
            config.drain_timeout_ms = value.trim().parse().with_context(|| {
                format!("PACT_MOCK_SERVER_DRAIN_TIMEOUT_MS must be an integer, got '{value}'")
            })?;
        }
        if let Ok(value) = std::env::var("PACT_MOCK_SERVER_WORKER_THREADS") {
            config.worker_threads = value.trim().parse().with_context(|| {
                format!("PACT_MOCK_SERVER_WORKER_THREADS must be an integer, got '{value}'")
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.drain_timeout_ms == 0 {
            anyhow::bail!("drainTimeoutMs must be greater than zero");
        }
        if self.worker_threads == 0 {
            anyhow::bail!("workerThreads must be at least 1");
        }
        Ok(())
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
