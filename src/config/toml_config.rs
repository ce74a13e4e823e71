use crate::domain::ports::ConfigProvider;
use crate::utils::error::{PredictError, Result};
use crate::utils::validation::{validate_config_range, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_CONCURRENT_REQUESTS: usize = 5;
const DEFAULT_USAGE_LIMIT: u64 = 100;

/// File-based configuration for long-running deployments; the CLI flags
/// cover the same knobs for one-off runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub backend: BackendConfig,
    pub ledger: LedgerConfig,
    pub batch: Option<BatchConfig>,
    pub quota: Option<QuotaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub endpoint: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub concurrent_requests: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    pub default_limit: Option<u64>,
}

impl OrchestratorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PredictError::ConfigError {
            message: format!("Failed to parse TOML config: {}", e),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn default_usage_limit(&self) -> u64 {
        self.quota
            .as_ref()
            .and_then(|q| q.default_limit)
            .unwrap_or(DEFAULT_USAGE_LIMIT)
    }
}

impl ConfigProvider for OrchestratorConfig {
    fn backend_endpoint(&self) -> &str {
        &self.backend.endpoint
    }

    fn ledger_path(&self) -> &str {
        &self.ledger.path
    }

    fn timeout_seconds(&self) -> u64 {
        self.backend.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    fn concurrent_requests(&self) -> usize {
        self.batch
            .as_ref()
            .and_then(|b| b.concurrent_requests)
            .unwrap_or(DEFAULT_CONCURRENT_REQUESTS)
    }
}

impl Validate for OrchestratorConfig {
    fn validate(&self) -> Result<()> {
        validate_url("backend.endpoint", &self.backend.endpoint)?;
        validate_config_range("backend.timeout_seconds", self.timeout_seconds(), 1, 300)?;
        validate_config_range("batch.concurrent_requests", self.concurrent_requests(), 1, 100)?;
        if self.ledger.path.is_empty() {
            return Err(PredictError::MissingConfigError {
                field: "ledger.path".to_string(),
            });
        }
        Ok(())
    }
}
