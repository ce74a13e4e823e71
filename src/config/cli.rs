use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{validate_config_range, validate_non_empty_string, validate_url, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "flatprice")]
#[command(about = "Prediction request orchestrator for flat price estimates")]
pub struct CliConfig {
    /// Base URL of the compute backend.
    #[arg(long, default_value = "http://localhost:5000")]
    pub backend_endpoint: String,

    /// Directory holding the ledger snapshot.
    #[arg(long, default_value = "./data")]
    pub ledger_path: String,

    /// Per-dispatch backend timeout in seconds.
    #[arg(long, default_value = "10")]
    pub timeout_seconds: u64,

    /// Concurrency ceiling for batch fan-out.
    #[arg(long, default_value = "5")]
    pub concurrent_requests: usize,

    /// Account to submit as.
    #[arg(long, default_value = "demo")]
    pub account: String,

    /// Usage limit applied when the account is created.
    #[arg(long, default_value = "100")]
    pub usage_limit: u64,

    /// Create the account with the unlimited role.
    #[arg(long)]
    pub unlimited: bool,

    /// Path to a JSON file with one property object or an array of them.
    pub input: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl ConfigProvider for CliConfig {
    fn backend_endpoint(&self) -> &str {
        &self.backend_endpoint
    }

    fn ledger_path(&self) -> &str {
        &self.ledger_path
    }

    fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn concurrent_requests(&self) -> usize {
        self.concurrent_requests
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_url("backend_endpoint", &self.backend_endpoint)?;
        validate_non_empty_string("ledger_path", &self.ledger_path)?;
        validate_non_empty_string("account", &self.account)?;
        validate_non_empty_string("input", &self.input)?;
        validate_config_range("timeout_seconds", self.timeout_seconds, 1, 300)?;
        validate_config_range("concurrent_requests", self.concurrent_requests, 1, 100)?;
        Ok(())
    }
}
