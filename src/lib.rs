pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::OrchestratorConfig;

pub use adapters::{HttpPriceBackend, LocalStorage};
pub use core::{engine::PredictionEngine, ledger::PredictionLedger};
pub use utils::error::{PredictError, Result};
