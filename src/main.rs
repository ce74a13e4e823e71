use anyhow::Context;
use clap::Parser;
use flatprice::domain::model::{ClientAccount, PropertyRecord, Role};
use flatprice::domain::ports::ConfigProvider;
use flatprice::utils::{logger, validation::Validate};
use flatprice::{CliConfig, HttpPriceBackend, LocalStorage, PredictionEngine, PredictionLedger};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting flatprice orchestrator");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(2);
    }

    let input = std::fs::read_to_string(&config.input)
        .with_context(|| format!("Failed to read input file: {}", config.input))?;
    let parsed: serde_json::Value =
        serde_json::from_str(&input).context("Input file is not valid JSON")?;

    let storage = LocalStorage::new(config.ledger_path().to_string());
    let ledger = match PredictionLedger::load(storage).await {
        Ok(ledger) => ledger,
        Err(e) => {
            tracing::error!("❌ Failed to load ledger: {}", e);
            std::process::exit(1);
        }
    };

    // Provision the submitting account on first use; an existing account
    // keeps its counter and role.
    if ledger.account(&config.account).await.is_err() {
        let role = if config.unlimited {
            Role::Unlimited
        } else {
            Role::Standard
        };
        let account = ClientAccount::new(config.account.clone(), role, config.usage_limit);
        tracing::info!("Provisioning account '{}' ({:?})", config.account, role);
        ledger
            .upsert_account(account)
            .await
            .context("Failed to provision account")?;
    }

    let backend = HttpPriceBackend::new(
        config.backend_endpoint().to_string(),
        Duration::from_secs(config.timeout_seconds()),
    );
    let engine = PredictionEngine::new(
        backend,
        ledger,
        Duration::from_secs(config.timeout_seconds()),
        config.concurrent_requests(),
    );

    let output = if parsed.is_array() {
        let properties: Vec<PropertyRecord> =
            serde_json::from_value(parsed).context("Input array is not a list of properties")?;
        tracing::info!("Submitting batch of {} properties", properties.len());
        engine
            .predict_batch(&config.account, properties)
            .await
            .map(|response| serde_json::to_value(response))
    } else {
        let property: PropertyRecord =
            serde_json::from_value(parsed).context("Input is not a property object")?;
        tracing::info!("Submitting single property");
        engine
            .predict(&config.account, property)
            .await
            .map(|response| serde_json::to_value(response))
    };

    match output {
        Ok(value) => {
            let value = value.context("Failed to serialize response")?;
            tracing::info!("✅ Prediction request completed");
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!("❌ Prediction request failed: {}", e);
            eprintln!("{}", serde_json::to_string_pretty(&e.to_json())?);
            let exit_code = if e.is_client_error() { 2 } else { 1 };
            std::process::exit(exit_code);
        }
    }
}
