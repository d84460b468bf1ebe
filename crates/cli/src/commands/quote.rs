use reviva_core::config::{AppConfig, LoadOptions};
use reviva_core::{ContextFactors, QuoteCalculator, QuoteEngine, QuoteRequest, UrgencyLevel};
use reviva_db::repositories::CatalogRepository;
use reviva_db::SqlCatalogRepository;
use rust_decimal::Decimal;

use crate::commands::{open_migrated_pool, runtime, CommandResult};

/// Inputs for a one-off quote against the stored catalog.
#[derive(Debug, Clone)]
pub struct QuoteArgs {
    pub device_id: String,
    pub repair_type_id: String,
    pub urgency: String,
    pub market_demand: Option<Decimal>,
    pub seasonal: Option<Decimal>,
    pub complexity: Option<Decimal>,
}

pub fn run(args: QuoteArgs) -> CommandResult {
    let urgency = match args.urgency.parse::<UrgencyLevel>() {
        Ok(urgency) => urgency,
        Err(error) => return CommandResult::failure("quote", "invalid_input", error.to_string(), 2),
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "quote",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match runtime("quote") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let snapshot = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;
        let snapshot = SqlCatalogRepository::new(pool.clone())
            .load_snapshot()
            .await
            .map_err(|error| ("catalog_load", error.to_string(), 5u8));
        pool.close().await;
        snapshot
    });
    let snapshot = match snapshot {
        Ok(snapshot) => snapshot,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("quote", error_class, message, exit_code);
        }
    };

    let request = QuoteRequest::new(args.device_id, args.repair_type_id, urgency).with_context(
        ContextFactors {
            market_demand_multiplier: args.market_demand,
            seasonal_multiplier: args.seasonal,
            complexity_multiplier: args.complexity,
        },
    );
    let calculator = QuoteCalculator::new(snapshot, config.pricing.quote_policy());

    match calculator.quote(&request) {
        Ok(quote) => {
            let message = format!(
                "{} {} for {} on {} ({} urgency)",
                quote.currency,
                quote.total_cost,
                quote.repair_type_id.0,
                quote.device_id.0,
                quote.urgency.as_str()
            );
            CommandResult::success_with_data("quote", message, serde_json::to_value(&quote).ok())
        }
        Err(error) => CommandResult::failure("quote", "quote_rejected", error.to_string(), 7),
    }
}
