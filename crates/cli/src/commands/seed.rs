use crate::commands::{open_migrated_pool, runtime, CommandFailure, CommandResult};
use reviva_core::config::{AppConfig, LoadOptions};
use reviva_db::{CatalogSeedDataset, SeedResult};

pub fn run(reset: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;

        if reset {
            CatalogSeedDataset::clean(&pool)
                .await
                .map_err(|error| ("seed_reset", error.to_string(), 5u8))?;
        }

        let seed_result = CatalogSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = CatalogSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<SeedResult, CommandFailure> = if verification.all_present {
            Ok(seed_result)
        } else {
            Err(("seed_verification", verification_failure_message(&verification.checks), 6u8))
        };

        pool.close().await;
        run_result
    });

    let verb = if reset { "reloaded" } else { "loaded" };
    match result {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "repair catalog {verb}: {} devices, {} repair types, {} pricing rules",
                seeded.devices, seeded.repair_types, seeded.pricing_rules
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
