use std::env;
use std::sync::{Mutex, OnceLock};

use reviva_cli::commands::{config, migrate, quote, seed};
use reviva_core::catalog::PricingRuleProvider;
use reviva_core::config::DatabaseConfig;
use reviva_core::domain::catalog::{DeviceId, RepairTypeId};
use reviva_db::repositories::CatalogRepository;
use reviva_db::{connect, SqlCatalogRepository};
use rust_decimal::Decimal;
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("REVIVA_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_currency() {
    with_env(
        &[("REVIVA_DATABASE_URL", "sqlite::memory:"), ("REVIVA_PRICING_CURRENCY", "pounds")],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn seed_reports_catalog_counts() {
    with_env(&[("REVIVA_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run(false);
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        assert_eq!(
            payload["message"],
            "repair catalog loaded: 8 devices, 6 repair types, 12 pricing rules"
        );
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = file_database_url(&dir);

    with_env(&[("REVIVA_DATABASE_URL", url.as_str())], || {
        let first = seed::run(false);
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let second = seed::run(false);
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        let first_payload = parse_payload(&first.output);
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn quote_prices_seeded_catalog() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = file_database_url(&dir);

    with_env(&[("REVIVA_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run(false).exit_code, 0);

        let result = quote::run(quote_args("macbook-air-m3", "screen-repair", "urgent"));
        assert_eq!(result.exit_code, 0, "expected quote success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "quote");
        assert_eq!(payload["data"]["currency"], "GBP");
        assert_eq!(decimal_field(&payload["data"]["parts_cost"]), Decimal::new(8_900, 2));
        assert_eq!(decimal_field(&payload["data"]["labor_cost"]), Decimal::new(6_000, 2));
        assert_eq!(decimal_field(&payload["data"]["total_cost"]), Decimal::new(14_900, 2));
    });
}

#[test]
fn seed_reset_restores_edited_reference_prices() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = file_database_url(&dir);

    with_env(&[("REVIVA_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run(false).exit_code, 0);
        raise_screen_parts_price(&url, Decimal::new(99, 0));
        assert_eq!(standard_screen_total(), Decimal::new(13_900, 2));

        let plain = seed::run(false);
        assert_eq!(plain.exit_code, 0);
        assert_eq!(standard_screen_total(), Decimal::new(13_900, 2));

        let reset = seed::run(true);
        assert_eq!(reset.exit_code, 0, "expected reset success: {}", reset.output);
        assert_eq!(
            parse_payload(&reset.output)["message"],
            "repair catalog reloaded: 8 devices, 6 repair types, 12 pricing rules"
        );
        assert_eq!(standard_screen_total(), Decimal::new(12_900, 2));
    });
}

#[test]
fn quote_rejects_unknown_device() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = file_database_url(&dir);

    with_env(&[("REVIVA_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run(false).exit_code, 0);

        let result = quote::run(quote_args("nokia-3310", "screen-repair", "standard"));
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "quote_rejected");
        assert!(payload.get("data").is_none());
    });
}

#[test]
fn quote_rejects_unknown_urgency_before_touching_the_database() {
    with_env(&[("REVIVA_DATABASE_URL", "sqlite::memory:")], || {
        let result = quote::run(quote_args("macbook-air-m3", "screen-repair", "whenever"));
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn config_attributes_env_sources_and_redacts_token() {
    with_env(
        &[
            ("REVIVA_DATABASE_URL", "sqlite::memory:"),
            ("REVIVA_PRICING_CURRENCY", "EUR"),
            ("REVIVA_NOTIFICATIONS_WEBHOOK_URL", "https://hooks.example.test/reviva"),
            ("REVIVA_NOTIFICATIONS_WEBHOOK_TOKEN", "whsec-0123456789"),
        ],
        || {
            let output = config::run();

            assert!(output.contains(
                "- pricing.currency = EUR (source: env (REVIVA_PRICING_CURRENCY))"
            ));
            assert!(output.contains("- pricing.quote_ttl_hours = 24 (source: default)"));
            assert!(output.contains("- notifications.webhook_token = whse***"));
            assert!(!output.contains("0123456789"));
        },
    );
}

fn standard_screen_total() -> Decimal {
    let result = quote::run(quote_args("macbook-air-m3", "screen-repair", "standard"));
    assert_eq!(result.exit_code, 0, "expected quote success: {}", result.output);
    decimal_field(&parse_payload(&result.output)["data"]["total_cost"])
}

fn raise_screen_parts_price(url: &str, parts: Decimal) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    runtime.block_on(async {
        let database =
            DatabaseConfig { url: url.to_string(), max_connections: 1, timeout_secs: 5 };
        let pool = connect(&database).await.expect("connect");
        let repository = SqlCatalogRepository::new(pool.clone());
        let snapshot = repository.load_snapshot().await.expect("snapshot");
        let mut rule = snapshot
            .find_pricing_rules(
                &DeviceId("macbook-air-m3".to_string()),
                &RepairTypeId("screen-repair".to_string()),
            )
            .into_iter()
            .find(|rule| rule.id.0 == "rule-mba-m3-screen")
            .expect("seeded rule");
        rule.base_parts_cost = parts;
        repository.save_pricing_rule(&rule).await.expect("save rule");
        pool.close().await;
    });
}

fn quote_args(device: &str, repair: &str, urgency: &str) -> quote::QuoteArgs {
    quote::QuoteArgs {
        device_id: device.to_string(),
        repair_type_id: repair.to_string(),
        urgency: urgency.to_string(),
        market_demand: None,
        seasonal: None,
        complexity: None,
    }
}

fn file_database_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("reviva.db").display())
}

fn decimal_field(value: &Value) -> Decimal {
    value.as_str().and_then(|raw| raw.parse().ok()).expect("decimal string field")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "REVIVA_DATABASE_URL",
        "REVIVA_DATABASE_MAX_CONNECTIONS",
        "REVIVA_DATABASE_TIMEOUT_SECS",
        "REVIVA_SERVER_BIND_ADDRESS",
        "REVIVA_SERVER_PORT",
        "REVIVA_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "REVIVA_PRICING_CURRENCY",
        "REVIVA_PRICING_QUOTE_TTL_HOURS",
        "REVIVA_PRICING_CATALOG_REFRESH_SECS",
        "REVIVA_NOTIFICATIONS_WEBHOOK_URL",
        "REVIVA_NOTIFICATIONS_WEBHOOK_TOKEN",
        "REVIVA_NOTIFICATIONS_TIMEOUT_SECS",
        "REVIVA_LOGGING_LEVEL",
        "REVIVA_LOGGING_FORMAT",
        "REVIVA_LOG_LEVEL",
        "REVIVA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
