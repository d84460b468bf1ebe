use rust_decimal::Decimal;
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Rules the seed must carry with exact prices.
const SEED_RULE_PRICES: &[SeedRuleContract] = &[
    SeedRuleContract {
        rule_id: "rule-mba-m3-screen",
        device_id: Some("macbook-air-m3"),
        repair_type_id: "screen-repair",
        parts_pence: 8900,
        labor_pence: 4000,
    },
    SeedRuleContract {
        rule_id: "rule-iphone-15-battery",
        device_id: Some("iphone-15"),
        repair_type_id: "battery-replacement",
        parts_pence: 4900,
        labor_pence: 2500,
    },
    SeedRuleContract {
        rule_id: "rule-generic-screen",
        device_id: None,
        repair_type_id: "screen-repair",
        parts_pence: 6000,
        labor_pence: 3000,
    },
];

const SEED_DEVICE_IDS: &[&str] = &[
    "macbook-air-m3",
    "macbook-pro-14-m3",
    "dell-xps-13",
    "iphone-15",
    "iphone-13",
    "galaxy-s24",
    "ipad-air-5",
    "ps5",
];

const SEED_REPAIR_TYPE_IDS: &[&str] = &[
    "screen-repair",
    "battery-replacement",
    "charging-port-repair",
    "keyboard-replacement",
    "logic-board-repair",
    "hdmi-port-repair",
];

const SEED_RULE_COUNT: i64 = 12;

/// Reference repair catalog: devices, repair types and base pricing rules.
///
/// Loading is idempotent; rows that already exist are left untouched.
pub struct CatalogSeedDataset;

impl CatalogSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/catalog_seed.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            devices: SEED_DEVICE_IDS.len(),
            repair_types: SEED_REPAIR_TYPE_IDS.len(),
            pricing_rules: usize::try_from(SEED_RULE_COUNT).unwrap_or_default(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let quoted_devices = sql_array_from_ids(SEED_DEVICE_IDS);
        let device_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM device WHERE id IN {quoted_devices}"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("devices", device_count == SEED_DEVICE_IDS.len() as i64));

        let quoted_repairs = sql_array_from_ids(SEED_REPAIR_TYPE_IDS);
        let repair_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM repair_type WHERE id IN {quoted_repairs}"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("repair-types", repair_count == SEED_REPAIR_TYPE_IDS.len() as i64));

        let rule_count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM pricing_rule")
            .fetch_one(pool)
            .await?;
        checks.push(("pricing-rules", rule_count >= SEED_RULE_COUNT));

        for rule in SEED_RULE_PRICES {
            checks.push((rule.rule_id, Self::verify_rule(pool, rule).await?));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    async fn verify_rule(pool: &DbPool, rule: &SeedRuleContract) -> Result<bool, RepositoryError> {
        let row = sqlx::query_as::<_, (Option<String>, String, String, String)>(
            "SELECT device_id, repair_type_id, base_parts_cost, base_labor_cost
             FROM pricing_rule WHERE id = ?",
        )
        .bind(rule.rule_id)
        .fetch_optional(pool)
        .await?;

        let Some((device_id, repair_type_id, parts, labor)) = row else {
            return Ok(false);
        };
        let parts = parse_cost(&parts)?;
        let labor = parse_cost(&labor)?;

        Ok(device_id.as_deref() == rule.device_id
            && repair_type_id == rule.repair_type_id
            && parts == Decimal::new(rule.parts_pence, 2)
            && labor == Decimal::new(rule.labor_pence, 2))
    }

    /// Remove the seeded catalog. Tickets are not touched.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_devices = sql_array_from_ids(SEED_DEVICE_IDS);
        let quoted_repairs = sql_array_from_ids(SEED_REPAIR_TYPE_IDS);

        sqlx::query(&format!(
            "DELETE FROM pricing_rule
             WHERE repair_type_id IN {quoted_repairs} OR device_id IN {quoted_devices}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM repair_type WHERE id IN {quoted_repairs}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM device WHERE id IN {quoted_devices}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedRuleContract {
    rule_id: &'static str,
    device_id: Option<&'static str>,
    repair_type_id: &'static str,
    parts_pence: i64,
    labor_pence: i64,
}

fn parse_cost(value: &str) -> Result<Decimal, RepositoryError> {
    value
        .parse::<Decimal>()
        .map_err(|error| RepositoryError::Decode(format!("invalid seeded cost `{value}`: {error}")))
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub devices: usize,
    pub repair_types: usize,
    pub pricing_rules: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
