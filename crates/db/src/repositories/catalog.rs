use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use reviva_core::catalog::CatalogSnapshot;
use reviva_core::domain::catalog::{
    Device, DeviceCategory, DeviceId, DifficultyTier, PricingRule, PricingRuleId, RepairType,
    RepairTypeId, YearRange,
};

use super::{CatalogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn load_snapshot(&self) -> Result<CatalogSnapshot, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let devices = sqlx::query(
            "SELECT id, category, brand, model, year_from, year_to FROM device ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(device_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        let repair_types = sqlx::query(
            "SELECT id, name, base_labor_minutes, difficulty_tier FROM repair_type ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(repair_type_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        let rules = sqlx::query(
            "SELECT
                id,
                device_id,
                repair_type_id,
                base_parts_cost,
                base_labor_cost,
                valid_from,
                valid_to,
                created_at
             FROM pricing_rule
             ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(pricing_rule_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await?;

        Ok(CatalogSnapshot::new(devices, repair_types, rules))
    }

    async fn save_device(&self, device: &Device) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO device (id, category, brand, model, year_from, year_to)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                category = excluded.category,
                brand = excluded.brand,
                model = excluded.model,
                year_from = excluded.year_from,
                year_to = excluded.year_to",
        )
        .bind(&device.id.0)
        .bind(device.category.as_str())
        .bind(&device.brand)
        .bind(&device.model)
        .bind(i64::from(device.year_range.from))
        .bind(device.year_range.to.map(i64::from))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_repair_type(&self, repair_type: &RepairType) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO repair_type (id, name, base_labor_minutes, difficulty_tier)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                base_labor_minutes = excluded.base_labor_minutes,
                difficulty_tier = excluded.difficulty_tier",
        )
        .bind(&repair_type.id.0)
        .bind(&repair_type.name)
        .bind(i64::from(repair_type.base_labor_minutes))
        .bind(repair_type.difficulty_tier.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_pricing_rule(&self, rule: &PricingRule) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO pricing_rule (
                id,
                device_id,
                repair_type_id,
                base_parts_cost,
                base_labor_cost,
                valid_from,
                valid_to,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                device_id = excluded.device_id,
                repair_type_id = excluded.repair_type_id,
                base_parts_cost = excluded.base_parts_cost,
                base_labor_cost = excluded.base_labor_cost,
                valid_from = excluded.valid_from,
                valid_to = excluded.valid_to,
                created_at = excluded.created_at",
        )
        .bind(&rule.id.0)
        .bind(rule.device_id.as_ref().map(|id| id.0.as_str()))
        .bind(&rule.repair_type_id.0)
        .bind(rule.base_parts_cost.to_string())
        .bind(rule.base_labor_cost.to_string())
        .bind(rule.valid_from.map(|value| value.to_rfc3339()))
        .bind(rule.valid_to.map(|value| value.to_rfc3339()))
        .bind(rule.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn device_from_row(row: &SqliteRow) -> Result<Device, RepositoryError> {
    let category: String = row.try_get("category")?;
    let year_to: Option<i64> = row.try_get("year_to")?;
    Ok(Device {
        id: DeviceId(row.try_get("id")?),
        category: DeviceCategory::parse(&category).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown device category `{category}`"))
        })?,
        brand: row.try_get("brand")?,
        model: row.try_get("model")?,
        year_range: YearRange {
            from: parse_year("year_from", row.try_get("year_from")?)?,
            to: year_to.map(|value| parse_year("year_to", value)).transpose()?,
        },
    })
}

fn repair_type_from_row(row: &SqliteRow) -> Result<RepairType, RepositoryError> {
    let tier: String = row.try_get("difficulty_tier")?;
    let minutes: i64 = row.try_get("base_labor_minutes")?;
    Ok(RepairType {
        id: RepairTypeId(row.try_get("id")?),
        name: row.try_get("name")?,
        base_labor_minutes: u32::try_from(minutes).map_err(|_| {
            RepositoryError::Decode(format!("invalid base_labor_minutes: {minutes}"))
        })?,
        difficulty_tier: DifficultyTier::parse(&tier)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown difficulty tier `{tier}`")))?,
    })
}

fn pricing_rule_from_row(row: &SqliteRow) -> Result<PricingRule, RepositoryError> {
    let device_id: Option<String> = row.try_get("device_id")?;
    Ok(PricingRule {
        id: PricingRuleId(row.try_get("id")?),
        device_id: device_id.map(DeviceId),
        repair_type_id: RepairTypeId(row.try_get("repair_type_id")?),
        base_parts_cost: parse_decimal("base_parts_cost", row.try_get("base_parts_cost")?)?,
        base_labor_cost: parse_decimal("base_labor_cost", row.try_get("base_labor_cost")?)?,
        valid_from: parse_optional_timestamp("valid_from", row.try_get("valid_from")?)?,
        valid_to: parse_optional_timestamp("valid_to", row.try_get("valid_to")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn parse_year(column: &str, value: i64) -> Result<u16, RepositoryError> {
    u16::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("invalid year in `{column}`: {value}")))
}

fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use reviva_core::catalog::{CatalogProvider, PricingRuleProvider};
    use reviva_core::domain::catalog::{
        Device, DeviceCategory, DeviceId, DifficultyTier, PricingRule, PricingRuleId, RepairType,
        RepairTypeId, YearRange,
    };

    use super::SqlCatalogRepository;
    use crate::repositories::{CatalogRepository, RepositoryError};
    use crate::connection::in_memory;
    use crate::{connect, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect(&in_memory()).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn pixel() -> Device {
        Device {
            id: DeviceId("pixel-8".to_owned()),
            category: DeviceCategory::Phone,
            brand: "Google".to_owned(),
            model: "Pixel 8".to_owned(),
            year_range: YearRange { from: 2023, to: Some(2024) },
        }
    }

    fn battery() -> RepairType {
        RepairType {
            id: RepairTypeId("battery-replacement".to_owned()),
            name: "Battery Replacement".to_owned(),
            base_labor_minutes: 45,
            difficulty_tier: DifficultyTier::Trivial,
        }
    }

    #[tokio::test]
    async fn saved_catalog_loads_back_as_snapshot() {
        let pool = setup_pool().await;
        let repo = SqlCatalogRepository::new(pool);
        let created_at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let rule = PricingRule {
            id: PricingRuleId("rule-pixel-8-battery".to_owned()),
            device_id: Some(DeviceId("pixel-8".to_owned())),
            repair_type_id: RepairTypeId("battery-replacement".to_owned()),
            base_parts_cost: Decimal::new(3450, 2),
            base_labor_cost: Decimal::new(25, 0),
            valid_from: Some(created_at),
            valid_to: None,
            created_at,
        };

        repo.save_device(&pixel()).await.expect("device");
        repo.save_repair_type(&battery()).await.expect("repair type");
        repo.save_pricing_rule(&rule).await.expect("rule");

        let snapshot = repo.load_snapshot().await.expect("snapshot");
        assert_eq!(snapshot.find_device(&pixel().id), Some(pixel()));
        assert_eq!(snapshot.find_repair_type(&battery().id), Some(battery()));
        assert_eq!(snapshot.find_pricing_rules(&pixel().id, &battery().id), vec![rule]);
    }

    #[tokio::test]
    async fn saving_twice_updates_in_place() {
        let pool = setup_pool().await;
        let repo = SqlCatalogRepository::new(pool);
        let mut repair = battery();
        repo.save_repair_type(&repair).await.expect("first save");
        repair.base_labor_minutes = 50;
        repo.save_repair_type(&repair).await.expect("second save");

        let snapshot = repo.load_snapshot().await.expect("snapshot");
        assert_eq!(snapshot.repair_type_count(), 1);
        assert_eq!(snapshot.find_repair_type(&repair.id).map(|r| r.base_labor_minutes), Some(50));
    }

    #[tokio::test]
    async fn corrupt_cost_surfaces_decode_error() {
        let pool = setup_pool().await;
        let repo = SqlCatalogRepository::new(pool.clone());
        repo.save_repair_type(&battery()).await.expect("repair type");
        sqlx::query(
            "INSERT INTO pricing_rule (id, device_id, repair_type_id, base_parts_cost,
                base_labor_cost, valid_from, valid_to, created_at)
             VALUES ('rule-bad', NULL, 'battery-replacement', 'twelve', '10', NULL, NULL,
                '2025-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await
        .expect("insert corrupt row");

        let error = repo.load_snapshot().await.expect_err("decode failure");
        assert!(matches!(
            error,
            RepositoryError::Decode(ref message) if message.contains("base_parts_cost")
        ));
    }
}
