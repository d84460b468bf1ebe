use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::catalog::CatalogSnapshot;
use crate::domain::catalog::{
    Device, DeviceCategory, DeviceId, DifficultyTier, PricingRule, PricingRuleId, RepairType,
    RepairTypeId, YearRange,
};
use crate::domain::quote::{Quote, UrgencyLevel};
use crate::pricing::{calculate_quote_at, QuotePolicy, QuoteRequest};

pub fn rule_created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

pub fn devices() -> Vec<Device> {
    let device = |id: &str, category, brand: &str, model: &str, from| Device {
        id: DeviceId(id.to_owned()),
        category,
        brand: brand.to_owned(),
        model: model.to_owned(),
        year_range: YearRange { from, to: None },
    };

    vec![
        device("macbook-air-m3", DeviceCategory::Laptop, "Apple", "MacBook Air M3", 2024),
        device("iphone-15", DeviceCategory::Phone, "Apple", "iPhone 15", 2023),
        device("galaxy-s24", DeviceCategory::Phone, "Samsung", "Galaxy S24", 2024),
    ]
}

pub fn repair_types() -> Vec<RepairType> {
    let repair = |id: &str, name: &str, minutes, tier| RepairType {
        id: RepairTypeId(id.to_owned()),
        name: name.to_owned(),
        base_labor_minutes: minutes,
        difficulty_tier: tier,
    };

    vec![
        repair("screen-repair", "Screen Replacement", 90, DifficultyTier::Standard),
        repair("battery-replacement", "Battery Replacement", 60, DifficultyTier::Trivial),
        repair("logic-board-repair", "Logic Board Repair", 240, DifficultyTier::Specialist),
    ]
}

pub fn device_rule(id: &str, device: &str, repair: &str, parts: i64, labor: i64) -> PricingRule {
    PricingRule {
        device_id: Some(DeviceId(device.to_owned())),
        ..generic_rule(id, repair, parts, labor)
    }
}

pub fn generic_rule(id: &str, repair: &str, parts: i64, labor: i64) -> PricingRule {
    PricingRule {
        id: PricingRuleId(id.to_owned()),
        device_id: None,
        repair_type_id: RepairTypeId(repair.to_owned()),
        base_parts_cost: Decimal::new(parts, 0),
        base_labor_cost: Decimal::new(labor, 0),
        valid_from: None,
        valid_to: None,
        created_at: rule_created_at(),
    }
}

pub fn catalog_fixture() -> CatalogSnapshot {
    CatalogSnapshot::new(
        devices(),
        repair_types(),
        vec![
            device_rule("rule-mba-m3-screen", "macbook-air-m3", "screen-repair", 89, 40),
            generic_rule("rule-generic-screen", "screen-repair", 60, 30),
        ],
    )
}

pub fn quote_fixture(now: DateTime<Utc>) -> Quote {
    calculate_quote_at(
        &catalog_fixture(),
        &QuotePolicy::default(),
        &QuoteRequest::new("macbook-air-m3", "screen-repair", UrgencyLevel::Standard),
        now,
    )
    .expect("fixture quote")
}
