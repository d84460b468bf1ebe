use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepairTypeId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PricingRuleId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Laptop,
    Desktop,
    Phone,
    Tablet,
    Console,
    Other,
}

impl DeviceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Laptop => "laptop",
            Self::Desktop => "desktop",
            Self::Phone => "phone",
            Self::Tablet => "tablet",
            Self::Console => "console",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "laptop" => Some(Self::Laptop),
            "desktop" => Some(Self::Desktop),
            "phone" => Some(Self::Phone),
            "tablet" => Some(Self::Tablet),
            "console" => Some(Self::Console),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub from: u16,
    pub to: Option<u16>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub category: DeviceCategory,
    pub brand: String,
    pub model: String,
    pub year_range: YearRange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
    Trivial,
    Standard,
    Complex,
    Specialist,
}

impl DifficultyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trivial => "trivial",
            Self::Standard => "standard",
            Self::Complex => "complex",
            Self::Specialist => "specialist",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trivial" => Some(Self::Trivial),
            "standard" => Some(Self::Standard),
            "complex" => Some(Self::Complex),
            "specialist" => Some(Self::Specialist),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairType {
    pub id: RepairTypeId,
    pub name: String,
    pub base_labor_minutes: u32,
    pub difficulty_tier: DifficultyTier,
}

/// A base price for one repair type, either pinned to a device or generic.
///
/// `device_id == None` marks a generic fallback rule. Validity bounds are
/// inclusive and `None` means unbounded on that side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: PricingRuleId,
    pub device_id: Option<DeviceId>,
    pub repair_type_id: RepairTypeId,
    pub base_parts_cost: Decimal,
    pub base_labor_cost: Decimal,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PricingRule {
    pub fn is_device_specific(&self) -> bool {
        self.device_id.is_some()
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        let started = self.valid_from.map(|from| from <= now).unwrap_or(true);
        let not_ended = self.valid_to.map(|to| now <= to).unwrap_or(true);
        started && not_ended
    }
}
