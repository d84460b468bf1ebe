use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{DeviceId, PricingRuleId, RepairTypeId};
use crate::pricing::QuoteError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

/// Customer-selected service speed. Only labor is scaled by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Standard,
    High,
    Urgent,
    Emergency,
}

impl UrgencyLevel {
    pub const ALL: [UrgencyLevel; 4] =
        [UrgencyLevel::Standard, UrgencyLevel::High, UrgencyLevel::Urgent, UrgencyLevel::Emergency];

    pub fn multiplier(&self) -> Decimal {
        match self {
            Self::Standard => Decimal::ONE,
            Self::High => Decimal::new(12, 1),
            Self::Urgent => Decimal::new(15, 1),
            Self::Emergency => Decimal::TWO,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::High => "high",
            Self::Urgent => "urgent",
            Self::Emergency => "emergency",
        }
    }
}

impl FromStr for UrgencyLevel {
    type Err = QuoteError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            "emergency" => Ok(Self::Emergency),
            _ => Err(QuoteError::InvalidUrgency { value: value.to_owned() }),
        }
    }
}

/// Caller-supplied pricing context. Absent fields default to 1.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFactors {
    pub market_demand_multiplier: Option<Decimal>,
    pub seasonal_multiplier: Option<Decimal>,
    pub complexity_multiplier: Option<Decimal>,
}

impl ContextFactors {
    pub fn market_demand(&self) -> Decimal {
        self.market_demand_multiplier.unwrap_or(Decimal::ONE)
    }

    pub fn seasonal(&self) -> Decimal {
        self.seasonal_multiplier.unwrap_or(Decimal::ONE)
    }

    pub fn complexity(&self) -> Decimal {
        self.complexity_multiplier.unwrap_or(Decimal::ONE)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipliersApplied {
    pub urgency: Decimal,
    pub market_demand: Decimal,
    pub seasonal: Decimal,
    pub complexity: Decimal,
}

impl MultipliersApplied {
    pub fn combined(&self) -> Decimal {
        self.urgency * self.market_demand * self.seasonal * self.complexity
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRange {
    pub low: Decimal,
    pub high: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

/// A priced, time-bounded estimate. Never edited after creation; a new quote
/// replaces an old one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub rule_id: PricingRuleId,
    pub device_id: DeviceId,
    pub repair_type_id: RepairTypeId,
    pub currency: String,
    pub parts_cost: Decimal,
    pub labor_cost: Decimal,
    pub total_cost: Decimal,
    pub urgency: UrgencyLevel,
    pub multipliers_applied: MultipliersApplied,
    pub cost_range: CostRange,
    pub estimated_duration_minutes: u32,
    pub breakdown: Vec<PricingTraceStep>,
    pub generated_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl Quote {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.valid_until
    }
}
