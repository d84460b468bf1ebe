pub mod calculator;
pub mod money;
pub mod rules;

use std::fmt;

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::catalog::{DeviceId, RepairTypeId};
use crate::domain::quote::{ContextFactors, UrgencyLevel};

pub use calculator::{
    calculate_quote, calculate_quote_at, QuoteCalculator, QuoteEngine, SnapshotQuoteEngine,
};

pub const DEFAULT_CURRENCY: &str = "GBP";
pub const DEFAULT_QUOTE_TTL_HOURS: u32 = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Device,
    RepairType,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device => f.write_str("device"),
            Self::RepairType => f.write_str("repair type"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QuoteError {
    #[error("unknown {kind} `{id}`")]
    UnknownReference { kind: ReferenceKind, id: String },
    #[error("invalid urgency level `{value}` (expected standard|high|urgent|emergency)")]
    InvalidUrgency { value: String },
    #[error("context factor `{factor}` must be non-negative, got {value}")]
    InvalidFactor { factor: &'static str, value: Decimal },
    #[error("no pricing rule for device `{device_id}` and repair type `{repair_type_id}`")]
    NoPricingRule { device_id: String, repair_type_id: String },
    #[error("price overflowed at the `{stage}` stage; check the context factors")]
    PriceOverflow { stage: &'static str },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub device_id: DeviceId,
    pub repair_type_id: RepairTypeId,
    pub urgency: UrgencyLevel,
    #[serde(default)]
    pub context: ContextFactors,
}

impl QuoteRequest {
    pub fn new(
        device_id: impl Into<String>,
        repair_type_id: impl Into<String>,
        urgency: UrgencyLevel,
    ) -> Self {
        Self {
            device_id: DeviceId(device_id.into()),
            repair_type_id: RepairTypeId(repair_type_id.into()),
            urgency,
            context: ContextFactors::default(),
        }
    }

    pub fn with_context(mut self, context: ContextFactors) -> Self {
        self.context = context;
        self
    }
}

/// Shop-wide quoting settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotePolicy {
    pub currency: String,
    pub ttl: Duration,
}

impl Default for QuotePolicy {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_owned(),
            ttl: Duration::hours(i64::from(DEFAULT_QUOTE_TTL_HOURS)),
        }
    }
}

impl QuotePolicy {
    pub fn new(currency: impl Into<String>, ttl_hours: u32) -> Self {
        Self { currency: currency.into(), ttl: Duration::hours(i64::from(ttl_hours)) }
    }
}
