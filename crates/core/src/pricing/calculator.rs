use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::catalog::{CatalogProvider, PricingRuleProvider, SharedCatalog};
use crate::domain::catalog::PricingRule;
use crate::domain::quote::{
    ContextFactors, MultipliersApplied, PricingTraceStep, Quote, QuoteId,
};
use crate::pricing::money::{cost_range, round2};
use crate::pricing::rules::select_rule;
use crate::pricing::{QuoteError, QuotePolicy, QuoteRequest, ReferenceKind};

pub trait QuoteEngine: Send + Sync {
    fn quote_at(&self, request: &QuoteRequest, now: DateTime<Utc>) -> Result<Quote, QuoteError>;

    fn quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError> {
        self.quote_at(request, Utc::now())
    }
}

/// Quote engine over an injected catalog and rule source.
#[derive(Clone, Debug)]
pub struct QuoteCalculator<C> {
    catalog: C,
    policy: QuotePolicy,
}

impl<C> QuoteCalculator<C> {
    pub fn new(catalog: C, policy: QuotePolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn policy(&self) -> &QuotePolicy {
        &self.policy
    }
}

impl<C> QuoteEngine for QuoteCalculator<C>
where
    C: CatalogProvider + PricingRuleProvider,
{
    fn quote_at(&self, request: &QuoteRequest, now: DateTime<Utc>) -> Result<Quote, QuoteError> {
        calculate_quote_at(&self.catalog, &self.policy, request, now)
    }
}

/// Quote engine over a refreshable catalog. Each calculation pins the
/// snapshot that is current when it starts.
#[derive(Clone)]
pub struct SnapshotQuoteEngine {
    catalog: SharedCatalog,
    policy: QuotePolicy,
}

impl SnapshotQuoteEngine {
    pub fn new(catalog: SharedCatalog, policy: QuotePolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }
}

impl QuoteEngine for SnapshotQuoteEngine {
    fn quote_at(&self, request: &QuoteRequest, now: DateTime<Utc>) -> Result<Quote, QuoteError> {
        let snapshot = self.catalog.snapshot();
        calculate_quote_at(snapshot.as_ref(), &self.policy, request, now)
    }
}

pub fn calculate_quote<C>(
    catalog: &C,
    policy: &QuotePolicy,
    request: &QuoteRequest,
) -> Result<Quote, QuoteError>
where
    C: CatalogProvider + PricingRuleProvider,
{
    calculate_quote_at(catalog, policy, request, Utc::now())
}

/// Prices a repair. Pure over the supplied catalog state and `now`.
///
/// Only labor is scaled by urgency and the context multipliers; parts are
/// passed through at their base cost.
pub fn calculate_quote_at<C>(
    catalog: &C,
    policy: &QuotePolicy,
    request: &QuoteRequest,
    now: DateTime<Utc>,
) -> Result<Quote, QuoteError>
where
    C: CatalogProvider + PricingRuleProvider,
{
    catalog.find_device(&request.device_id).ok_or_else(|| QuoteError::UnknownReference {
        kind: ReferenceKind::Device,
        id: request.device_id.0.clone(),
    })?;
    let repair_type = catalog.find_repair_type(&request.repair_type_id).ok_or_else(|| {
        QuoteError::UnknownReference {
            kind: ReferenceKind::RepairType,
            id: request.repair_type_id.0.clone(),
        }
    })?;
    validate_factors(&request.context)?;

    let rules = catalog.find_pricing_rules(&request.device_id, &request.repair_type_id);
    let rule = select_rule(&rules, &request.device_id, &request.repair_type_id, now).ok_or_else(
        || QuoteError::NoPricingRule {
            device_id: request.device_id.0.clone(),
            repair_type_id: request.repair_type_id.0.clone(),
        },
    )?;

    let multipliers = MultipliersApplied {
        urgency: request.urgency.multiplier(),
        market_demand: request.context.market_demand(),
        seasonal: request.context.seasonal(),
        complexity: request.context.complexity(),
    };

    let mut breakdown = Vec::with_capacity(7);
    let labor_cost = scale_labor(rule, &multipliers, request, &mut breakdown)?;
    let parts_cost = rule.base_parts_cost;
    breakdown.push(PricingTraceStep {
        stage: "parts".to_owned(),
        detail: "base parts cost (not urgency-scaled)".to_owned(),
        amount: parts_cost,
    });

    let total_cost = parts_cost
        .checked_add(labor_cost)
        .map(round2)
        .ok_or(QuoteError::PriceOverflow { stage: "total" })?;
    breakdown.push(PricingTraceStep {
        stage: "total".to_owned(),
        detail: "round_half_up(parts + labor, 2)".to_owned(),
        amount: total_cost,
    });

    Ok(Quote {
        id: QuoteId(format!("Q-{}", Uuid::new_v4())),
        rule_id: rule.id.clone(),
        device_id: request.device_id.clone(),
        repair_type_id: request.repair_type_id.clone(),
        currency: policy.currency.clone(),
        parts_cost,
        labor_cost,
        total_cost,
        urgency: request.urgency,
        multipliers_applied: multipliers,
        cost_range: cost_range(total_cost)?,
        estimated_duration_minutes: repair_type.base_labor_minutes,
        breakdown,
        generated_at: now,
        valid_until: now + policy.ttl,
    })
}

fn validate_factors(context: &ContextFactors) -> Result<(), QuoteError> {
    let factors = [
        ("market_demand_multiplier", context.market_demand_multiplier),
        ("seasonal_multiplier", context.seasonal_multiplier),
        ("complexity_multiplier", context.complexity_multiplier),
    ];

    for (factor, value) in factors {
        if let Some(value) = value.filter(|value| *value < Decimal::ZERO) {
            return Err(QuoteError::InvalidFactor { factor, value });
        }
    }

    Ok(())
}

fn scale_labor(
    rule: &PricingRule,
    multipliers: &MultipliersApplied,
    request: &QuoteRequest,
    breakdown: &mut Vec<PricingTraceStep>,
) -> Result<Decimal, QuoteError> {
    let scope = if rule.is_device_specific() { "device-specific" } else { "generic" };
    let mut labor = rule.base_labor_cost;
    breakdown.push(PricingTraceStep {
        stage: "base_labor".to_owned(),
        detail: format!("{scope} rule {}", rule.id.0),
        amount: labor,
    });

    let steps = [
        ("urgency", multipliers.urgency, request.urgency.as_str()),
        ("market_demand", multipliers.market_demand, "caller supplied"),
        ("seasonal", multipliers.seasonal, "caller supplied"),
        ("complexity", multipliers.complexity, "caller supplied"),
    ];
    for (stage, multiplier, source) in steps {
        labor = labor.checked_mul(multiplier).ok_or(QuoteError::PriceOverflow { stage })?;
        breakdown.push(PricingTraceStep {
            stage: stage.to_owned(),
            detail: format!("x{multiplier} ({source})"),
            amount: labor,
        });
    }

    Ok(labor)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use crate::catalog::{CatalogSnapshot, SharedCatalog};
    use crate::domain::quote::{ContextFactors, UrgencyLevel};
    use crate::pricing::money::round2;
    use crate::pricing::{
        calculate_quote_at, QuoteCalculator, QuoteEngine, QuoteError, QuotePolicy, QuoteRequest,
        ReferenceKind, SnapshotQuoteEngine,
    };
    use crate::test_support::{catalog_fixture, device_rule, devices, generic_rule, repair_types};

    fn screen_repair(urgency: UrgencyLevel) -> QuoteRequest {
        QuoteRequest::new("macbook-air-m3", "screen-repair", urgency)
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 10, 30, 0).unwrap()
    }

    #[test]
    fn standard_screen_repair_prices_parts_plus_labor() {
        let quote = calculate_quote_at(
            &catalog_fixture(),
            &QuotePolicy::default(),
            &screen_repair(UrgencyLevel::Standard),
            now(),
        )
        .expect("quote");

        assert_eq!(quote.labor_cost, Decimal::new(4000, 2));
        assert_eq!(quote.parts_cost, Decimal::new(8900, 2));
        assert_eq!(quote.total_cost, Decimal::new(12900, 2));
        assert_eq!(quote.currency, "GBP");
        assert_eq!(quote.rule_id.0, "rule-mba-m3-screen");
    }

    #[test]
    fn urgent_service_scales_labor_only() {
        let quote = calculate_quote_at(
            &catalog_fixture(),
            &QuotePolicy::default(),
            &screen_repair(UrgencyLevel::Urgent),
            now(),
        )
        .expect("quote");

        assert_eq!(quote.labor_cost, Decimal::new(6000, 2));
        assert_eq!(quote.parts_cost, Decimal::new(8900, 2));
        assert_eq!(quote.total_cost, Decimal::new(14900, 2));
        assert_eq!(quote.multipliers_applied.urgency, Decimal::new(15, 1));
    }

    #[test]
    fn parts_cost_is_invariant_under_urgency() {
        let catalog = catalog_fixture();
        let policy = QuotePolicy::default();
        let parts: Vec<Decimal> = UrgencyLevel::ALL
            .iter()
            .map(|urgency| {
                calculate_quote_at(&catalog, &policy, &screen_repair(*urgency), now())
                    .expect("quote")
                    .parts_cost
            })
            .collect();

        assert!(parts.iter().all(|cost| *cost == Decimal::new(8900, 2)));
    }

    #[test]
    fn labor_scales_linearly_with_each_context_multiplier() {
        let catalog = catalog_fixture();
        let policy = QuotePolicy::default();
        let base = calculate_quote_at(&catalog, &policy, &screen_repair(UrgencyLevel::High), now())
            .expect("base quote");

        let doubled = |context: ContextFactors| {
            calculate_quote_at(
                &catalog,
                &policy,
                &screen_repair(UrgencyLevel::High).with_context(context),
                now(),
            )
            .expect("scaled quote")
            .labor_cost
        };

        let two = Some(Decimal::TWO);
        let expected = base.labor_cost * Decimal::TWO;
        assert_eq!(
            doubled(ContextFactors { market_demand_multiplier: two, ..ContextFactors::default() }),
            expected
        );
        assert_eq!(
            doubled(ContextFactors { seasonal_multiplier: two, ..ContextFactors::default() }),
            expected
        );
        assert_eq!(
            doubled(ContextFactors { complexity_multiplier: two, ..ContextFactors::default() }),
            expected
        );
    }

    #[test]
    fn total_is_rounded_half_up_sum_of_parts_and_labor() {
        let rules = vec![device_rule("odd", "macbook-air-m3", "screen-repair", 10, 10)];
        let catalog = CatalogSnapshot::new(devices(), repair_types(), rules);
        let request = screen_repair(UrgencyLevel::Standard).with_context(ContextFactors {
            market_demand_multiplier: Some(Decimal::new(10_005, 4)),
            ..ContextFactors::default()
        });

        let quote = calculate_quote_at(&catalog, &QuotePolicy::default(), &request, now())
            .expect("quote");

        assert_eq!(quote.labor_cost, Decimal::new(100_050, 4));
        assert_eq!(quote.total_cost, Decimal::new(2_001, 2));
        assert_eq!(quote.total_cost, round2(quote.parts_cost + quote.labor_cost));
    }

    #[test]
    fn repeated_calculation_is_deterministic() {
        let catalog = catalog_fixture();
        let policy = QuotePolicy::default();
        let request = screen_repair(UrgencyLevel::Emergency).with_context(ContextFactors {
            market_demand_multiplier: Some(Decimal::new(113, 2)),
            seasonal_multiplier: Some(Decimal::new(97, 2)),
            complexity_multiplier: Some(Decimal::new(125, 2)),
        });

        let first = calculate_quote_at(&catalog, &policy, &request, now()).expect("first");
        let second = calculate_quote_at(&catalog, &policy, &request, now()).expect("second");

        assert_eq!(first.total_cost, second.total_cost);
        assert_eq!(first.labor_cost, second.labor_cost);
        assert_eq!(first.breakdown, second.breakdown);
    }

    #[test]
    fn quote_expires_after_policy_ttl() {
        let quote = calculate_quote_at(
            &catalog_fixture(),
            &QuotePolicy::default(),
            &screen_repair(UrgencyLevel::Standard),
            now(),
        )
        .expect("quote");

        assert_eq!(quote.generated_at, now());
        assert_eq!(quote.valid_until, now() + Duration::hours(24));
        assert!(quote.is_valid_at(now() + Duration::hours(24)));
        assert!(!quote.is_valid_at(now() + Duration::hours(24) + Duration::seconds(1)));
    }

    #[test]
    fn unknown_device_is_rejected() {
        let error = calculate_quote_at(
            &catalog_fixture(),
            &QuotePolicy::default(),
            &QuoteRequest::new("toaster-3000", "screen-repair", UrgencyLevel::Standard),
            now(),
        )
        .expect_err("unknown device");

        assert_eq!(
            error,
            QuoteError::UnknownReference {
                kind: ReferenceKind::Device,
                id: "toaster-3000".to_owned()
            }
        );
    }

    #[test]
    fn unknown_repair_type_is_rejected() {
        let error = calculate_quote_at(
            &catalog_fixture(),
            &QuotePolicy::default(),
            &QuoteRequest::new("macbook-air-m3", "flux-capacitor", UrgencyLevel::Standard),
            now(),
        )
        .expect_err("unknown repair type");

        assert!(matches!(
            error,
            QuoteError::UnknownReference { kind: ReferenceKind::RepairType, .. }
        ));
    }

    #[test]
    fn negative_factor_is_rejected() {
        let request = screen_repair(UrgencyLevel::Standard).with_context(ContextFactors {
            seasonal_multiplier: Some(Decimal::new(-1, 1)),
            ..ContextFactors::default()
        });
        let policy = QuotePolicy::default();

        let error = calculate_quote_at(&catalog_fixture(), &policy, &request, now())
            .expect_err("negative factor");

        assert_eq!(
            error,
            QuoteError::InvalidFactor { factor: "seasonal_multiplier", value: Decimal::new(-1, 1) }
        );
    }

    #[test]
    fn zero_factor_is_accepted() {
        let request = screen_repair(UrgencyLevel::Standard).with_context(ContextFactors {
            complexity_multiplier: Some(Decimal::ZERO),
            ..ContextFactors::default()
        });
        let policy = QuotePolicy::default();

        let quote = calculate_quote_at(&catalog_fixture(), &policy, &request, now())
            .expect("zero factor is non-negative");

        assert_eq!(quote.labor_cost, Decimal::ZERO);
        assert_eq!(quote.total_cost, Decimal::new(8900, 2));
    }

    #[test]
    fn oversized_factor_is_reported_as_overflow() {
        let request = screen_repair(UrgencyLevel::Emergency).with_context(ContextFactors {
            market_demand_multiplier: Some(Decimal::MAX),
            ..ContextFactors::default()
        });

        let error = calculate_quote_at(&catalog_fixture(), &QuotePolicy::default(), &request, now())
            .expect_err("overflow");

        assert_eq!(error, QuoteError::PriceOverflow { stage: "market_demand" });
    }

    #[test]
    fn overflow_in_the_total_is_reported() {
        let mut rule = device_rule("huge", "macbook-air-m3", "screen-repair", 1, 1);
        rule.base_parts_cost = Decimal::MAX;
        let catalog = CatalogSnapshot::new(devices(), repair_types(), vec![rule]);

        let error = calculate_quote_at(
            &catalog,
            &QuotePolicy::default(),
            &screen_repair(UrgencyLevel::Standard),
            now(),
        )
        .expect_err("overflow");

        assert_eq!(error, QuoteError::PriceOverflow { stage: "total" });
    }

    #[test]
    fn missing_rule_is_reported() {
        let catalog = CatalogSnapshot::new(devices(), repair_types(), Vec::new());

        let error = calculate_quote_at(
            &catalog,
            &QuotePolicy::default(),
            &screen_repair(UrgencyLevel::Standard),
            now(),
        )
        .expect_err("no rule");

        assert!(matches!(error, QuoteError::NoPricingRule { .. }));
    }

    #[test]
    fn generic_rule_prices_devices_without_override() {
        let rules = vec![generic_rule("rule-generic-battery", "battery-replacement", 45, 35)];
        let catalog = CatalogSnapshot::new(devices(), repair_types(), rules);
        let calculator = QuoteCalculator::new(catalog, QuotePolicy::new("GBP", 48));

        let quote = calculator
            .quote_at(
                &QuoteRequest::new("iphone-15", "battery-replacement", UrgencyLevel::Standard),
                now(),
            )
            .expect("quote");

        assert_eq!(quote.total_cost, Decimal::new(80, 0));
        assert_eq!(quote.valid_until, now() + Duration::hours(48));
        assert_eq!(quote.breakdown.first().map(|step| step.stage.as_str()), Some("base_labor"));
        assert!(quote.breakdown[0].detail.starts_with("generic rule"));
    }

    #[test]
    fn snapshot_engine_prices_against_the_latest_catalog() {
        let shared = SharedCatalog::new(catalog_fixture());
        let engine = SnapshotQuoteEngine::new(shared.clone(), QuotePolicy::default());

        let before = engine.quote_at(&screen_repair(UrgencyLevel::Standard), now()).expect("quote");
        assert_eq!(before.total_cost, Decimal::new(12900, 2));

        shared.replace(CatalogSnapshot::new(
            devices(),
            repair_types(),
            vec![device_rule("rule-mba-m3-screen-v2", "macbook-air-m3", "screen-repair", 99, 45)],
        ));

        let after = engine.quote_at(&screen_repair(UrgencyLevel::Standard), now()).expect("quote");
        assert_eq!(after.total_cost, Decimal::new(14400, 2));
        assert_eq!(after.rule_id.0, "rule-mba-m3-screen-v2");
    }
}
