use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::domain::catalog::{DeviceId, PricingRule, RepairTypeId};

/// Picks the rule that prices `(device_id, repair_type_id)` at `now`.
///
/// Only rules whose validity window contains `now` are considered. A rule
/// pinned to the device beats any generic rule; within a scope the latest
/// `created_at` wins, then the greater id.
pub fn select_rule<'a>(
    rules: &'a [PricingRule],
    device_id: &DeviceId,
    repair_type_id: &RepairTypeId,
    now: DateTime<Utc>,
) -> Option<&'a PricingRule> {
    let candidates = || {
        rules
            .iter()
            .filter(move |rule| &rule.repair_type_id == repair_type_id)
            .filter(move |rule| rule.is_active_at(now))
    };

    let device_specific =
        candidates().filter(|rule| rule.device_id.as_ref() == Some(device_id)).max_by(newest_first);

    device_specific
        .or_else(|| candidates().filter(|rule| rule.device_id.is_none()).max_by(newest_first))
}

fn newest_first(left: &&PricingRule, right: &&PricingRule) -> Ordering {
    left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::select_rule;
    use crate::domain::catalog::{DeviceId, RepairTypeId};
    use crate::test_support::{device_rule, generic_rule};

    fn ids() -> (DeviceId, RepairTypeId) {
        (DeviceId("macbook-air-m3".to_owned()), RepairTypeId("screen-repair".to_owned()))
    }

    #[test]
    fn device_specific_rule_beats_newer_generic_rule() {
        let (device, repair) = ids();
        let specific = device_rule("specific", "macbook-air-m3", "screen-repair", 89, 40);
        let mut generic = generic_rule("generic", "screen-repair", 60, 30);
        generic.created_at = specific.created_at + Duration::days(30);
        let rules = vec![generic, specific];

        let selected = select_rule(&rules, &device, &repair, Utc::now()).expect("rule selected");
        assert_eq!(selected.id.0, "specific");
    }

    #[test]
    fn falls_back_to_generic_when_no_device_rule_exists() {
        let (device, repair) = ids();
        let rules = vec![
            generic_rule("generic", "screen-repair", 60, 30),
            device_rule("other-device", "iphone-15", "screen-repair", 120, 40),
        ];

        let selected = select_rule(&rules, &device, &repair, Utc::now()).expect("rule selected");
        assert_eq!(selected.id.0, "generic");
    }

    #[test]
    fn most_recent_rule_wins_within_scope() {
        let (device, repair) = ids();
        let older = device_rule("older", "macbook-air-m3", "screen-repair", 89, 40);
        let mut newer = device_rule("newer", "macbook-air-m3", "screen-repair", 95, 45);
        newer.created_at = older.created_at + Duration::hours(1);
        let rules = vec![newer, older];

        let selected = select_rule(&rules, &device, &repair, Utc::now()).expect("rule selected");
        assert_eq!(selected.id.0, "newer");
    }

    #[test]
    fn equal_creation_time_breaks_tie_on_rule_id() {
        let (device, repair) = ids();
        let rules = vec![
            device_rule("rule-b", "macbook-air-m3", "screen-repair", 89, 40),
            device_rule("rule-a", "macbook-air-m3", "screen-repair", 89, 40),
        ];

        let selected = select_rule(&rules, &device, &repair, Utc::now()).expect("rule selected");
        assert_eq!(selected.id.0, "rule-b");
    }

    #[test]
    fn expired_device_rule_does_not_shadow_active_generic_rule() {
        let (device, repair) = ids();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut expired = device_rule("expired", "macbook-air-m3", "screen-repair", 89, 40);
        expired.valid_to = Some(now - Duration::days(1));
        let rules = vec![expired, generic_rule("generic", "screen-repair", 60, 30)];

        let selected = select_rule(&rules, &device, &repair, now).expect("rule selected");
        assert_eq!(selected.id.0, "generic");
    }

    #[test]
    fn future_rule_is_not_yet_applicable() {
        let (device, repair) = ids();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut future = device_rule("future", "macbook-air-m3", "screen-repair", 89, 40);
        future.valid_from = Some(now + Duration::days(7));

        assert!(select_rule(&[future], &device, &repair, now).is_none());
    }
}
