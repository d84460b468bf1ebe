use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::catalog::{Device, DeviceId, PricingRule, RepairType, RepairTypeId};

pub trait CatalogProvider: Send + Sync {
    fn find_device(&self, id: &DeviceId) -> Option<Device>;
    fn find_repair_type(&self, id: &RepairTypeId) -> Option<RepairType>;
}

/// Source of pricing rules for a (device, repair type) pair.
///
/// Implementations return every rule that could apply: rules pinned to
/// `device_id` and generic rules for the repair type. Selection happens in
/// the calculator.
pub trait PricingRuleProvider: Send + Sync {
    fn find_pricing_rules(
        &self,
        device_id: &DeviceId,
        repair_type_id: &RepairTypeId,
    ) -> Vec<PricingRule>;
}

/// Immutable, in-memory view of the catalog and rule tables.
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    devices: HashMap<DeviceId, Device>,
    repair_types: HashMap<RepairTypeId, RepairType>,
    rules: Vec<PricingRule>,
}

impl CatalogSnapshot {
    pub fn new(
        devices: impl IntoIterator<Item = Device>,
        repair_types: impl IntoIterator<Item = RepairType>,
        rules: impl IntoIterator<Item = PricingRule>,
    ) -> Self {
        Self {
            devices: devices.into_iter().map(|device| (device.id.clone(), device)).collect(),
            repair_types: repair_types
                .into_iter()
                .map(|repair_type| (repair_type.id.clone(), repair_type))
                .collect(),
            rules: rules.into_iter().collect(),
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn repair_type_count(&self) -> usize {
        self.repair_types.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl CatalogProvider for CatalogSnapshot {
    fn find_device(&self, id: &DeviceId) -> Option<Device> {
        self.devices.get(id).cloned()
    }

    fn find_repair_type(&self, id: &RepairTypeId) -> Option<RepairType> {
        self.repair_types.get(id).cloned()
    }
}

impl PricingRuleProvider for CatalogSnapshot {
    fn find_pricing_rules(
        &self,
        device_id: &DeviceId,
        repair_type_id: &RepairTypeId,
    ) -> Vec<PricingRule> {
        self.rules
            .iter()
            .filter(|rule| &rule.repair_type_id == repair_type_id)
            .filter(|rule| rule.device_id.as_ref().map(|id| id == device_id).unwrap_or(true))
            .cloned()
            .collect()
    }
}

/// Swappable handle to the current snapshot.
///
/// Readers take an `Arc` to the snapshot that was current when they asked, so
/// a refresh never changes the rules underneath an in-flight calculation.
#[derive(Clone, Default)]
pub struct SharedCatalog {
    current: Arc<RwLock<Arc<CatalogSnapshot>>>,
}

impl SharedCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self { current: Arc::new(RwLock::new(Arc::new(snapshot))) }
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        match self.current.read() {
            Ok(current) => Arc::clone(&*current),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    pub fn replace(&self, snapshot: CatalogSnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.current.write() {
            Ok(mut current) => *current = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

impl CatalogProvider for SharedCatalog {
    fn find_device(&self, id: &DeviceId) -> Option<Device> {
        self.snapshot().find_device(id)
    }

    fn find_repair_type(&self, id: &RepairTypeId) -> Option<RepairType> {
        self.snapshot().find_repair_type(id)
    }
}

impl PricingRuleProvider for SharedCatalog {
    fn find_pricing_rules(
        &self,
        device_id: &DeviceId,
        repair_type_id: &RepairTypeId,
    ) -> Vec<PricingRule> {
        self.snapshot().find_pricing_rules(device_id, repair_type_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{CatalogProvider, CatalogSnapshot, PricingRuleProvider, SharedCatalog};
    use crate::domain::catalog::{DeviceId, RepairTypeId};
    use crate::test_support::{catalog_fixture, generic_rule};

    #[test]
    fn rule_lookup_returns_device_and_generic_rules_for_repair_type() {
        let catalog = catalog_fixture();
        let rules = catalog.find_pricing_rules(
            &DeviceId("macbook-air-m3".to_owned()),
            &RepairTypeId("screen-repair".to_owned()),
        );

        let ids: Vec<&str> = rules.iter().map(|rule| rule.id.0.as_str()).collect();
        assert_eq!(ids, vec!["rule-mba-m3-screen", "rule-generic-screen"]);
    }

    #[test]
    fn rule_lookup_excludes_rules_pinned_to_other_devices() {
        let catalog = catalog_fixture();
        let rules = catalog.find_pricing_rules(
            &DeviceId("iphone-15".to_owned()),
            &RepairTypeId("screen-repair".to_owned()),
        );

        assert!(rules.iter().all(|rule| rule.device_id.is_none()));
    }

    #[test]
    fn shared_catalog_replace_does_not_disturb_existing_snapshot_holders() {
        let shared = SharedCatalog::new(catalog_fixture());
        let before = shared.snapshot();

        shared.replace(CatalogSnapshot::new(
            Vec::new(),
            Vec::new(),
            vec![generic_rule("rule-only", "screen-repair", 10, 10)],
        ));

        assert_eq!(before.rule_count(), catalog_fixture().rule_count());
        assert_eq!(shared.snapshot().rule_count(), 1);
        assert!(shared.find_device(&DeviceId("macbook-air-m3".to_owned())).is_none());
        assert!(before.find_device(&DeviceId("macbook-air-m3".to_owned())).is_some());
    }
}
