//! Periodic reload of the pricing catalog.
//!
//! Quotes always price against the snapshot that was current when they
//! started; a reload only affects calculations that begin after the swap.

use std::sync::Arc;
use std::time::Duration;

use reviva_core::SharedCatalog;
use reviva_db::repositories::{CatalogRepository, RepositoryError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Loads the catalog tables and swaps the result into `catalog`.
///
/// A failed load leaves the current snapshot in place.
pub async fn refresh_catalog(
    repository: &dyn CatalogRepository,
    catalog: &SharedCatalog,
) -> Result<(), RepositoryError> {
    let snapshot = repository.load_snapshot().await?;
    let previous_rules = catalog.snapshot().rule_count();
    let rules = snapshot.rule_count();
    let devices = snapshot.device_count();
    catalog.replace(snapshot);

    if rules != previous_rules {
        info!(
            event_name = "system.catalog.refreshed",
            correlation_id = "catalog-refresh",
            devices,
            previous_rules,
            pricing_rules = rules,
            "pricing catalog reloaded"
        );
    } else {
        debug!(
            event_name = "system.catalog.refreshed",
            correlation_id = "catalog-refresh",
            devices,
            pricing_rules = rules,
            "pricing catalog reloaded"
        );
    }
    Ok(())
}

/// Reloads the catalog every `period` until the returned task is aborted.
pub fn spawn_catalog_refresh(
    repository: Arc<dyn CatalogRepository>,
    catalog: SharedCatalog,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately and bootstrap has just loaded
        interval.tick().await;

        loop {
            interval.tick().await;
            if let Err(error) = refresh_catalog(repository.as_ref(), &catalog).await {
                warn!(
                    event_name = "system.catalog.refresh_failed",
                    correlation_id = "catalog-refresh",
                    error = %error,
                    "pricing catalog reload failed; keeping the previous snapshot"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use reviva_core::domain::catalog::{Device, PricingRule, RepairType};
    use reviva_core::{CatalogSnapshot, SharedCatalog};
    use reviva_db::repositories::{CatalogRepository, RepositoryError};

    use super::{refresh_catalog, spawn_catalog_refresh};

    struct UnavailableCatalog;

    #[async_trait]
    impl CatalogRepository for UnavailableCatalog {
        async fn load_snapshot(&self) -> Result<CatalogSnapshot, RepositoryError> {
            Err(RepositoryError::Decode("catalog tables unavailable".to_owned()))
        }

        async fn save_device(&self, _device: &Device) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn save_repair_type(&self, _repair_type: &RepairType) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn save_pricing_rule(&self, _rule: &PricingRule) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_reload_keeps_the_previous_snapshot() {
        let catalog = SharedCatalog::new(CatalogSnapshot::default());
        let before = catalog.snapshot();

        let error = refresh_catalog(&UnavailableCatalog, &catalog).await.expect_err("load fails");

        assert!(error.to_string().contains("unavailable"));
        assert!(Arc::ptr_eq(&before, &catalog.snapshot()));
    }

    #[tokio::test]
    async fn refresh_task_survives_failures_until_aborted() {
        let catalog = SharedCatalog::new(CatalogSnapshot::default());
        let task =
            spawn_catalog_refresh(Arc::new(UnavailableCatalog), catalog, Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!task.is_finished());

        task.abort();
        assert!(task.await.expect_err("aborted").is_cancelled());
    }
}
