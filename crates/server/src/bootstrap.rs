use std::sync::Arc;
use std::time::Duration;

use reviva_core::config::AppConfig;
use reviva_core::{
    BookingService, EventDispatcher, SharedCatalog, SnapshotQuoteEngine, TracingAuditSink,
    TracingEventSink,
};
use reviva_db::repositories::{CatalogRepository, RepositoryError};
use reviva_db::{
    connect, migrations, DbPool, SqlCatalogRepository, SqlTicketRepository,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::notify::WebhookEventSink;
use crate::refresh::spawn_catalog_refresh;

pub type Booking = BookingService<SnapshotQuoteEngine, SqlTicketRepository>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub catalog: SharedCatalog,
    pub booking: Arc<Booking>,
    /// Background catalog reload; `None` when `pricing.catalog_refresh_secs` is 0.
    pub catalog_refresh: Option<JoinHandle<()>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("repair catalog could not be loaded: {0}")]
    Catalog(#[source] RepositoryError),
    #[error("webhook client could not be built: {0}")]
    Notifications(#[source] reqwest::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let catalog_repository = Arc::new(SqlCatalogRepository::new(db_pool.clone()));
    let snapshot = catalog_repository.load_snapshot().await.map_err(BootstrapError::Catalog)?;
    if snapshot.rule_count() == 0 {
        warn!(
            event_name = "system.bootstrap.catalog_empty",
            correlation_id = "bootstrap",
            "no pricing rules loaded; run `reviva seed` to load the reference catalog"
        );
    } else {
        info!(
            event_name = "system.bootstrap.catalog_loaded",
            correlation_id = "bootstrap",
            devices = snapshot.device_count(),
            repair_types = snapshot.repair_type_count(),
            pricing_rules = snapshot.rule_count(),
            "repair catalog loaded"
        );
    }
    let catalog = SharedCatalog::new(snapshot);

    let mut dispatcher = EventDispatcher::new().with_sink(Arc::new(TracingEventSink));
    if let Some(webhook) = WebhookEventSink::from_config(&config.notifications)
        .map_err(BootstrapError::Notifications)?
    {
        info!(
            event_name = "system.bootstrap.webhook_enabled",
            correlation_id = "bootstrap",
            url = webhook.url(),
            "webhook notifications enabled"
        );
        dispatcher = dispatcher.with_sink(Arc::new(webhook));
    }

    let engine = SnapshotQuoteEngine::new(catalog.clone(), config.pricing.quote_policy());
    let booking =
        BookingService::new(engine, SqlTicketRepository::new(db_pool.clone()), dispatcher)
            .with_audit_sink(Arc::new(TracingAuditSink));

    let catalog_refresh = match config.pricing.catalog_refresh_secs {
        0 => None,
        secs => {
            info!(
                event_name = "system.bootstrap.catalog_refresh_scheduled",
                correlation_id = "bootstrap",
                interval_secs = secs,
                "pricing catalog reload scheduled"
            );
            let period = Duration::from_secs(secs);
            Some(spawn_catalog_refresh(catalog_repository, catalog.clone(), period))
        }
    };

    Ok(Application { config, db_pool, catalog, booking: Arc::new(booking), catalog_refresh })
}
