use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use reviva_core::SharedCatalog;
use reviva_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    catalog: SharedCatalog,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub catalog: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, catalog: SharedCatalog) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, catalog })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let catalog = catalog_check(&state.catalog);
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "reviva-server runtime initialized".to_string(),
        },
        database,
        catalog,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

// An empty catalog still serves ticket reads, so it does not fail readiness.
fn catalog_check(catalog: &SharedCatalog) -> HealthCheck {
    let snapshot = catalog.snapshot();
    let detail = format!(
        "{} devices, {} repair types, {} pricing rules",
        snapshot.device_count(),
        snapshot.repair_type_count(),
        snapshot.rule_count()
    );
    let status = if snapshot.rule_count() == 0 { "empty" } else { "ready" };
    HealthCheck { status, detail }
}
