use std::str::FromStr;
use std::time::Duration;

use reviva_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the ticket store described by `database`.
///
/// Every connection enforces foreign keys and runs in WAL mode, so readers
/// keep a consistent snapshot while a status update commits. A missing
/// database file is created.
pub async fn connect(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let url = match database.url.trim() {
        ":memory:" => "sqlite::memory:",
        url => url,
    };
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(database.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(database.timeout_secs.max(1)))
        .connect_with(options)
        .await
}

/// Private in-memory store on a single connection.
#[cfg(test)]
pub(crate) fn in_memory() -> DatabaseConfig {
    DatabaseConfig { url: "sqlite::memory:".to_owned(), max_connections: 1, timeout_secs: 30 }
}
