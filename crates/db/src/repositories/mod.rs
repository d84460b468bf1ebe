use async_trait::async_trait;
use thiserror::Error;

use reviva_core::booking::TicketStoreError;
use reviva_core::catalog::CatalogSnapshot;
use reviva_core::domain::catalog::{Device, PricingRule, RepairType};

pub mod catalog;
pub mod ticket;

pub use catalog::SqlCatalogRepository;
pub use reviva_core::booking::{InMemoryTicketRepository, TicketRepository};
pub use ticket::SqlTicketRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Ticket(#[from] TicketStoreError),
}

impl From<RepositoryError> for TicketStoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Ticket(inner) => inner,
            other => TicketStoreError::Backend(other.to_string()),
        }
    }
}

/// Catalog and pricing-rule tables. Reads produce a whole snapshot so a
/// refresh swaps every table at once.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn load_snapshot(&self) -> Result<CatalogSnapshot, RepositoryError>;
    async fn save_device(&self, device: &Device) -> Result<(), RepositoryError>;
    async fn save_repair_type(&self, repair_type: &RepairType) -> Result<(), RepositoryError>;
    async fn save_pricing_rule(&self, rule: &PricingRule) -> Result<(), RepositoryError>;
}
