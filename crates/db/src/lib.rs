pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, DbPool};
pub use fixtures::{CatalogSeedDataset, SeedResult, VerificationResult};
pub use repositories::{
    CatalogRepository, InMemoryTicketRepository, RepositoryError, SqlCatalogRepository,
    SqlTicketRepository,
};
