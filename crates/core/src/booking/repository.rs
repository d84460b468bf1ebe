use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::ticket::{RepairTicket, TicketId};
use crate::errors::ApplicationError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TicketStoreError {
    #[error("ticket {0} already exists")]
    Duplicate(TicketId),
    #[error("ticket {0} not found")]
    Missing(TicketId),
    #[error("ticket {ticket_id} version conflict: expected v{expected}, found v{actual}")]
    VersionConflict { ticket_id: TicketId, expected: u32, actual: u32 },
    #[error("ticket store failure: {0}")]
    Backend(String),
}

impl From<TicketStoreError> for ApplicationError {
    fn from(value: TicketStoreError) -> Self {
        match value {
            TicketStoreError::Missing(ticket_id) => Self::NotFound(ticket_id),
            TicketStoreError::VersionConflict { ticket_id, expected, actual } => {
                Self::Conflict { ticket_id, expected, actual }
            }
            TicketStoreError::Duplicate(_) | TicketStoreError::Backend(_) => {
                Self::Persistence(value.to_string())
            }
        }
    }
}

/// Durable ticket storage.
///
/// `update` is a compare-and-swap: it persists `ticket` only when the stored
/// version still equals `expected_version`, appending any history entries the
/// stored copy does not have yet.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn find_by_id(&self, id: &TicketId) -> Result<Option<RepairTicket>, TicketStoreError>;
    async fn insert(&self, ticket: &RepairTicket) -> Result<(), TicketStoreError>;
    async fn update(
        &self,
        ticket: &RepairTicket,
        expected_version: u32,
    ) -> Result<(), TicketStoreError>;
}

#[derive(Default)]
pub struct InMemoryTicketRepository {
    tickets: RwLock<HashMap<String, RepairTicket>>,
}

impl InMemoryTicketRepository {
    pub async fn len(&self) -> usize {
        self.tickets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tickets.read().await.is_empty()
    }
}

#[async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn find_by_id(&self, id: &TicketId) -> Result<Option<RepairTicket>, TicketStoreError> {
        let tickets = self.tickets.read().await;
        Ok(tickets.get(&id.0).cloned())
    }

    async fn insert(&self, ticket: &RepairTicket) -> Result<(), TicketStoreError> {
        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&ticket.id.0) {
            return Err(TicketStoreError::Duplicate(ticket.id.clone()));
        }
        tickets.insert(ticket.id.0.clone(), ticket.clone());
        Ok(())
    }

    async fn update(
        &self,
        ticket: &RepairTicket,
        expected_version: u32,
    ) -> Result<(), TicketStoreError> {
        let mut tickets = self.tickets.write().await;
        let stored = tickets
            .get_mut(&ticket.id.0)
            .ok_or_else(|| TicketStoreError::Missing(ticket.id.clone()))?;
        if stored.version != expected_version {
            return Err(TicketStoreError::VersionConflict {
                ticket_id: ticket.id.clone(),
                expected: expected_version,
                actual: stored.version,
            });
        }
        *stored = ticket.clone();
        Ok(())
    }
}
