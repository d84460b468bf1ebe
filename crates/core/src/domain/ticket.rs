use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::{DeviceId, RepairTypeId};
use crate::domain::quote::{Quote, UrgencyLevel};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub String);

impl TicketId {
    pub fn generate() -> Self {
        Self(format!("RT-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Received,
    Diagnosing,
    Quoted,
    Approved,
    Repairing,
    Testing,
    Completed,
    Cancelled,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 8] = [
        TicketStatus::Received,
        TicketStatus::Diagnosing,
        TicketStatus::Quoted,
        TicketStatus::Approved,
        TicketStatus::Repairing,
        TicketStatus::Testing,
        TicketStatus::Completed,
        TicketStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Diagnosing => "diagnosing",
            Self::Quoted => "quoted",
            Self::Approved => "approved",
            Self::Repairing => "repairing",
            Self::Testing => "testing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "received" => Some(Self::Received),
            "diagnosing" => Some(Self::Diagnosing),
            "quoted" => Some(Self::Quoted),
            "approved" => Some(Self::Approved),
            "repairing" => Some(Self::Repairing),
            "testing" => Some(Self::Testing),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: TicketStatus,
    pub previous_status: Option<TicketStatus>,
    pub changed_by: ActorId,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Durable record of a repair request.
///
/// `status_history` is append-only and its last entry always carries
/// `current_status`. `version` starts at 1 and increases with every persisted
/// change; repositories use it for compare-and-swap updates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairTicket {
    pub id: TicketId,
    pub customer_id: CustomerId,
    pub device_id: DeviceId,
    pub repair_type_id: RepairTypeId,
    pub urgency: UrgencyLevel,
    pub current_status: TicketStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub active_quote: Option<Quote>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub actual_completion_at: Option<DateTime<Utc>>,
}

impl RepairTicket {
    pub fn open(
        id: TicketId,
        customer_id: CustomerId,
        quote: Quote,
        opened_by: ActorId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_id,
            device_id: quote.device_id.clone(),
            repair_type_id: quote.repair_type_id.clone(),
            urgency: quote.urgency,
            current_status: TicketStatus::Received,
            status_history: vec![StatusHistoryEntry {
                status: TicketStatus::Received,
                previous_status: None,
                changed_by: opened_by,
                notes: None,
                timestamp: now,
            }],
            active_quote: Some(quote),
            version: 1,
            created_at: now,
            updated_at: now,
            actual_completion_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.current_status.is_terminal()
    }

    pub fn last_history_entry(&self) -> Option<&StatusHistoryEntry> {
        self.status_history.last()
    }

    pub fn check_invariants(&self) -> Result<(), DomainError> {
        let last = self.last_history_entry().ok_or_else(|| {
            DomainError::InvariantViolation(format!("ticket {} has no status history", self.id.0))
        })?;
        if last.status != self.current_status {
            return Err(DomainError::InvariantViolation(format!(
                "ticket {} status {} does not match last history entry {}",
                self.id.0,
                self.current_status.as_str(),
                last.status.as_str()
            )));
        }

        let completed = self.current_status == TicketStatus::Completed;
        if completed != self.actual_completion_at.is_some() {
            return Err(DomainError::InvariantViolation(format!(
                "ticket {} completion timestamp disagrees with status {}",
                self.id.0,
                self.current_status.as_str()
            )));
        }

        Ok(())
    }
}
