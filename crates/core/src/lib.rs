pub mod audit;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod pricing;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use booking::{
    BookingService, CreateBookingRequest, InMemoryTicketRepository, ReissueQuoteRequest,
    TicketRepository, TicketStoreError, UpdateStatusRequest,
};
pub use catalog::{CatalogProvider, CatalogSnapshot, PricingRuleProvider, SharedCatalog};
pub use domain::catalog::{
    Device, DeviceCategory, DeviceId, DifficultyTier, PricingRule, PricingRuleId, RepairType,
    RepairTypeId, YearRange,
};
pub use domain::quote::{ContextFactors, Quote, QuoteId, UrgencyLevel};
pub use domain::ticket::{ActorId, CustomerId, RepairTicket, TicketId, TicketStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use events::{DomainEvent, EventDispatcher, EventSink, EventSinkError, TracingEventSink};
pub use pricing::{
    QuoteCalculator, QuoteEngine, QuoteError, QuotePolicy, QuoteRequest, SnapshotQuoteEngine,
};
pub use workflow::{TicketStateMachine, TransitionError, TransitionOutcome, WorkflowAction};
