//! Booking orchestration: quote, open, move and re-quote repair tickets.
//!
//! The service owns no state of its own. Tickets live behind a
//! [`TicketRepository`]; events are handed to an [`EventDispatcher`] after the
//! repository write succeeds, so notification trouble never undoes a change.

pub mod repository;

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::catalog::{DeviceId, RepairTypeId};
use crate::domain::quote::{ContextFactors, Quote, UrgencyLevel};
use crate::domain::ticket::{ActorId, CustomerId, RepairTicket, TicketId, TicketStatus};
use crate::errors::{ApplicationError, DomainError};
use crate::events::{new_event_id, BookingCreated, DomainEvent, EventDispatcher, QuoteReissued};
use crate::pricing::{QuoteEngine, QuoteRequest};
use crate::workflow::{can_transition, TicketStateMachine, TransitionError, TransitionOutcome};

pub use repository::{InMemoryTicketRepository, TicketRepository, TicketStoreError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub customer_id: CustomerId,
    pub device_id: DeviceId,
    pub repair_type_id: RepairTypeId,
    pub urgency: UrgencyLevel,
    #[serde(default)]
    pub context: ContextFactors,
}

impl CreateBookingRequest {
    pub fn quote_request(&self) -> QuoteRequest {
        QuoteRequest {
            device_id: self.device_id.clone(),
            repair_type_id: self.repair_type_id.clone(),
            urgency: self.urgency,
            context: self.context.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub ticket_id: TicketId,
    pub target: TicketStatus,
    pub actor: ActorId,
    pub notes: Option<String>,
    pub notify_customer: bool,
    pub expected_version: Option<u32>,
}

impl UpdateStatusRequest {
    pub fn new(ticket_id: TicketId, target: TicketStatus, actor: ActorId) -> Self {
        Self { ticket_id, target, actor, notes: None, notify_customer: true, expected_version: None }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn expecting_version(mut self, version: u32) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn without_notification(mut self) -> Self {
        self.notify_customer = false;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReissueQuoteRequest {
    pub ticket_id: TicketId,
    pub urgency: UrgencyLevel,
    #[serde(default)]
    pub context: ContextFactors,
    pub actor: ActorId,
}

pub struct BookingService<E, R> {
    engine: E,
    repository: R,
    dispatcher: EventDispatcher,
    machine: TicketStateMachine,
    audit: Option<Arc<dyn AuditSink>>,
}

impl<E, R> BookingService<E, R>
where
    E: QuoteEngine,
    R: TicketRepository,
{
    pub fn new(engine: E, repository: R, dispatcher: EventDispatcher) -> Self {
        Self { engine, repository, dispatcher, machine: TicketStateMachine::new(), audit: None }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn calculate_quote(&self, request: &QuoteRequest) -> Result<Quote, ApplicationError> {
        Ok(self.engine.quote(request)?)
    }

    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
        correlation_id: &str,
    ) -> Result<RepairTicket, ApplicationError> {
        let now = Utc::now();
        let quote = self.engine.quote_at(&request.quote_request(), now)?;
        let opened_by = ActorId(request.customer_id.0.clone());
        let ticket = RepairTicket::open(
            TicketId::generate(),
            request.customer_id,
            quote,
            opened_by.clone(),
            now,
        );

        self.repository.insert(&ticket).await?;

        let total_cost = ticket.active_quote.as_ref().map(|quote| quote.total_cost);
        info!(
            event_name = "booking.created",
            correlation_id,
            ticket_id = %ticket.id,
            device_id = %ticket.device_id.0,
            repair_type_id = %ticket.repair_type_id.0,
            urgency = ticket.urgency.as_str(),
            total_cost = ?total_cost,
            "repair ticket opened"
        );
        self.record_audit(
            &ticket.id,
            correlation_id,
            &opened_by,
            "booking.created",
            AuditCategory::Booking,
        );

        if let Some(quote) = &ticket.active_quote {
            let event = DomainEvent::BookingCreated(BookingCreated {
                event_id: new_event_id(),
                ticket_id: ticket.id.clone(),
                customer_id: ticket.customer_id.clone(),
                device_id: ticket.device_id.clone(),
                repair_type_id: ticket.repair_type_id.clone(),
                quote_id: quote.id.clone(),
                total_cost: quote.total_cost,
                currency: quote.currency.clone(),
                occurred_at: now,
            });
            self.dispatcher.dispatch(&event, correlation_id);
        }

        Ok(ticket)
    }

    pub async fn update_status(
        &self,
        request: UpdateStatusRequest,
        correlation_id: &str,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let now = Utc::now();
        let ticket = self.load(&request.ticket_id).await?;

        if let Some(expected) = request.expected_version {
            if expected != ticket.version {
                return Err(ApplicationError::Conflict {
                    ticket_id: ticket.id,
                    expected,
                    actual: ticket.version,
                });
            }
        }

        // illegal or terminal moves fall through to the state machine's error
        if request.target == TicketStatus::Approved
            && can_transition(ticket.current_status, request.target)
        {
            let quote = ticket.active_quote.as_ref().ok_or_else(|| {
                DomainError::InvariantViolation(format!("ticket {} has no active quote", ticket.id))
            })?;
            if !quote.is_valid_at(now) {
                return Err(DomainError::QuoteExpired {
                    ticket_id: ticket.id.clone(),
                    quote_id: quote.id.clone(),
                    valid_until: quote.valid_until,
                }
                .into());
            }
        }

        let outcome = match &self.audit {
            Some(sink) => self.machine.transition_with_audit(
                &ticket,
                request.target,
                &request.actor,
                request.notes.clone(),
                now,
                sink.as_ref(),
                &AuditContext::new(
                    Some(ticket.id.clone()),
                    correlation_id,
                    request.actor.0.clone(),
                ),
            ),
            None => self.machine.transition(
                &ticket,
                request.target,
                &request.actor,
                request.notes.clone(),
                now,
            ),
        }?;

        self.repository.update(&outcome.ticket, ticket.version).await?;

        info!(
            event_name = "booking.status_updated",
            correlation_id,
            ticket_id = %ticket.id,
            from = ticket.current_status.as_str(),
            to = outcome.ticket.current_status.as_str(),
            version = outcome.ticket.version,
            actor = %request.actor.0,
            "repair ticket status updated"
        );

        if request.notify_customer {
            let event = DomainEvent::StatusChanged(outcome.event.clone());
            self.dispatcher.dispatch(&event, correlation_id);
        }

        Ok(outcome)
    }

    pub async fn reissue_quote(
        &self,
        request: ReissueQuoteRequest,
        correlation_id: &str,
    ) -> Result<RepairTicket, ApplicationError> {
        let now = Utc::now();
        let ticket = self.load(&request.ticket_id).await?;
        if ticket.is_terminal() {
            return Err(TransitionError::TerminalState {
                ticket_id: ticket.id,
                state: ticket.current_status,
            }
            .into());
        }

        let quote_request = QuoteRequest {
            device_id: ticket.device_id.clone(),
            repair_type_id: ticket.repair_type_id.clone(),
            urgency: request.urgency,
            context: request.context,
        };
        let quote = self.engine.quote_at(&quote_request, now)?;
        let version = ticket.version.checked_add(1).ok_or_else(|| {
            ApplicationError::Persistence(format!("ticket {} version counter exhausted", ticket.id))
        })?;

        let previous_quote_id = ticket.active_quote.as_ref().map(|quote| quote.id.clone());
        let mut updated = ticket.clone();
        updated.urgency = quote.urgency;
        updated.active_quote = Some(quote.clone());
        updated.version = version;
        updated.updated_at = now;

        self.repository.update(&updated, ticket.version).await?;

        info!(
            event_name = "booking.quote_reissued",
            correlation_id,
            ticket_id = %updated.id,
            quote_id = %quote.id.0,
            total_cost = %quote.total_cost,
            version = updated.version,
            "repair quote reissued"
        );
        self.record_audit(
            &updated.id,
            correlation_id,
            &request.actor,
            "booking.quote_reissued",
            AuditCategory::Pricing,
        );

        let event = DomainEvent::QuoteReissued(QuoteReissued {
            event_id: new_event_id(),
            ticket_id: updated.id.clone(),
            customer_id: updated.customer_id.clone(),
            previous_quote_id,
            quote_id: quote.id.clone(),
            total_cost: quote.total_cost,
            actor_id: request.actor,
            occurred_at: now,
        });
        self.dispatcher.dispatch(&event, correlation_id);

        Ok(updated)
    }

    pub async fn get_ticket(&self, ticket_id: &TicketId) -> Result<RepairTicket, ApplicationError> {
        self.load(ticket_id).await
    }

    async fn load(&self, ticket_id: &TicketId) -> Result<RepairTicket, ApplicationError> {
        self.repository
            .find_by_id(ticket_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(ticket_id.clone()))
    }

    fn record_audit(
        &self,
        ticket_id: &TicketId,
        correlation_id: &str,
        actor: &ActorId,
        event_type: &str,
        category: AuditCategory,
    ) {
        if let Some(sink) = &self.audit {
            let context =
                AuditContext::new(Some(ticket_id.clone()), correlation_id, actor.0.clone());
            sink.emit(AuditEvent::new(&context, event_type, category, AuditOutcome::Success));
        }
    }
}
