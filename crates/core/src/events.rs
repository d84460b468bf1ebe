//! Domain events emitted by the booking core and the fan-out that hands them
//! to notification subscribers.
//!
//! Delivery is fire-and-forget: a failing sink is logged and skipped, and the
//! operation that produced the event has already been persisted.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::catalog::{DeviceId, RepairTypeId};
use crate::domain::quote::QuoteId;
use crate::domain::ticket::{ActorId, CustomerId, TicketId, TicketStatus};
use crate::workflow::WorkflowAction;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCreated {
    pub event_id: String,
    pub ticket_id: TicketId,
    pub customer_id: CustomerId,
    pub device_id: DeviceId,
    pub repair_type_id: RepairTypeId,
    pub quote_id: QuoteId,
    pub total_cost: Decimal,
    pub currency: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub event_id: String,
    pub ticket_id: TicketId,
    pub customer_id: CustomerId,
    pub previous_status: TicketStatus,
    pub new_status: TicketStatus,
    pub actor_id: ActorId,
    pub notes: Option<String>,
    pub actions: Vec<WorkflowAction>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteReissued {
    pub event_id: String,
    pub ticket_id: TicketId,
    pub customer_id: CustomerId,
    pub previous_quote_id: Option<QuoteId>,
    pub quote_id: QuoteId,
    pub total_cost: Decimal,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    BookingCreated(BookingCreated),
    StatusChanged(StatusChanged),
    QuoteReissued(QuoteReissued),
}

impl DomainEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::BookingCreated(_) => "booking.created",
            Self::StatusChanged(_) => "ticket.status_changed",
            Self::QuoteReissued(_) => "ticket.quote_reissued",
        }
    }

    pub fn ticket_id(&self) -> &TicketId {
        match self {
            Self::BookingCreated(event) => &event.ticket_id,
            Self::StatusChanged(event) => &event.ticket_id,
            Self::QuoteReissued(event) => &event.ticket_id,
        }
    }

    pub fn event_id(&self) -> &str {
        match self {
            Self::BookingCreated(event) => &event.event_id,
            Self::StatusChanged(event) => &event.event_id,
            Self::QuoteReissued(event) => &event.event_id,
        }
    }
}

pub(crate) fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EventSinkError {
    #[error("event sink unavailable: {0}")]
    Unavailable(String),
    #[error("event rejected by sink: {0}")]
    Rejected(String),
}

/// A downstream subscriber (email, SMS, CRM relay, websocket push).
///
/// `publish` must not block on remote delivery; sinks that talk to the
/// network hand the event off and return.
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;
    fn publish(&self, event: &DomainEvent) -> Result<(), EventSinkError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: Vec<String>,
}

#[derive(Clone, Default)]
pub struct EventDispatcher {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn dispatch(&self, event: &DomainEvent, correlation_id: &str) -> DispatchReport {
        let mut report = DispatchReport::default();
        for sink in &self.sinks {
            match sink.publish(event) {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    warn!(
                        event_name = "events.sink_failed",
                        correlation_id,
                        ticket_id = %event.ticket_id().0,
                        sink = sink.name(),
                        domain_event = event.event_name(),
                        error = %error,
                        "event sink failed; continuing"
                    );
                    report.failed.push(sink.name().to_owned());
                }
            }
        }
        report
    }
}

#[derive(Clone, Default)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl InMemoryEventSink {
    pub fn events(&self) -> Vec<DomainEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for InMemoryEventSink {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn publish(&self, event: &DomainEvent) -> Result<(), EventSinkError> {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn publish(&self, event: &DomainEvent) -> Result<(), EventSinkError> {
        info!(
            event_name = event.event_name(),
            event_id = event.event_id(),
            ticket_id = %event.ticket_id().0,
            "domain event published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::{
        DomainEvent, EventDispatcher, EventSink, EventSinkError, InMemoryEventSink,
        StatusChanged, TracingEventSink,
    };
    use crate::domain::ticket::{ActorId, CustomerId, TicketId, TicketStatus};
    use crate::workflow::WorkflowAction;

    struct FailingSink;

    impl EventSink for FailingSink {
        fn name(&self) -> &str {
            "sms_gateway"
        }

        fn publish(&self, _event: &DomainEvent) -> Result<(), EventSinkError> {
            Err(EventSinkError::Unavailable("gateway timeout".to_owned()))
        }
    }

    fn status_changed() -> DomainEvent {
        DomainEvent::StatusChanged(StatusChanged {
            event_id: "evt-1".to_owned(),
            ticket_id: TicketId("RT-1".to_owned()),
            customer_id: CustomerId("cust-1".to_owned()),
            previous_status: TicketStatus::Received,
            new_status: TicketStatus::Diagnosing,
            actor_id: ActorId("tech-7".to_owned()),
            notes: None,
            actions: vec![WorkflowAction::NotifyCustomer],
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn failing_sink_does_not_stop_delivery_to_others() {
        let recorder = InMemoryEventSink::default();
        let dispatcher = EventDispatcher::new()
            .with_sink(Arc::new(FailingSink))
            .with_sink(Arc::new(recorder.clone()))
            .with_sink(Arc::new(TracingEventSink));

        let report = dispatcher.dispatch(&status_changed(), "req-1");

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, vec!["sms_gateway".to_owned()]);
        let recorded = recorder.events();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].event_name(), "ticket.status_changed");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(status_changed()).expect("serialize");
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["new_status"], "diagnosing");
        assert_eq!(json["actions"][0], "notify_customer");
    }
}
