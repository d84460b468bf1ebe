use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::ticket::{ActorId, RepairTicket, StatusHistoryEntry, TicketId, TicketStatus};
use crate::events::{new_event_id, StatusChanged};
use crate::workflow::states::{actions_for, can_transition, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("ticket {ticket_id} is in terminal state {state}")]
    TerminalState { ticket_id: TicketId, state: TicketStatus },
    #[error("ticket {ticket_id} cannot move from {from} to {to}")]
    IllegalTransition { ticket_id: TicketId, from: TicketStatus, to: TicketStatus },
    #[error("ticket {ticket_id} has exhausted its version counter")]
    VersionExhausted { ticket_id: TicketId },
}

/// Applies status changes to repair tickets.
///
/// The input ticket is never touched; a successful transition returns a new
/// ticket value together with the `StatusChanged` event and follow-up actions.
#[derive(Clone, Copy, Debug, Default)]
pub struct TicketStateMachine;

impl TicketStateMachine {
    pub fn new() -> Self {
        Self
    }

    pub fn initial_status(&self) -> TicketStatus {
        TicketStatus::Received
    }

    pub fn transition(
        &self,
        ticket: &RepairTicket,
        target: TicketStatus,
        actor: &ActorId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, TransitionError> {
        let from = ticket.current_status;
        if from.is_terminal() {
            return Err(TransitionError::TerminalState {
                ticket_id: ticket.id.clone(),
                state: from,
            });
        }
        if !can_transition(from, target) {
            return Err(TransitionError::IllegalTransition {
                ticket_id: ticket.id.clone(),
                from,
                to: target,
            });
        }

        let version = ticket
            .version
            .checked_add(1)
            .ok_or_else(|| TransitionError::VersionExhausted { ticket_id: ticket.id.clone() })?;

        let mut updated = ticket.clone();
        updated.status_history.push(StatusHistoryEntry {
            status: target,
            previous_status: Some(from),
            changed_by: actor.clone(),
            notes: notes.clone(),
            timestamp: now,
        });
        updated.current_status = target;
        if target == TicketStatus::Completed {
            updated.actual_completion_at = Some(now);
        }
        updated.version = version;
        updated.updated_at = now;

        let actions = actions_for(from, target);
        let event = StatusChanged {
            event_id: new_event_id(),
            ticket_id: updated.id.clone(),
            customer_id: updated.customer_id.clone(),
            previous_status: from,
            new_status: target,
            actor_id: actor.clone(),
            notes,
            actions: actions.clone(),
            occurred_at: now,
        };

        Ok(TransitionOutcome { ticket: updated, event, actions })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn transition_with_audit<S>(
        &self,
        ticket: &RepairTicket,
        target: TicketStatus,
        actor: &ActorId,
        notes: Option<String>,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, TransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.transition(ticket, target, actor, notes, now);
        match &result {
            Ok(outcome) => sink.emit(
                AuditEvent::new(
                    audit,
                    "ticket.transition_applied",
                    AuditCategory::Workflow,
                    AuditOutcome::Success,
                )
                .with_metadata("from", outcome.event.previous_status.as_str())
                .with_metadata("to", outcome.event.new_status.as_str())
                .with_metadata("version", outcome.ticket.version.to_string()),
            ),
            Err(error) => sink.emit(
                AuditEvent::new(
                    audit,
                    "ticket.transition_rejected",
                    AuditCategory::Workflow,
                    AuditOutcome::Rejected,
                )
                .with_metadata("from", ticket.current_status.as_str())
                .with_metadata("to", target.as_str())
                .with_metadata("error", error.to_string()),
            ),
        }
        result
    }
}

/// Convenience wrapper over [`TicketStateMachine::transition`] using the wall clock.
pub fn transition(
    ticket: &RepairTicket,
    target: TicketStatus,
    actor: &ActorId,
    notes: Option<String>,
) -> Result<TransitionOutcome, TransitionError> {
    TicketStateMachine.transition(ticket, target, actor, notes, Utc::now())
}
