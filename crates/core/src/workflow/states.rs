use serde::{Deserialize, Serialize};

use crate::domain::ticket::{RepairTicket, TicketStatus};
use crate::events::StatusChanged;

/// Legal successors of each status. Terminal states have none.
pub fn allowed_targets(from: TicketStatus) -> &'static [TicketStatus] {
    use TicketStatus::{
        Approved, Cancelled, Completed, Diagnosing, Quoted, Received, Repairing, Testing,
    };

    match from {
        Received => &[Diagnosing, Cancelled],
        Diagnosing => &[Quoted, Cancelled],
        Quoted => &[Approved, Cancelled],
        Approved => &[Repairing, Cancelled],
        Repairing => &[Testing, Cancelled],
        // failed QA sends the device back for rework
        Testing => &[Completed, Repairing, Cancelled],
        Completed | Cancelled => &[],
    }
}

pub fn can_transition(from: TicketStatus, to: TicketStatus) -> bool {
    allowed_targets(from).contains(&to)
}

/// Follow-up work implied by entering a status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    NotifyCustomer,
    RequestQuoteApproval,
    ScheduleTechnician,
    RecordQaFailure,
    ScheduleCollection,
    ReleaseReservedParts,
}

pub(crate) fn actions_for(from: TicketStatus, to: TicketStatus) -> Vec<WorkflowAction> {
    use WorkflowAction::{
        NotifyCustomer, RecordQaFailure, ReleaseReservedParts, RequestQuoteApproval,
        ScheduleCollection, ScheduleTechnician,
    };

    use TicketStatus::{
        Approved, Cancelled, Completed, Diagnosing, Quoted, Received, Repairing, Testing,
    };

    match (from, to) {
        (Testing, Repairing) => vec![RecordQaFailure],
        (_, Diagnosing) => vec![NotifyCustomer],
        (_, Quoted) => vec![NotifyCustomer, RequestQuoteApproval],
        (_, Approved) => vec![ScheduleTechnician],
        (_, Repairing) => vec![NotifyCustomer],
        (_, Testing) => Vec::new(),
        (_, Completed) => vec![NotifyCustomer, ScheduleCollection],
        (Approved | Repairing | Testing, Cancelled) => vec![NotifyCustomer, ReleaseReservedParts],
        (_, Cancelled) => vec![NotifyCustomer],
        (_, Received) => Vec::new(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub ticket: RepairTicket,
    pub event: StatusChanged,
    pub actions: Vec<WorkflowAction>,
}
