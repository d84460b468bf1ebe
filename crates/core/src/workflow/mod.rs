pub mod machine;
pub mod states;

pub use machine::{transition, TicketStateMachine, TransitionError};
pub use states::{allowed_targets, can_transition, TransitionOutcome, WorkflowAction};
