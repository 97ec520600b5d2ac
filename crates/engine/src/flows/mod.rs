//! Trigger-activated automation flows.

pub mod interpreter;
pub mod matcher;

pub use interpreter::{FlowInterpreter, FlowRun, StepFailure};
pub use matcher::{select_flow, FlowTriggerMatcher};
