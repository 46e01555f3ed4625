//! Execution sequencing for the vault solver engine.
//!
//! The orchestrator owns one status slot per logical user action and drives
//! any [`yield_engine_solver::Solver`] through the same sequence: quote,
//! allowance check, approval when needed, then venue-specific execution.

pub mod orchestrator;
pub mod status;

pub use orchestrator::{ExecutionOrchestrator, OrchestratorError};
pub use status::{StatusError, StatusSlot, TxPhase};
