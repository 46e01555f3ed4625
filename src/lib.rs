//! Vault solver execution engine.
//!
//! Turns a user's deposit/withdraw intent into a venue-appropriate
//! settlement: direct vault calls, aggregator-routed zaps, or signed
//! off-chain intent orders, with allowance tracking, slippage protection,
//! and bounded polling handled uniformly by the orchestrator.
//!
//! This facade re-exports the workspace crates under one roof.

pub use yield_engine_config as config;
pub use yield_engine_orchestrator as orchestrator;
pub use yield_engine_ratelimit as ratelimit;
pub use yield_engine_solver as solver;
pub use yield_engine_types as types;
