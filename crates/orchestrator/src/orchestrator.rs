use alloy_primitives::U256;
use thiserror::Error;
use tracing::{debug, error, info};
use yield_engine_solver::{Settlement, SolveError, Solver};
use yield_engine_types::{Direction, ExecutionRequest};

use crate::status::{StatusSlot, TxPhase};

/// Sequences allowance, approval, and execution for any solver, with no
/// venue-specific branching in calling code.
///
/// One orchestrator owns one logical action slot; concurrent user actions
/// (different vaults) each get their own orchestrator. Within a request the
/// ordering is strict: the allowance check precedes any approval, and an
/// approval is observably confirmed before execution is attempted.
pub struct ExecutionOrchestrator {
    status: StatusSlot,
}

impl ExecutionOrchestrator {
    pub fn new() -> Self {
        Self {
            status: StatusSlot::new(),
        }
    }

    pub async fn phase(&self) -> TxPhase {
        self.status.phase().await
    }

    /// Return a settled slot to idle so the user can re-initiate the action.
    pub async fn reset(&self) -> Result<(), OrchestratorError> {
        self.status
            .reset()
            .await
            .map_err(|_| OrchestratorError::InFlight)
    }

    /// Run one request to a terminal phase against `solver`.
    ///
    /// Refused without side effects while a previous execution is pending.
    pub async fn execute(
        &self,
        solver: &dyn Solver,
        request: &ExecutionRequest,
    ) -> Result<Settlement, OrchestratorError> {
        self.status
            .begin()
            .await
            .map_err(|_| OrchestratorError::InFlight)?;

        info!(
            venue = ?solver.venue(),
            direction = ?request.direction,
            chain_id = request.chain_id,
            amount = %request.amount,
            "starting execution"
        );

        match self.run(solver, request).await {
            Ok(settlement) => {
                self.status.finish_success().await;
                info!(venue = ?solver.venue(), "execution settled");
                Ok(settlement)
            }
            Err(err) => {
                error!(venue = ?solver.venue(), error = %err, "execution failed");
                self.status.finish_error(err.kind()).await;
                Err(OrchestratorError::Solve(err))
            }
        }
    }

    async fn run(
        &self,
        solver: &dyn Solver,
        request: &ExecutionRequest,
    ) -> Result<Settlement, SolveError> {
        // Validates the request and guarantees a fresh quote for execution.
        solver.init(request).await?;

        let allowance = solver.retrieve_allowance(request, false).await?;
        if allowance.raw() < request.amount {
            info!(
                needed = %request.amount,
                available = %allowance.raw(),
                "allowance insufficient, requesting approval"
            );
            // Max approval avoids repeat transactions; execution only
            // proceeds once the approval is confirmed.
            solver.approve(request, U256::MAX).await?;
        } else {
            debug!(available = %allowance.raw(), "allowance sufficient, skipping approval");
        }

        match request.direction {
            Direction::Deposit => solver.execute_deposit(request).await,
            Direction::Withdraw => solver.execute_withdraw(request).await,
        }
    }
}

impl Default for ExecutionOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("an execution is already in flight for this action")]
    InFlight,

    #[error(transparent)]
    Solve(#[from] SolveError),
}
