use thiserror::Error;
use tokio::sync::Mutex;
use yield_engine_solver::ErrorKind;

/// Phase of the single in-flight action an orchestrator tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxPhase {
    Idle,
    Pending,
    Success,
    Error(ErrorKind),
}

impl TxPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxPhase::Success | TxPhase::Error(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("an execution is already pending for this action slot")]
    Busy,
}

/// Guarded status slot for one logical action.
///
/// Only one execution may be pending at a time. Beginning a new action from
/// a terminal phase consumes the previous result and re-enters `Pending`;
/// beginning while `Pending` is refused.
pub struct StatusSlot {
    phase: Mutex<TxPhase>,
}

impl StatusSlot {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(TxPhase::Idle),
        }
    }

    pub async fn phase(&self) -> TxPhase {
        *self.phase.lock().await
    }

    pub async fn begin(&self) -> Result<(), StatusError> {
        let mut phase = self.phase.lock().await;
        if *phase == TxPhase::Pending {
            return Err(StatusError::Busy);
        }
        *phase = TxPhase::Pending;
        Ok(())
    }

    pub async fn finish_success(&self) {
        *self.phase.lock().await = TxPhase::Success;
    }

    pub async fn finish_error(&self, kind: ErrorKind) {
        *self.phase.lock().await = TxPhase::Error(kind);
    }

    /// Return a settled slot to `Idle`; refused while pending.
    pub async fn reset(&self) -> Result<(), StatusError> {
        let mut phase = self.phase.lock().await;
        if *phase == TxPhase::Pending {
            return Err(StatusError::Busy);
        }
        *phase = TxPhase::Idle;
        Ok(())
    }
}

impl Default for StatusSlot {
    fn default() -> Self {
        Self::new()
    }
}
