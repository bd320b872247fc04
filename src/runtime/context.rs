//! ExecutionContext - per-run state threaded through every node
//!
//! Created by the root run, passed by reference to executors.
//! Cancellation is observed two ways:
//! - the `CancellationToken`, cancelled by a `CancelWatcher` on broadcast
//! - the durable flag, polled at checkpoints for late joiners

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::warn;

use crate::error::{FlowError, Result};
use crate::event::EventLog;
use crate::signal::{CancelSignalStore, MemorySignalStore};

/// Execution mode of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMode {
    #[default]
    Normal,
    Debug,
    NodeDebug,
}

impl ExecuteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecuteMode::Normal => "normal",
            ExecuteMode::Debug => "debug",
            ExecuteMode::NodeDebug => "node_debug",
        }
    }
}

impl fmt::Display for ExecuteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecuteMode {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "normal" => Ok(ExecuteMode::Normal),
            "debug" => Ok(ExecuteMode::Debug),
            "node_debug" => Ok(ExecuteMode::NodeDebug),
            other => Err(FlowError::InvalidInput {
                reason: format!("unknown execute mode '{other}'"),
            }),
        }
    }
}

/// Per-run state: identity, mode, cancellation capability, audit trail
#[derive(Clone)]
pub struct ExecutionContext {
    execution_id: i64,
    mode: ExecuteMode,
    operator: i64,
    token: CancellationToken,
    signals: Arc<dyn CancelSignalStore>,
    event_log: EventLog,
}

impl ExecutionContext {
    pub fn new(execution_id: i64, signals: Arc<dyn CancelSignalStore>) -> Self {
        Self {
            execution_id,
            mode: ExecuteMode::Normal,
            operator: 0,
            token: CancellationToken::new(),
            signals,
            event_log: EventLog::new(),
        }
    }

    /// Context backed by a fresh in-process signal store
    pub fn in_memory(execution_id: i64) -> Self {
        Self::new(execution_id, Arc::new(MemorySignalStore::new()))
    }

    pub fn with_mode(mut self, mode: ExecuteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_operator(mut self, operator: i64) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_event_log(mut self, event_log: EventLog) -> Self {
        self.event_log = event_log;
        self
    }

    pub fn execution_id(&self) -> i64 {
        self.execution_id
    }

    pub fn mode(&self) -> ExecuteMode {
        self.mode
    }

    pub fn operator(&self) -> i64 {
        self.operator
    }

    /// Debug and node-debug runs
    pub fn is_debug(&self) -> bool {
        matches!(self.mode, ExecuteMode::Debug | ExecuteMode::NodeDebug)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn signals(&self) -> &Arc<dyn CancelSignalStore> {
        &self.signals
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Safe point: fail with `Cancelled` if cancellation was requested
    ///
    /// A store error here is logged and treated as "not cancelled".
    pub async fn checkpoint(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(self.cancelled_error());
        }

        match self.signals.get_flag(self.execution_id).await {
            Ok(true) => {
                self.token.cancel();
                Err(self.cancelled_error())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                warn!(execution_id = self.execution_id, error = %e, "cancel flag check failed");
                Ok(())
            }
        }
    }

    /// Race `fut` against the token
    pub async fn run_cancellable<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(self.cancelled_error()),
            result = fut => result,
        }
    }

    pub fn cancelled_error(&self) -> FlowError {
        FlowError::Cancelled {
            execution_id: self.execution_id,
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("execution_id", &self.execution_id)
            .field("mode", &self.mode)
            .field("operator", &self.operator)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn debug_modes() {
        let ctx = ExecutionContext::in_memory(1);
        assert!(!ctx.is_debug());
        assert!(ctx.clone().with_mode(ExecuteMode::Debug).is_debug());
        assert!(ctx.with_mode(ExecuteMode::NodeDebug).is_debug());
    }

    #[test]
    fn mode_parses_cli_spellings() {
        assert_eq!("node-debug".parse::<ExecuteMode>().unwrap(), ExecuteMode::NodeDebug);
        assert_eq!("Debug".parse::<ExecuteMode>().unwrap(), ExecuteMode::Debug);
        assert!("fast".parse::<ExecuteMode>().is_err());
    }

    #[tokio::test]
    async fn checkpoint_sees_durable_flag() {
        let store = Arc::new(MemorySignalStore::new());
        let ctx = ExecutionContext::new(5, store.clone());
        ctx.checkpoint().await.unwrap();

        store.emit_cancel(5).await.unwrap();
        let err = ctx.checkpoint().await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn run_cancellable_aborts_in_flight_work() {
        let ctx = ExecutionContext::in_memory(6);
        let token = ctx.token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let result: Result<()> = ctx
            .run_cancellable(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn run_cancellable_passes_through_result() {
        let ctx = ExecutionContext::in_memory(7);
        let value = ctx.run_cancellable(async { Ok(41 + 1) }).await.unwrap();
        assert_eq!(value, 42);
    }
}
