//! CancelWatcher - binds a store subscription to a CancellationToken

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;

use super::store::CancelSignalStore;

/// Background task cancelling `token` when the execution's signal arrives
///
/// The subscription is opened before the flag is checked, so a cancellation
/// emitted between the two is seen by at least one path. Dropping the
/// watcher stops the task and releases the subscription.
pub struct CancelWatcher {
    handle: JoinHandle<()>,
}

impl CancelWatcher {
    pub async fn spawn(
        store: Arc<dyn CancelSignalStore>,
        execution_id: i64,
        token: CancellationToken,
    ) -> Result<Self> {
        let mut subscription = store.subscribe(execution_id).await?;

        if store.get_flag(execution_id).await? {
            info!(execution_id, "execution already cancelled");
            token.cancel();
        }

        let handle = tokio::spawn(async move {
            tokio::select! {
                received = subscription.recv() => {
                    if received {
                        debug!(execution_id, "cancel broadcast received");
                        token.cancel();
                    }
                }
                _ = token.cancelled() => {}
            }
            subscription.close();
        });

        Ok(Self { handle })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CancelWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
