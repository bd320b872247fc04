//! CancelSignalStore trait and subscription handle

use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::Result;

/// Value written under the status key
pub const CANCELLED_STATUS: &str = "cancelled";

/// Durable status key for an execution
pub fn status_key(execution_id: i64) -> String {
    format!("workflow:cancel:status:{execution_id}")
}

/// Broadcast channel name for an execution
pub fn signal_channel(execution_id: i64) -> String {
    format!("workflow:cancel:signal:{execution_id}")
}

/// Cross-process cancellation: a durable flag plus a live broadcast
///
/// The flag lets late joiners discover a past cancellation, the broadcast
/// lets live subscribers react without polling.
#[async_trait]
pub trait CancelSignalStore: Send + Sync {
    /// Set the status flag (bounded TTL) then publish an empty message
    async fn emit_cancel(&self, execution_id: i64) -> Result<()>;

    /// Open a subscription; it is registered before this returns
    async fn subscribe(&self, execution_id: i64) -> Result<CancelSubscription>;

    /// Point-in-time check of the status flag
    async fn get_flag(&self, execution_id: i64) -> Result<bool>;

    /// Release store-wide resources at shutdown
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

type Release = Box<dyn FnOnce() + Send + Sync>;

/// Live subscription to one execution's cancel channel
///
/// Released on `close()` or on drop, whichever comes first.
pub struct CancelSubscription {
    execution_id: i64,
    receiver: Option<broadcast::Receiver<()>>,
    release: Option<Release>,
}

impl CancelSubscription {
    pub fn new(
        execution_id: i64,
        receiver: broadcast::Receiver<()>,
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            execution_id,
            receiver: Some(receiver),
            release: Some(Box::new(release)),
        }
    }

    pub fn execution_id(&self) -> i64 {
        self.execution_id
    }

    /// Wait for the next signal
    ///
    /// `true` when a cancellation was published, `false` when the channel
    /// closed or the subscription was released.
    pub async fn recv(&mut self) -> bool {
        let Some(receiver) = self.receiver.as_mut() else {
            return false;
        };
        match receiver.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => true,
            Err(RecvError::Closed) => false,
        }
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        // receiver must go first so the store sees an accurate subscriber count
        self.receiver.take();
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for CancelSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CancelSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSubscription")
            .field("execution_id", &self.execution_id)
            .field("open", &self.receiver.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn keys_follow_wire_format() {
        assert_eq!(status_key(42), "workflow:cancel:status:42");
        assert_eq!(signal_channel(-1), "workflow:cancel:signal:-1");
    }

    #[test]
    fn release_runs_once_on_close() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = broadcast::channel(1);
        let counter = Arc::clone(&calls);
        let sub = CancelSubscription::new(1, rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sub.close();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_runs_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = broadcast::channel(1);
        let counter = Arc::clone(&calls);
        {
            let _sub = CancelSubscription::new(1, rx, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recv_reports_closed_channel() {
        let (tx, rx) = broadcast::channel(1);
        let mut sub = CancelSubscription::new(1, rx, || {});
        drop(tx);
        assert!(!sub.recv().await);
    }
}
