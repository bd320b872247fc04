//! In-process CancelSignalStore (DashMap + tokio broadcast)

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::util::constants::{CANCEL_CHANNEL_CAPACITY, CANCEL_FLAG_TTL};

use super::store::{
    signal_channel, status_key, CancelSignalStore, CancelSubscription, CANCELLED_STATUS,
};

#[derive(Debug, Clone)]
struct FlagEntry {
    value: &'static str,
    expires_at: Instant,
}

/// Cancel store living in the current process
///
/// Flags expire after their TTL and are swept on each emit; channels exist
/// only while subscribed.
#[derive(Clone)]
pub struct MemorySignalStore {
    flags: Arc<DashMap<String, FlagEntry>>,
    channels: Arc<DashMap<String, broadcast::Sender<()>>>,
    ttl: Duration,
}

impl MemorySignalStore {
    pub fn new() -> Self {
        Self::with_ttl(CANCEL_FLAG_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            flags: Arc::new(DashMap::new()),
            channels: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Remaining lifetime of an execution's flag
    pub fn flag_ttl(&self, execution_id: i64) -> Option<Duration> {
        let entry = self.flags.get(&status_key(execution_id))?;
        entry.expires_at.checked_duration_since(Instant::now())
    }

    /// Live subscribers on an execution's channel
    pub fn subscriber_count(&self, execution_id: i64) -> usize {
        self.channels
            .get(&signal_channel(execution_id))
            .map_or(0, |tx| tx.receiver_count())
    }
}

impl Default for MemorySignalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CancelSignalStore for MemorySignalStore {
    #[instrument(skip(self))]
    async fn emit_cancel(&self, execution_id: i64) -> Result<()> {
        let now = Instant::now();
        self.flags.retain(|_, entry| entry.expires_at > now);

        self.flags.insert(
            status_key(execution_id),
            FlagEntry {
                value: CANCELLED_STATUS,
                expires_at: now + self.ttl,
            },
        );

        // publishing with no subscribers is not an error
        let delivered = self
            .channels
            .get(&signal_channel(execution_id))
            .and_then(|tx| tx.send(()).ok())
            .unwrap_or(0);
        debug!(delivered, "cancel signal published");
        Ok(())
    }

    async fn subscribe(&self, execution_id: i64) -> Result<CancelSubscription> {
        let channel = signal_channel(execution_id);
        let receiver = self
            .channels
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(CANCEL_CHANNEL_CAPACITY).0)
            .subscribe();

        let channels = Arc::clone(&self.channels);
        Ok(CancelSubscription::new(execution_id, receiver, move || {
            channels.remove_if(&channel, |_, tx| tx.receiver_count() == 0);
        }))
    }

    async fn get_flag(&self, execution_id: i64) -> Result<bool> {
        let key = status_key(execution_id);
        let expired = match self.flags.get(&key) {
            Some(entry) => {
                debug_assert_eq!(entry.value, CANCELLED_STATUS);
                entry.expires_at <= Instant::now()
            }
            None => return Ok(false),
        };

        if expired {
            self.flags.remove(&key);
            return Ok(false);
        }
        Ok(true)
    }

    async fn shutdown(&self) -> Result<()> {
        // dropping the senders closes every live subscription
        self.channels.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flag_set_before_any_subscription() {
        let store = MemorySignalStore::new();
        store.emit_cancel(7).await.unwrap();

        assert!(store.get_flag(7).await.unwrap());
        assert!(!store.get_flag(8).await.unwrap());
    }

    #[tokio::test]
    async fn live_subscriber_receives_signal() {
        let store = MemorySignalStore::new();
        let mut sub = store.subscribe(1).await.unwrap();
        assert_eq!(store.subscriber_count(1), 1);

        store.emit_cancel(1).await.unwrap();
        assert!(sub.recv().await);
    }

    #[tokio::test]
    async fn late_subscriber_relies_on_flag() {
        let store = MemorySignalStore::new();
        store.emit_cancel(3).await.unwrap();

        let mut sub = store.subscribe(3).await.unwrap();
        let got = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
        assert!(got.is_err(), "past broadcast must not be replayed");
        assert!(store.get_flag(3).await.unwrap());
    }

    #[tokio::test]
    async fn subscription_released_on_close_and_drop() {
        let store = MemorySignalStore::new();
        let a = store.subscribe(5).await.unwrap();
        let b = store.subscribe(5).await.unwrap();
        assert_eq!(store.subscriber_count(5), 2);

        a.close();
        assert_eq!(store.subscriber_count(5), 1);

        drop(b);
        assert_eq!(store.subscriber_count(5), 0);
        assert!(store.channels.is_empty());
    }

    #[tokio::test]
    async fn flag_expires_after_ttl() {
        let store = MemorySignalStore::with_ttl(Duration::from_millis(20));
        store.emit_cancel(9).await.unwrap();
        assert!(store.get_flag(9).await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.get_flag(9).await.unwrap());
    }

    #[tokio::test]
    async fn emit_sweeps_expired_flags() {
        let store = MemorySignalStore::with_ttl(Duration::from_millis(1));
        for id in 0..1000 {
            store.emit_cancel(id).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        store.emit_cancel(5000).await.unwrap();
        assert_eq!(store.flags.len(), 1);
        assert!(!store.get_flag(0).await.unwrap());
    }

    #[tokio::test]
    async fn re_emit_refreshes_ttl() {
        let store = MemorySignalStore::with_ttl(Duration::from_millis(200));
        store.emit_cancel(2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let before = store.flag_ttl(2).unwrap();

        store.emit_cancel(2).await.unwrap();
        let after = store.flag_ttl(2).unwrap();
        assert!(after > before);
    }

    #[tokio::test]
    async fn shutdown_closes_subscriptions() {
        let store = MemorySignalStore::new();
        let mut sub = store.subscribe(4).await.unwrap();
        store.shutdown().await.unwrap();
        assert!(!sub.recv().await);
    }
}
