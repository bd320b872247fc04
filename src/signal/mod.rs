//! Signal Module - Cancellation Signal Store
//!
//! - `store`: `CancelSignalStore` trait, `CancelSubscription`, wire keys
//! - `memory`: In-process implementation (DashMap + tokio broadcast)
//! - `watcher`: `CancelWatcher`, subscription → `CancellationToken`
//!
//! Wire format per execution id:
//! ```text
//! workflow:cancel:status:<id>   "cancelled", 24h TTL (durable flag)
//! workflow:cancel:signal:<id>   empty payload (live broadcast)
//! ```

mod memory;
mod store;
mod watcher;

pub use memory::MemorySignalStore;
pub use store::{
    signal_channel, status_key, CancelSignalStore, CancelSubscription, CANCELLED_STATUS,
};
pub use watcher::CancelWatcher;
