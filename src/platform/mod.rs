//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Durable key/value storage (LocalStorage on web, JSON file natively)
//! - Time (for debounced writes)

pub mod storage;
pub mod time;

#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorage;
#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStore;
pub use storage::{KeyValueStore, MemoryStore, StoreError};
pub use time::{Clock, ManualClock, SystemClock};
