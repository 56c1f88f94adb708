//! Save-slot persistence
//!
//! Features:
//! - Named slots stored as JSON under `<namespace>_<slot>`
//! - Active slot pointer under `<namespace>_active`
//! - Corrupt payloads kept as raw text instead of being discarded
//! - Trailing-edge write coalescing for bursts of edits

pub mod debounce;
pub mod error;
pub mod registry;
pub mod slot;

pub use debounce::{Debouncer, WriteState};
pub use error::PersistError;
pub use registry::{RegistryConfig, SlotRegistry};
pub use slot::{ACTIVE_SUFFIX, SaveSlot, SlotData, SlotState, active_key, storage_key};
