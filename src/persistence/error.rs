//! Persistence error taxonomy

use crate::platform::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Slot or key absent; callers usually fall back to a default
    #[error("no data stored under {key}")]
    NotFound { key: String },

    /// Payload present but not valid slot data
    #[error("payload under {key} is not valid slot data: {source}")]
    CorruptData {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Data could not be encoded even after dropping non-data fields
    #[error("slot data could not be serialized: {0}")]
    Serialization(String),

    /// Operation referenced a slot the registry does not track
    #[error("slot {0} is not tracked")]
    SlotNotFound(String),

    #[error("slot name must not be empty")]
    EmptySlotName,

    /// Name would collide with the active-slot pointer key
    #[error("slot name {0:?} is reserved")]
    ReservedSlotName(String),

    #[error("cannot set {path}: {reason}")]
    InvalidValue { path: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StoreError),
}
