//! Roll Keeper - initiative tracker for tabletop sessions
//!
//! Core modules:
//! - `initiative`: Turn-order resolution (d20 + modifier, reroll tie-break)
//! - `persistence`: Named save slots over a key/value store
//! - `roster`: Participants and the coordinator tying signals to storage
//! - `events`: Typed synchronous event bus
//! - `platform`: Browser/native platform abstraction
//! - `settings`: Session configuration

pub mod events;
pub mod initiative;
pub mod persistence;
pub mod platform;
pub mod roster;
pub mod settings;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use events::{Event, EventBus, Signal};
pub use initiative::{ResolutionEngine, RollOutcome};
pub use persistence::{PersistError, SaveSlot, SlotRegistry};
pub use roster::{Player, PlayerId, Roster, RosterCoordinator};
pub use settings::{Settings, SettingsError};

/// Session defaults
pub mod consts {
    /// Key prefix when none is configured
    pub const DEFAULT_NAMESPACE: &str = "default";
    /// Slot used on first run
    pub const DEFAULT_SLOT: &str = "default";
    /// Initiative die
    pub const FACES_ON_DIE: u32 = 20;
    /// Quiet period before a coalesced write (ms)
    pub const DEBOUNCE_MS: u64 = 500;
    /// Placeholder participants in a fresh slot
    pub const DEFAULT_ROSTER_SIZE: usize = 5;
    /// Die color of a new participant (0xRRGGBB)
    pub const DEFAULT_DIE_COLOR: u32 = 0xff00ff;
}
