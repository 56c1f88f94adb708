//! Turn-order resolution
//!
//! Randomness enters only through a `DieSource`, so a seeded source or a
//! scripted one makes every round reproducible.

pub mod dice;
pub mod resolve;

pub use dice::{DieSource, PcgDie, ScriptedDie, seeded_rng};
pub use resolve::{ResolutionEngine, RollOutcome};
