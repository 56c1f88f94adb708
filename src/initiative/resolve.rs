//! Initiative resolution
//!
//! One round:
//! 1. every participant clears `reroll` and rolls `face + modifier`
//! 2. stable sort, highest roll first
//! 3. left-to-right scan of adjacent pairs; an exact tie rerolls both until
//!    the rerolls differ, and the higher reroll takes the earlier seat
//!
//! Step 3 only looks at adjacent pairs once. In a tie of three or more the
//! earlier pair is not re-checked after a later swap, so the final order of
//! such a group is only pairwise resolved.

use serde::Serialize;

use super::dice::DieSource;
use crate::consts::FACES_ON_DIE;
use crate::roster::{Player, PlayerId};

/// Display record of one resolved participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollOutcome {
    pub uuid: PlayerId,
    pub name: String,
    pub roll: Option<i32>,
    pub reroll: Option<i32>,
}

impl From<&Player> for RollOutcome {
    fn from(player: &Player) -> Self {
        Self {
            uuid: player.uuid().clone(),
            name: player.name.clone(),
            roll: player.roll,
            reroll: player.reroll,
        }
    }
}

/// Resolves a roster into a strict turn order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionEngine {
    faces: u32,
}

impl Default for ResolutionEngine {
    fn default() -> Self {
        Self { faces: FACES_ON_DIE }
    }
}

impl ResolutionEngine {
    /// A reroll loop only terminates if two draws can differ
    pub const MIN_FACES: u32 = 2;

    pub fn new(faces: u32) -> Self {
        if faces < Self::MIN_FACES {
            log::warn!(
                "Die with {} faces cannot break ties, using {}",
                faces,
                Self::MIN_FACES
            );
        }
        Self {
            faces: faces.max(Self::MIN_FACES),
        }
    }

    pub fn faces(&self) -> u32 {
        self.faces
    }

    /// One draw for `player`: raw face plus modifier
    pub fn draw(&self, player: &Player, die: &mut dyn DieSource) -> i32 {
        let face = i32::try_from(die.face(player, self.faces)).unwrap_or(i32::MAX);
        face.saturating_add(player.modifier)
    }

    /// Run a full round over `players`, reordering them into initiative
    /// order. `roll` and `reroll` stay set for display.
    ///
    /// The reroll loop has no iteration cap. It ends almost surely because
    /// draws are independent over at least two faces.
    pub fn resolve(&self, players: &mut [Player], die: &mut dyn DieSource) {
        for player in players.iter_mut() {
            player.reroll = None;
            player.roll = Some(self.draw(player, die));
        }

        players.sort_by(|a, b| b.roll.cmp(&a.roll));

        for i in 0..players.len().saturating_sub(1) {
            if players[i].roll != players[i + 1].roll {
                continue;
            }

            let (head, tail) = players.split_at_mut(i + 1);
            let earlier = &mut head[i];
            let later = &mut tail[0];

            let mut rounds = 0u32;
            loop {
                rounds += 1;
                earlier.reroll = Some(self.draw(earlier, die));
                later.reroll = Some(self.draw(later, die));
                if earlier.reroll != later.reroll {
                    break;
                }
            }
            log::debug!(
                "Tie at {:?} between {} and {} settled after {} reroll(s)",
                earlier.roll,
                earlier.uuid(),
                later.uuid(),
                rounds
            );

            if later.reroll > earlier.reroll {
                players.swap(i, i + 1);
            }
        }
    }
}
