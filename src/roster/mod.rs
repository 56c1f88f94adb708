//! Roster and participant lifecycle
//!
//! - `player`: persisted participant records
//! - `coordinator`: bridges bus signals to the slot registry and the
//!   resolution engine

pub mod coordinator;
pub mod player;

pub use coordinator::{RosterCoordinator, attach};
pub use player::{DUNGEON_MASTER_NAME, PLACEHOLDER_NAME, Player, PlayerId, PlayerKind};

/// Ordered participants of the active slot, unique by uuid.
///
/// Order is meaningless until a resolution round completes; afterwards
/// index 0 acts first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a persisted list, keeping the first entry of any duplicate uuid
    pub fn from_players(players: Vec<Player>) -> Self {
        let mut roster = Self::new();
        for player in players {
            if !roster.push(player) {
                log::warn!("Dropping duplicate roster entry");
            }
        }
        roster
    }

    /// Append a participant. Returns false (and leaves the roster alone) if
    /// the uuid is already present.
    pub fn push(&mut self, player: Player) -> bool {
        if self.contains(player.uuid()) {
            return false;
        }
        self.players.push(player);
        true
    }

    pub fn remove(&mut self, id: &PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.uuid() == id)?;
        Some(self.players.remove(index))
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.iter().any(|p| p.uuid() == id)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.uuid() == id)
    }

    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.uuid() == id)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Mutable view for reordering and round results. Ids cannot change
    /// through it, so uniqueness holds.
    pub fn players_mut(&mut self) -> &mut [Player] {
        &mut self.players
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Player> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Player> {
        self.players.clone()
    }
}
