//! Participant records
//!
//! `Player` is the unit of persistence. Only the record fields are
//! serialized; `roll` and `reroll` live for one resolution round.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_DIE_COLOR;

/// Name given to the dungeon master participant
pub const DUNGEON_MASTER_NAME: &str = "Dungeon master";

/// Name given to participants added without any details
pub const PLACEHOLDER_NAME: &str = "change me";

/// Opaque participant identifier (`player-<uuid>` for generated ids)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id drawn from `rng`
    pub fn generate(rng: &mut impl RngCore) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Self(format!("player-{}", uuid))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Participant role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    #[default]
    Player,
    Dm,
}

impl PlayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerKind::Player => "player",
            PlayerKind::Dm => "dm",
        }
    }
}

fn default_color() -> u32 {
    DEFAULT_DIE_COLOR
}

/// A roster participant.
///
/// `uuid` and `kind` are fixed at creation; everything else is editable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(default)]
    pub name: String,
    uuid: PlayerId,
    /// URL or data URI of the portrait
    #[serde(default)]
    pub image_src: Option<String>,
    #[serde(rename = "type", default)]
    kind: PlayerKind,
    /// Added to every raw die face
    #[serde(default)]
    pub modifier: i32,
    /// Die color (0xRRGGBB)
    #[serde(default = "default_color")]
    pub color: u32,
    /// Latest face + modifier
    #[serde(skip)]
    pub roll: Option<i32>,
    /// Tie-break result
    #[serde(skip)]
    pub reroll: Option<i32>,
}

impl Player {
    pub fn new(uuid: PlayerId, name: impl Into<String>, kind: PlayerKind) -> Self {
        Self {
            name: name.into(),
            uuid,
            image_src: None,
            kind,
            modifier: 0,
            color: DEFAULT_DIE_COLOR,
            roll: None,
            reroll: None,
        }
    }

    /// Default participant created by a bare "player add"
    pub fn placeholder(rng: &mut impl RngCore) -> Self {
        Self::new(PlayerId::generate(rng), PLACEHOLDER_NAME, PlayerKind::Player)
    }

    /// `Player <n>` entry of a generated default roster
    pub fn numbered(n: usize, rng: &mut impl RngCore) -> Self {
        Self::new(PlayerId::generate(rng), format!("Player {}", n), PlayerKind::Player)
    }

    pub fn dungeon_master(rng: &mut impl RngCore) -> Self {
        Self::new(PlayerId::generate(rng), DUNGEON_MASTER_NAME, PlayerKind::Dm)
    }

    pub fn with_modifier(mut self, modifier: i32) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn with_image(mut self, image_src: impl Into<String>) -> Self {
        self.image_src = Some(image_src.into());
        self
    }

    pub fn uuid(&self) -> &PlayerId {
        &self.uuid
    }

    pub fn kind(&self) -> PlayerKind {
        self.kind
    }

    /// Clear transient round results
    pub fn reset_rolls(&mut self) {
        self.roll = None;
        self.reroll = None;
    }

    /// Copy the editable fields of `other` (uuid and kind stay)
    pub fn apply_edit(&mut self, other: &Player) {
        self.name = other.name.clone();
        self.image_src = other.image_src.clone();
        self.modifier = other.modifier;
        self.color = other.color;
    }

    /// Equality of the persisted fields only
    pub fn same_record(&self, other: &Player) -> bool {
        self.uuid == other.uuid
            && self.name == other.name
            && self.image_src == other.image_src
            && self.kind == other.kind
            && self.modifier == other.modifier
            && self.color == other.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn generated_ids_are_prefixed_and_distinct() {
        let mut rng = Pcg32::seed_from_u64(7);
        let a = PlayerId::generate(&mut rng);
        let b = PlayerId::generate(&mut rng);
        assert!(a.as_str().starts_with("player-"));
        assert_eq!(a.as_str().len(), "player-".len() + 36);
        assert_ne!(a, b);
    }

    #[test]
    fn record_json_uses_wire_names_and_skips_rolls() {
        let mut player = Player::new(PlayerId::new("player-1"), "Aria", PlayerKind::Dm)
            .with_modifier(3)
            .with_image("data:image/png;base64,AA==");
        player.roll = Some(17);
        player.reroll = Some(4);

        let json = serde_json::to_value(&player).unwrap();
        assert_eq!(json["uuid"], "player-1");
        assert_eq!(json["type"], "dm");
        assert_eq!(json["imageSrc"], "data:image/png;base64,AA==");
        assert_eq!(json["color"], 0xff00ff);
        assert!(json.get("roll").is_none());
        assert!(json.get("reroll").is_none());
    }

    #[test]
    fn sparse_records_get_defaults() {
        let player: Player = serde_json::from_str(r#"{"uuid":"player-x","name":"Bo"}"#).unwrap();
        assert_eq!(player.kind(), PlayerKind::Player);
        assert_eq!(player.modifier, 0);
        assert_eq!(player.color, DEFAULT_DIE_COLOR);
        assert!(player.image_src.is_none());
        assert!(player.roll.is_none());
    }

    #[test]
    fn apply_edit_keeps_identity() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut dm = Player::dungeon_master(&mut rng);
        let edit = Player::new(PlayerId::new("other"), "Narrator", PlayerKind::Player)
            .with_modifier(-1)
            .with_color(0x00ff00);
        let id = dm.uuid().clone();
        dm.apply_edit(&edit);
        assert_eq!(dm.uuid(), &id);
        assert_eq!(dm.kind(), PlayerKind::Dm);
        assert_eq!(dm.name, "Narrator");
        assert_eq!(dm.modifier, -1);
        assert_eq!(dm.color, 0x00ff00);
    }

    #[test]
    fn same_record_ignores_round_results() {
        let a = Player::new(PlayerId::new("p"), "A", PlayerKind::Player);
        let mut b = a.clone();
        b.roll = Some(3);
        assert!(a.same_record(&b));
        assert_ne!(a, b);
    }
}
