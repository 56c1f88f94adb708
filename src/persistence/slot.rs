//! A single save slot and its JSON encoding

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::PersistError;
use crate::platform::KeyValueStore;
use crate::roster::{Player, PlayerId};

/// Suffix of the reserved active-pointer key
pub const ACTIVE_SUFFIX: &str = "active";

/// Durable key of a slot: `<namespace>_<slot>`
pub fn storage_key(namespace: &str, slot_name: &str) -> String {
    format!("{}_{}", namespace, slot_name)
}

/// Durable key of the active-slot pointer
pub fn active_key(namespace: &str) -> String {
    storage_key(namespace, ACTIVE_SUFFIX)
}

/// Contents of one slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotData {
    #[serde(default)]
    pub players: Vec<Player>,
    /// Unparseable payload kept verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    /// Any other top-level fields, preserved across saves
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlotData {
    /// Wrap a payload that failed to parse
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
            ..Self::default()
        }
    }

    /// Replace the player list. Entries are upserted by uuid, so a repeated
    /// uuid overwrites the earlier entry in place.
    pub fn set_players(&mut self, players: Vec<Player>) {
        self.players.clear();
        for player in players {
            self.upsert_player(player);
        }
    }

    pub fn upsert_player(&mut self, player: Player) {
        match self.players.iter_mut().find(|p| p.uuid() == player.uuid()) {
            Some(existing) => *existing = player,
            None => self.players.push(player),
        }
    }

    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.uuid() == id)?;
        Some(self.players.remove(index))
    }

    /// Top-level value for `key`. Missing keys read as `null`, `players` as
    /// an empty array.
    pub fn get(&self, key: &str) -> Value {
        match key {
            "players" => {
                serde_json::to_value(&self.players).unwrap_or_else(|_| Value::Array(Vec::new()))
            }
            "raw" => self.raw.clone().map(Value::String).unwrap_or(Value::Null),
            _ => self.extra.get(key).cloned().unwrap_or(Value::Null),
        }
    }

    /// Assign `value` at a dotted `path`, creating intermediate objects.
    ///
    /// `players` only accepts a whole player list. The data is unchanged if
    /// the assignment fails.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), PersistError> {
        let invalid = |reason: &str| PersistError::InvalidValue {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment"));
        }

        match segments.as_slice() {
            ["players"] => {
                let players: Vec<Player> = serde_json::from_value(value)
                    .map_err(|e| invalid(&format!("not a player list: {}", e)))?;
                self.set_players(players);
                Ok(())
            }
            ["players", ..] => Err(invalid("players can only be replaced as a whole")),
            ["raw"] => match value {
                Value::String(raw) => {
                    self.raw = Some(raw);
                    Ok(())
                }
                Value::Null => {
                    self.raw = None;
                    Ok(())
                }
                _ => Err(invalid("raw must be a string")),
            },
            ["raw", ..] => Err(invalid("raw is a plain string")),
            [first, rest @ ..] => {
                let updated = assign(self.extra.get(*first).cloned(), rest, value)
                    .ok_or_else(|| invalid("an intermediate value is not an object"))?;
                self.extra.insert(first.to_string(), updated);
                Ok(())
            }
            [] => Err(invalid("empty path")),
        }
    }
}

/// Write `value` under `path` inside `current`, returning the new subtree.
/// `None` if an intermediate non-object value is in the way.
fn assign(current: Option<Value>, path: &[&str], value: Value) -> Option<Value> {
    let Some((key, rest)) = path.split_first() else {
        return Some(value);
    };
    let mut object = match current {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(object)) => object,
        Some(_) => return None,
    };
    let child = assign(object.remove(*key), rest, value)?;
    object.insert(key.to_string(), child);
    Some(Value::Object(object))
}

/// Encode `primary`; on failure retry with the `sanitized` form.
fn encode_with_fallback<T, S>(
    primary: &T,
    sanitized: impl FnOnce() -> S,
) -> Result<String, PersistError>
where
    T: Serialize + ?Sized,
    S: Serialize,
{
    match serde_json::to_string(primary) {
        Ok(json) => Ok(json),
        Err(err) => {
            log::warn!("Serialization failed ({}), retrying with data fields only", err);
            serde_json::to_string(&sanitized())
                .map_err(|e| PersistError::Serialization(e.to_string()))
        }
    }
}

fn encode(data: &SlotData) -> Result<String, PersistError> {
    encode_with_fallback(data, || SlotData {
        players: data.players.clone(),
        raw: data.raw.clone(),
        extra: Map::new(),
    })
}

/// Lifecycle of a slot relative to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never loaded or saved
    Uninitialized,
    /// In memory matches the store
    Loaded,
    /// Mutated since the last save
    Dirty,
    /// Removed by the registry; terminal
    Deleted,
}

/// One named bucket of roster data
#[derive(Debug, Clone)]
pub struct SaveSlot {
    slot_name: String,
    storage_key: String,
    data: SlotData,
    state: SlotState,
}

impl SaveSlot {
    pub fn new(namespace: &str, slot_name: &str) -> Self {
        Self {
            slot_name: slot_name.to_string(),
            storage_key: storage_key(namespace, slot_name),
            data: SlotData::default(),
            state: SlotState::Uninitialized,
        }
    }

    pub(crate) fn with_data(
        namespace: &str,
        slot_name: &str,
        data: SlotData,
        state: SlotState,
    ) -> Self {
        Self {
            data,
            state,
            ..Self::new(namespace, slot_name)
        }
    }

    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn data(&self) -> &SlotData {
        &self.data
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn players(&self) -> &[Player] {
        &self.data.players
    }

    /// Value for `key`; never fails
    pub fn get(&self, key: &str) -> Value {
        self.data.get(key)
    }

    pub fn set(&mut self, path: &str, value: Value) -> Result<(), PersistError> {
        self.data.set(path, value)?;
        self.state = SlotState::Dirty;
        Ok(())
    }

    pub fn set_players(&mut self, players: Vec<Player>) {
        self.data.set_players(players);
        self.state = SlotState::Dirty;
    }

    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        let removed = self.data.remove_player(id)?;
        self.state = SlotState::Dirty;
        Some(removed)
    }

    /// Write the in-memory data to the store, then replace it with the
    /// re-parsed payload so memory and store hold the same thing. On any
    /// failure the store is not touched.
    pub fn save(&mut self, store: &dyn KeyValueStore) -> Result<(), PersistError> {
        let json = encode(&self.data)?;
        log::debug!(
            "SaveSlot::save -> key: {}, payload length: {}",
            self.storage_key,
            json.len()
        );
        store.set_item(&self.storage_key, &json)?;

        match serde_json::from_str(&json) {
            Ok(data) => self.data = data,
            Err(e) => log::warn!("Slot {} saved but did not re-parse: {}", self.slot_name, e),
        }
        self.state = SlotState::Loaded;
        Ok(())
    }

    /// Replace the in-memory data with the stored payload
    pub fn load(&mut self, store: &dyn KeyValueStore) -> Result<&SlotData, PersistError> {
        let Some(raw) = store.get_item(&self.storage_key) else {
            log::warn!("No data found in slot {}", self.slot_name);
            return Err(PersistError::NotFound {
                key: self.storage_key.clone(),
            });
        };
        self.data = serde_json::from_str(&raw).map_err(|source| PersistError::CorruptData {
            key: self.storage_key.clone(),
            source,
        })?;
        self.state = SlotState::Loaded;
        Ok(&self.data)
    }

    /// Remove the durable entry and empty the in-memory data
    pub fn clear(&mut self, store: &dyn KeyValueStore) -> Result<(), PersistError> {
        store.remove_item(&self.storage_key)?;
        self.data = SlotData::default();
        self.state = SlotState::Uninitialized;
        Ok(())
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.state = SlotState::Deleted;
    }

    /// JSON of the in-memory data
    pub fn serialize(&self) -> Result<String, PersistError> {
        encode(&self.data)
    }

    /// Build an untracked slot from a payload
    pub fn deserialize(namespace: &str, slot_name: &str, raw: &str) -> Result<Self, PersistError> {
        let data = serde_json::from_str(raw).map_err(|source| PersistError::CorruptData {
            key: storage_key(namespace, slot_name),
            source,
        })?;
        Ok(Self::with_data(namespace, slot_name, data, SlotState::Uninitialized))
    }
}
