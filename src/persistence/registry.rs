//! Slot registry: the single owner of every save slot and of the active
//! slot pointer.
//!
//! One registry is built at startup and handed to whoever needs persisted
//! state. Storage faults are logged here; only the operations documented
//! as fallible return them.

use std::collections::BTreeMap;

use rand_pcg::Pcg32;
use serde_json::Value;

use super::slot::{ACTIVE_SUFFIX, SaveSlot, SlotData, SlotState, active_key, storage_key};
use super::PersistError;
use crate::consts::{DEFAULT_NAMESPACE, DEFAULT_ROSTER_SIZE, DEFAULT_SLOT};
use crate::initiative::seeded_rng;
use crate::platform::KeyValueStore;
use crate::roster::{Player, PlayerId};

/// RNG salt for generated default rosters
const ROSTER_RNG_SALT: u64 = 1;

/// Registry construction parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Key prefix isolating this application's slots
    pub namespace: String,
    /// Slot used when nothing else is active
    pub default_slot: String,
    /// Size of a generated placeholder roster
    pub default_roster_size: usize,
    /// Make the last placeholder a dungeon master
    pub include_dungeon_master: bool,
    /// Seed for generated ids
    pub seed: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_slot: DEFAULT_SLOT.to_string(),
            default_roster_size: DEFAULT_ROSTER_SIZE,
            include_dungeon_master: false,
            seed: None,
        }
    }
}

/// Reject names that cannot be stored as a slot
pub fn validate_slot_name(slot_name: &str) -> Result<(), PersistError> {
    if slot_name.trim().is_empty() {
        return Err(PersistError::EmptySlotName);
    }
    if slot_name == ACTIVE_SUFFIX {
        return Err(PersistError::ReservedSlotName(slot_name.to_string()));
    }
    Ok(())
}

/// Rebuild a slot from its stored payload, keeping unparseable text under
/// `raw`. `None` if nothing is stored.
fn read_slot(store: &dyn KeyValueStore, namespace: &str, slot_name: &str) -> Option<SaveSlot> {
    let key = storage_key(namespace, slot_name);
    let raw = store.get_item(&key)?;
    let data = match serde_json::from_str::<SlotData>(&raw) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("Non-JSON payload for key {} ({}), keeping raw value", key, e);
            SlotData::from_raw(raw)
        }
    };
    Some(SaveSlot::with_data(namespace, slot_name, data, SlotState::Loaded))
}

pub struct SlotRegistry {
    store: Box<dyn KeyValueStore>,
    config: RegistryConfig,
    active: String,
    slots: BTreeMap<String, SaveSlot>,
    rng: Pcg32,
}

impl SlotRegistry {
    /// Open the registry over `store`: restore the active pointer, track
    /// every stored slot, and make sure the active slot exists.
    pub fn open(store: Box<dyn KeyValueStore>, config: RegistryConfig) -> Self {
        let active = store
            .get_item(&active_key(&config.namespace))
            .filter(|name| validate_slot_name(name).is_ok())
            .unwrap_or_else(|| config.default_slot.clone());

        let mut registry = Self {
            rng: seeded_rng(config.seed, ROSTER_RNG_SALT),
            store,
            config,
            active,
            slots: BTreeMap::new(),
        };

        registry.slots = registry.get_all_slots_from_storage();
        if !registry.slots.contains_key(&registry.active) {
            let active = registry.active.clone();
            if let Err(e) = registry.create_slot(&active) {
                log::error!("Could not create active slot {}: {}", active, e);
            }
        }

        log::info!(
            "Slot registry ready: namespace={}, active={}, slots={:?}",
            registry.config.namespace,
            registry.active,
            registry.slot_names()
        );
        registry
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn active_slot_name(&self) -> &str {
        &self.active
    }

    /// Names of the slots tracked in memory
    pub fn slot_names(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Placeholder roster for a slot with nothing to inherit
    pub fn default_roster(&mut self) -> Vec<Player> {
        let size = self.config.default_roster_size;
        let mut players: Vec<Player> = (1..=size)
            .map(|n| Player::numbered(n, &mut self.rng))
            .collect();
        if self.config.include_dungeon_master && size > 0 {
            players[size - 1] = Player::dungeon_master(&mut self.rng);
        }
        players
    }

    /// Create (or overwrite) `slot_name`, seeded with a copy of the active
    /// slot's players or a placeholder roster, and persist it immediately.
    pub fn create_slot(&mut self, slot_name: &str) -> Result<&mut SaveSlot, PersistError> {
        validate_slot_name(slot_name)?;
        if self.slots.contains_key(slot_name) {
            log::warn!("Slot {} already exists. Overwriting.", slot_name);
        }

        let inherited = self.get_current_save().players().to_vec();
        let players = if inherited.is_empty() {
            self.default_roster()
        } else {
            inherited
        };

        let mut slot = SaveSlot::new(&self.config.namespace, slot_name);
        slot.set_players(players);
        log::debug!(
            "create_slot: persisting new slot '{}' -> key '{}'",
            slot_name,
            slot.storage_key()
        );
        if let Err(e) = slot.save(self.store.as_ref()) {
            log::error!("Failed to persist new slot {}: {}", slot_name, e);
        }

        self.slots.insert(slot_name.to_string(), slot);
        self.slots
            .get_mut(slot_name)
            .ok_or_else(|| PersistError::SlotNotFound(slot_name.to_string()))
    }

    /// Remove `slot_name` from memory and from the store. Deleting the
    /// active slot falls back to the default slot, re-creating it if needed.
    /// Returns the removed in-memory slot, if one was tracked.
    pub fn delete_slot(&mut self, slot_name: &str) -> Result<Option<SaveSlot>, PersistError> {
        if let Err(e) = validate_slot_name(slot_name) {
            log::warn!("delete_slot rejected {:?}: {}", slot_name, e);
            return Err(e);
        }

        let removed = self.slots.remove(slot_name).map(|mut slot| {
            if let Err(e) = slot.clear(self.store.as_ref()) {
                log::warn!("Failed to clear slot {}: {}", slot_name, e);
            }
            slot.mark_deleted();
            slot
        });

        let key = storage_key(&self.config.namespace, slot_name);
        if let Err(e) = self.store.remove_item(&key) {
            log::error!("Failed to remove storage key {}: {}", key, e);
        }

        if slot_name == self.active {
            if let Err(e) = self.store.remove_item(&active_key(&self.config.namespace)) {
                log::warn!("Failed to clear active slot pointer: {}", e);
            }
            self.active = self.config.default_slot.clone();
            if !self.slots.contains_key(&self.active) {
                let fallback = self.active.clone();
                self.create_slot(&fallback)?;
            }
            log::info!("Deleted active slot {}, now using {}", slot_name, self.active);
        }

        Ok(removed)
    }

    /// Make `slot_name` active, loading it from the store or creating it if
    /// it does not exist, and persist the pointer.
    pub fn set_current_slot(&mut self, slot_name: &str) -> Result<&mut SaveSlot, PersistError> {
        validate_slot_name(slot_name)?;

        if !self.slots.contains_key(slot_name) {
            match read_slot(self.store.as_ref(), &self.config.namespace, slot_name) {
                Some(slot) => {
                    self.slots.insert(slot_name.to_string(), slot);
                }
                None => {
                    self.create_slot(slot_name)?;
                }
            }
        }

        self.active = slot_name.to_string();
        if let Err(e) = self
            .store
            .set_item(&active_key(&self.config.namespace), slot_name)
        {
            log::warn!("Failed to persist active slot pointer: {}", e);
        }

        self.slots
            .get_mut(slot_name)
            .ok_or_else(|| PersistError::SlotNotFound(slot_name.to_string()))
    }

    /// The active slot. An already-tracked instance is returned as is;
    /// otherwise it is loaded from the store or started empty.
    pub fn get_current_save(&mut self) -> &mut SaveSlot {
        let store = self.store.as_ref();
        let namespace = self.config.namespace.as_str();
        let name = self.active.as_str();
        self.slots.entry(name.to_string()).or_insert_with(|| {
            read_slot(store, namespace, name).unwrap_or_else(|| SaveSlot::new(namespace, name))
        })
    }

    pub fn get_slot(&self, slot_name: &str) -> Option<&SaveSlot> {
        self.slots.get(slot_name)
    }

    /// Data of the active slot, if tracked
    pub fn get_data(&self) -> Option<&SlotData> {
        self.slots.get(&self.active).map(SaveSlot::data)
    }

    /// Top-level value of the active slot; `null` if the slot is untracked
    pub fn get_data_by_key(&self, key: &str) -> Value {
        match self.slots.get(&self.active) {
            Some(slot) => slot.get(key),
            None => {
                log::warn!("Slot data not found for key: {}", key);
                Value::Null
            }
        }
    }

    fn active_slot_mut(&mut self) -> Result<&mut SaveSlot, PersistError> {
        self.slots
            .get_mut(&self.active)
            .ok_or_else(|| PersistError::SlotNotFound(self.active.clone()))
    }

    /// Assign `value` at `path` in the active slot and save it
    pub fn save_to_existing_slot(&mut self, path: &str, value: Value) -> Result<(), PersistError> {
        let store = self.store.as_ref();
        let slot = self
            .slots
            .get_mut(&self.active)
            .ok_or_else(|| PersistError::SlotNotFound(self.active.clone()))?;
        log::debug!(
            "save_to_existing_slot: path='{}' on slot='{}' (storage key '{}')",
            path,
            slot.slot_name(),
            slot.storage_key()
        );
        slot.set(path, value)?;
        slot.save(store)
    }

    /// Replace the active slot's players and save it
    pub fn save_players(&mut self, players: Vec<Player>) -> Result<(), PersistError> {
        let store = self.store.as_ref();
        let slot = self
            .slots
            .get_mut(&self.active)
            .ok_or_else(|| PersistError::SlotNotFound(self.active.clone()))?;
        slot.set_players(players);
        slot.save(store)
    }

    pub fn save_current_slot(&mut self) -> Result<(), PersistError> {
        let store = self.store.as_ref();
        let slot = self
            .slots
            .get_mut(&self.active)
            .ok_or_else(|| PersistError::SlotNotFound(self.active.clone()))?;
        slot.save(store)
    }

    /// Save every tracked slot. All slots are attempted; the first failure
    /// is returned.
    pub fn save_all(&mut self) -> Result<(), PersistError> {
        let store = self.store.as_ref();
        let mut first_error = None;
        for slot in self.slots.values_mut() {
            if let Err(e) = slot.save(store) {
                log::error!("Failed to save slot {}: {}", slot.slot_name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Reload every tracked slot from the store. All slots are attempted;
    /// the first failure is returned.
    pub fn load_all(&mut self) -> Result<(), PersistError> {
        let store = self.store.as_ref();
        let mut first_error = None;
        for slot in self.slots.values_mut() {
            if let Err(e) = slot.load(store) {
                log::warn!("Failed to load slot {}: {}", slot.slot_name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Every slot stored under this namespace, rebuilt from the store.
    /// The active pointer is not a slot and is skipped.
    pub fn get_all_slots_from_storage(&self) -> BTreeMap<String, SaveSlot> {
        let prefix = format!("{}_", self.config.namespace);
        let pointer = active_key(&self.config.namespace);

        self.store
            .keys()
            .into_iter()
            .filter(|key| *key != pointer)
            .filter_map(|key| {
                let slot_name = key.strip_prefix(&prefix)?;
                if slot_name.is_empty() {
                    return None;
                }
                let slot = read_slot(self.store.as_ref(), &self.config.namespace, slot_name)?;
                Some((slot_name.to_string(), slot))
            })
            .collect()
    }

    /// Store a participant's record under its own uuid
    pub fn save_player_record(&self, player: &Player) -> Result<(), PersistError> {
        let json =
            serde_json::to_string(player).map_err(|e| PersistError::Serialization(e.to_string()))?;
        self.store.set_item(player.uuid().as_str(), &json)?;
        Ok(())
    }

    pub fn load_player_record(&self, id: &PlayerId) -> Option<Player> {
        let raw = self.store.get_item(id.as_str())?;
        match serde_json::from_str(&raw) {
            Ok(player) => Some(player),
            Err(e) => {
                log::warn!("Ignoring unreadable record for {}: {}", id, e);
                None
            }
        }
    }

    pub fn has_player_record(&self, id: &PlayerId) -> bool {
        self.store.get_item(id.as_str()).is_some()
    }

    pub fn remove_player_record(&self, id: &PlayerId) -> Result<(), PersistError> {
        self.store.remove_item(id.as_str())?;
        Ok(())
    }

    /// Drop `id` from the active slot without saving
    pub(crate) fn forget_player(&mut self, id: &PlayerId) -> Result<(), PersistError> {
        self.active_slot_mut()?.remove_player(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryStore;
    use crate::roster::PlayerKind;
    use serde_json::json;

    fn config(namespace: &str) -> RegistryConfig {
        RegistryConfig {
            namespace: namespace.to_string(),
            seed: Some(11),
            ..RegistryConfig::default()
        }
    }

    fn open(store: &MemoryStore) -> SlotRegistry {
        SlotRegistry::open(Box::new(store.clone()), config("ns"))
    }

    fn player(id: &str, modifier: i32) -> Player {
        Player::new(PlayerId::new(id), id, PlayerKind::Player).with_modifier(modifier)
    }

    #[test]
    fn fresh_store_seeds_default_slot() {
        let store = MemoryStore::new();
        let mut registry = open(&store);

        assert_eq!(registry.active_slot_name(), "default");
        let slot = registry.get_current_save();
        assert_eq!(slot.players().len(), 5);
        assert_eq!(slot.players()[0].name, "Player 1");
        assert!(slot.players()[0].uuid().as_str().starts_with("player-"));
        assert!(store.get_item("ns_default").is_some());
    }

    #[test]
    fn dungeon_master_closes_default_roster() {
        let store = MemoryStore::new();
        let cfg = RegistryConfig {
            include_dungeon_master: true,
            ..config("ns")
        };
        let mut registry = SlotRegistry::open(Box::new(store.clone()), cfg);
        let players = registry.get_current_save().players().to_vec();
        assert_eq!(players.len(), 5);
        assert_eq!(players[4].kind(), PlayerKind::Dm);
        assert_eq!(players[4].name, crate::roster::DUNGEON_MASTER_NAME);
    }

    #[test]
    fn reopen_restores_active_pointer() {
        let store = MemoryStore::new();
        {
            let mut registry = open(&store);
            registry.create_slot("raid").unwrap();
            registry.set_current_slot("raid").unwrap();
        }
        assert_eq!(store.get_item("ns_active").as_deref(), Some("raid"));

        let registry = open(&store);
        assert_eq!(registry.active_slot_name(), "raid");
        assert_eq!(registry.slot_names(), vec!["default", "raid"]);
    }

    #[test]
    fn create_slot_copies_active_players() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        registry
            .save_players(vec![player("a", 1), player("b", 2), player("c", 3)])
            .unwrap();

        let players = registry.create_slot("raid1").unwrap().players().to_vec();
        let source = registry.get_slot("default").unwrap().players();

        assert_eq!(players.len(), 3);
        assert_eq!(players, source);
        assert_ne!(players.as_ptr(), source.as_ptr());
        assert!(store.get_item("ns_raid1").is_some());
    }

    #[test]
    fn create_slot_rejects_bad_names() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        assert!(matches!(registry.create_slot(""), Err(PersistError::EmptySlotName)));
        assert!(matches!(
            registry.create_slot("active"),
            Err(PersistError::ReservedSlotName(_))
        ));
        assert!(matches!(
            registry.set_current_slot("  "),
            Err(PersistError::EmptySlotName)
        ));
    }

    #[test]
    fn create_existing_slot_overwrites() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        registry.save_players(vec![player("a", 0)]).unwrap();
        registry.create_slot("b").unwrap();

        registry.save_players(vec![player("z", 0)]).unwrap();
        let players = registry.create_slot("b").unwrap().players().to_vec();
        assert_eq!(players[0].uuid().as_str(), "z");
    }

    #[test]
    fn slot_round_trips_through_switching() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        let list = vec![player("x1", 2), player("x2", -1).with_color(0x123456)];

        registry.create_slot("x").unwrap();
        registry.set_current_slot("x").unwrap();
        registry
            .save_to_existing_slot("players", serde_json::to_value(&list).unwrap())
            .unwrap();

        registry.set_current_slot("default").unwrap();
        registry.set_current_slot("x").unwrap();
        assert_eq!(registry.get_current_save().players(), list.as_slice());

        // And across a restart
        let mut reopened = open(&store);
        assert_eq!(reopened.get_current_save().players(), list.as_slice());
    }

    #[test]
    fn set_current_slot_creates_missing_slot() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        let slot = registry.set_current_slot("new").unwrap();
        assert_eq!(slot.players().len(), 5);
        assert_eq!(registry.active_slot_name(), "new");
        assert!(store.get_item("ns_new").is_some());
    }

    #[test]
    fn get_current_save_returns_the_tracked_instance() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        registry.get_current_save().set_players(vec![player("m", 0)]);
        assert_eq!(registry.get_current_save().state(), SlotState::Dirty);
        assert_eq!(registry.get_current_save().players()[0].uuid().as_str(), "m");
        assert_eq!(registry.get_data_by_key("players")[0]["uuid"], "m");
        assert_eq!(registry.get_data().unwrap().players.len(), 1);
    }

    #[test]
    fn save_to_untracked_slot_fails() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        registry.delete_slot("default").unwrap();
        registry.slots.clear();
        let err = registry
            .save_to_existing_slot("players", json!([]))
            .unwrap_err();
        assert!(matches!(err, PersistError::SlotNotFound(_)));
        assert!(matches!(
            registry.save_current_slot(),
            Err(PersistError::SlotNotFound(_))
        ));
        assert_eq!(registry.get_data_by_key("players"), Value::Null);
    }

    #[test]
    fn save_to_existing_slot_keeps_data_on_bad_value() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        let before = store.get_item("ns_default");
        assert!(registry.save_to_existing_slot("players", json!(42)).is_err());
        assert_eq!(store.get_item("ns_default"), before);
        assert_eq!(registry.get_current_save().players().len(), 5);
    }

    #[test]
    fn deleting_active_slot_falls_back_to_default() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        registry.set_current_slot("raid").unwrap();

        let removed = registry.delete_slot("raid").unwrap().unwrap();
        assert_eq!(removed.state(), SlotState::Deleted);
        assert!(store.get_item("ns_raid").is_none());
        assert!(store.get_item("ns_active").is_none());

        assert_eq!(registry.active_slot_name(), "default");
        let slot = registry.get_current_save();
        assert_eq!(slot.slot_name(), "default");
        assert!(!slot.players().is_empty());
    }

    #[test]
    fn deleting_the_default_slot_recreates_it() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        registry.save_players(vec![player("only", 0)]).unwrap();

        registry.delete_slot("default").unwrap();

        assert_eq!(registry.active_slot_name(), "default");
        let stored = store.get_item("ns_default").unwrap();
        let data: SlotData = serde_json::from_str(&stored).unwrap();
        assert_eq!(data.players.len(), 5);
    }

    #[test]
    fn delete_untracked_slot_still_removes_durable_key() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        store.set_item("ns_stray", r#"{"players":[]}"#).unwrap();

        assert!(registry.delete_slot("stray").unwrap().is_none());
        assert!(store.get_item("ns_stray").is_none());
        assert!(matches!(registry.delete_slot(""), Err(PersistError::EmptySlotName)));
    }

    #[test]
    fn delete_refuses_the_pointer_key() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        registry.set_current_slot("raid").unwrap();

        assert!(matches!(
            registry.delete_slot("active"),
            Err(PersistError::ReservedSlotName(_))
        ));
        assert_eq!(store.get_item("ns_active").as_deref(), Some("raid"));
        assert_eq!(registry.active_slot_name(), "raid");

        let reopened = open(&store);
        assert_eq!(reopened.active_slot_name(), "raid");
    }

    #[test]
    fn enumeration_is_namespace_isolated() {
        let store = MemoryStore::new();
        store.set_item("other_default", r#"{"players":[]}"#).unwrap();
        store.set_item("unrelated", "x").unwrap();
        store.set_item("ns_legacy", "not json at all").unwrap();
        let registry = open(&store);

        let slots = registry.get_all_slots_from_storage();
        assert!(!slots.contains_key(ACTIVE_SUFFIX));
        let names: Vec<_> = slots.keys().cloned().collect();
        assert_eq!(names, vec!["default", "legacy"]);
        assert_eq!(slots["legacy"].data().raw.as_deref(), Some("not json at all"));
    }

    #[test]
    fn enumeration_skips_active_pointer() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        registry.set_current_slot("default").unwrap();
        assert!(store.get_item("ns_active").is_some());
        assert!(!registry.get_all_slots_from_storage().contains_key(ACTIVE_SUFFIX));
    }

    #[test]
    fn corrupt_active_slot_is_kept_raw() {
        let store = MemoryStore::new();
        store.set_item("ns_active", "broken").unwrap();
        store.set_item("ns_broken", "{{{").unwrap();

        let mut registry = open(&store);
        assert_eq!(registry.active_slot_name(), "broken");
        let slot = registry.get_current_save();
        assert_eq!(slot.data().raw.as_deref(), Some("{{{"));
        assert!(slot.players().is_empty());
    }

    #[test]
    fn save_all_and_load_all() {
        let store = MemoryStore::new();
        let mut registry = open(&store);
        registry.create_slot("b").unwrap();
        registry.get_current_save().set_players(vec![player("dirty", 0)]);
        registry.save_all().unwrap();
        assert!(store.get_item("ns_default").unwrap().contains("dirty"));

        store.set_item("ns_b", r#"{"players":[{"uuid":"ext","name":"E"}]}"#).unwrap();
        registry.load_all().unwrap();
        assert_eq!(registry.get_slot("b").unwrap().players()[0].name, "E");

        store.remove_item("ns_b").unwrap();
        assert!(matches!(
            registry.load_all(),
            Err(PersistError::NotFound { .. })
        ));
    }

    #[test]
    fn player_records_live_under_their_uuid() {
        let store = MemoryStore::new();
        let registry = open(&store);
        let p = player("player-abc", 4);

        registry.save_player_record(&p).unwrap();
        assert!(registry.has_player_record(p.uuid()));
        assert_eq!(registry.load_player_record(p.uuid()), Some(p.clone()));
        assert!(!registry.get_all_slots_from_storage().contains_key("abc"));

        registry.remove_player_record(p.uuid()).unwrap();
        assert!(!registry.has_player_record(p.uuid()));
    }
}
