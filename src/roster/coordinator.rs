//! Roster lifecycle coordinator
//!
//! Turns bus signals into roster edits, resolution rounds and slot
//! operations. Storage faults are logged and never undo the in-memory
//! change, so a failed write after a roll still leaves the resolved order
//! visible.
//!
//! Writes come in two flavours:
//! - debounced (adds and field edits), coalesced by a trailing-edge
//!   `Debouncer` and flushed from `poll`; the touched participant records
//!   are written with the same flush
//! - immediate (deletes, the full roster after a roll), which also cancel
//!   any pending debounced write

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use rand_pcg::Pcg32;

use super::{DUNGEON_MASTER_NAME, Player, PlayerId, Roster};
use crate::events::{Event, EventBus, SubscriptionId};
use crate::initiative::{DieSource, ResolutionEngine, seeded_rng};
use crate::persistence::{Debouncer, PersistError, SlotRegistry};
use crate::platform::Clock;
use crate::settings::Settings;

/// RNG salt for ids of added participants
const PLAYER_RNG_SALT: u64 = 2;

pub struct RosterCoordinator {
    registry: SlotRegistry,
    roster: Roster,
    engine: ResolutionEngine,
    die: Box<dyn DieSource>,
    clock: Box<dyn Clock>,
    debouncer: Debouncer,
    rng: Pcg32,
    /// Participants whose records changed since the last write
    dirty_records: BTreeSet<PlayerId>,
    /// Full-roster write owed once the current dispatch finishes
    write_after_dispatch: bool,
}

impl RosterCoordinator {
    pub fn new(
        mut registry: SlotRegistry,
        settings: &Settings,
        die: Box<dyn DieSource>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let roster = Roster::from_players(registry.get_current_save().players().to_vec());
        log::info!(
            "Roster loaded from slot {} ({} participants)",
            registry.active_slot_name(),
            roster.len()
        );
        Self {
            registry,
            roster,
            engine: ResolutionEngine::new(settings.faces_on_die),
            die,
            clock,
            debouncer: Debouncer::new(settings.debounce_ms),
            rng: seeded_rng(settings.seed, PLAYER_RNG_SALT),
            dirty_records: BTreeSet::new(),
            write_after_dispatch: false,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &ResolutionEngine {
        &self.engine
    }

    pub fn has_pending_write(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// React to one signal. Returns the signals to emit in response.
    pub fn handle(&mut self, event: &Event) -> Vec<Event> {
        match event {
            Event::PlayerAdd(payload) => {
                self.add_player(payload.as_ref());
                Vec::new()
            }
            Event::PlayerDelete(id) => {
                self.delete_player(id);
                Vec::new()
            }
            Event::PlayerUpdate(player) => {
                self.update_player(player);
                Vec::new()
            }
            Event::RollStart | Event::SpellCast => vec![Event::RollComplete(self.roll())],
            Event::SaveSlotCreate { slot_name } => self.create_slot(slot_name),
            Event::SaveSlotSelect { slot_name } => self.select_slot(slot_name),
            Event::SaveSlotDelete { slot_name } => self.delete_slot(slot_name),
            Event::RollComplete(_)
            | Event::SaveSlotCreated { .. }
            | Event::SaveSlotCurrentChanged { .. }
            | Event::SaveSlotDeleted { .. } => Vec::new(),
        }
    }

    /// Perform the write owed by the last handled signal, if any
    pub fn commit(&mut self) {
        if self.take_owed_write() {
            self.save_roster();
        }
    }

    /// Claim the write owed by the last handled signal. Whoever claims it
    /// must call `save_roster` once dispatch of the responses is done.
    pub fn take_owed_write(&mut self) -> bool {
        std::mem::take(&mut self.write_after_dispatch)
    }

    /// Flush the debounced write once its deadline has passed.
    /// Returns whether a write was attempted.
    pub fn poll(&mut self) -> bool {
        if self.debouncer.poll(self.clock.now_ms()) {
            self.save_roster();
            return true;
        }
        false
    }

    /// Write any pending change now
    pub fn flush(&mut self) {
        let owed = self.take_owed_write();
        if owed || self.debouncer.is_pending() {
            self.save_roster();
        }
    }

    fn schedule_write(&mut self) {
        self.debouncer.request(self.clock.now_ms());
    }

    /// Write the roster to the active slot, along with any changed
    /// participant records. Returns false if the store refused the roster.
    pub fn save_roster(&mut self) -> bool {
        self.debouncer.cancel();
        for id in std::mem::take(&mut self.dirty_records) {
            let Some(player) = self.roster.get(&id) else {
                continue;
            };
            if let Err(e) = self.registry.save_player_record(player) {
                log::warn!("Could not store record for {}: {}", id, e);
            }
        }
        match self.registry.save_players(self.roster.to_vec()) {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "Failed to persist roster to slot {}: {}",
                    self.registry.active_slot_name(),
                    e
                );
                false
            }
        }
    }

    fn add_player(&mut self, payload: Option<&Player>) {
        let player = match payload {
            None => Player::placeholder(&mut self.rng),
            Some(data) => match self.reconstruct(data) {
                Some(player) => player,
                None => {
                    log::warn!("player:add for unknown participant {}, ignoring", data.uuid());
                    return;
                }
            },
        };

        if self.roster.contains(player.uuid()) {
            log::debug!("Participant {} already on the roster", player.uuid());
            return;
        }
        log::info!("Added participant {} ({})", player.name, player.uuid());
        self.dirty_records.insert(player.uuid().clone());
        self.roster.push(player);
        self.schedule_write();
    }

    /// Rebuild a participant from a payload naming a persisted uuid
    fn reconstruct(&mut self, data: &Player) -> Option<Player> {
        let known = self.registry.has_player_record(data.uuid())
            || self
                .registry
                .get_current_save()
                .players()
                .iter()
                .any(|p| p.uuid() == data.uuid());
        if known {
            let mut player = data.clone();
            player.reset_rolls();
            return Some(player);
        }
        if data.name == DUNGEON_MASTER_NAME {
            return Some(Player::dungeon_master(&mut self.rng));
        }
        None
    }

    fn delete_player(&mut self, id: &PlayerId) {
        if self.roster.remove(id).is_none() {
            log::warn!("player:delete for {} which is not on the roster", id);
            return;
        }
        self.dirty_records.remove(id);
        if let Err(e) = self.registry.remove_player_record(id) {
            log::warn!("Could not remove record for {}: {}", id, e);
        }
        if let Err(e) = self.registry.forget_player(id) {
            log::warn!("Could not drop {} from the active slot: {}", id, e);
        }
        log::info!("Deleted participant {}", id);
        self.save_roster();
    }

    fn update_player(&mut self, edit: &Player) {
        let Some(player) = self.roster.get_mut(edit.uuid()) else {
            log::warn!("player:update for {} which is not on the roster", edit.uuid());
            return;
        };
        player.apply_edit(edit);
        self.dirty_records.insert(edit.uuid().clone());
        self.schedule_write();
    }

    fn roll(&mut self) -> Vec<Player> {
        self.engine.resolve(self.roster.players_mut(), self.die.as_mut());
        log::info!(
            "Initiative resolved: {:?}",
            self.roster.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
        );
        self.debouncer.cancel();
        self.write_after_dispatch = true;
        self.roster.to_vec()
    }

    fn create_slot(&mut self, slot_name: &str) -> Vec<Event> {
        self.flush();
        match self.registry.create_slot(slot_name) {
            Ok(_) => vec![Event::SaveSlotCreated {
                slot_name: slot_name.to_string(),
            }],
            Err(e) => log_slot_error("create", slot_name, e),
        }
    }

    fn select_slot(&mut self, slot_name: &str) -> Vec<Event> {
        // A pending write belongs to the slot being left
        self.flush();
        match self.registry.set_current_slot(slot_name) {
            Ok(slot) => {
                self.roster = Roster::from_players(slot.players().to_vec());
                vec![Event::SaveSlotCurrentChanged {
                    slot_name: slot_name.to_string(),
                }]
            }
            Err(e) => log_slot_error("select", slot_name, e),
        }
    }

    fn delete_slot(&mut self, slot_name: &str) -> Vec<Event> {
        self.flush();
        let was_active = self.registry.active_slot_name() == slot_name;
        match self.registry.delete_slot(slot_name) {
            Ok(_) => {
                let mut events = vec![Event::SaveSlotDeleted {
                    slot_name: slot_name.to_string(),
                }];
                if was_active {
                    let fallback = self.registry.get_current_save();
                    self.roster = Roster::from_players(fallback.players().to_vec());
                    events.push(Event::SaveSlotCurrentChanged {
                        slot_name: fallback.slot_name().to_string(),
                    });
                }
                events
            }
            Err(e) => log_slot_error("delete", slot_name, e),
        }
    }
}

fn log_slot_error(action: &str, slot_name: &str, e: PersistError) -> Vec<Event> {
    log::error!("Failed to {} slot {:?}: {}", action, slot_name, e);
    Vec::new()
}

/// Subscribe `coordinator` to `bus`. Response signals are emitted after the
/// coordinator is released, so their subscribers may dispatch back into it;
/// the post-roll write happens once they have all run.
pub fn attach(
    coordinator: &Rc<RefCell<RosterCoordinator>>,
    bus: &Rc<EventBus<Event>>,
) -> SubscriptionId {
    let coordinator = Rc::clone(coordinator);
    let bus_handle = Rc::downgrade(bus);
    bus.subscribe(move |event| {
        let (responses, owed) = {
            let mut c = coordinator.borrow_mut();
            let responses = c.handle(event);
            (responses, c.take_owed_write())
        };
        if let Some(bus) = bus_handle.upgrade() {
            for response in &responses {
                bus.emit(response);
            }
        }
        if owed {
            coordinator.borrow_mut().save_roster();
        }
    })
}
