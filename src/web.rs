//! Browser bindings
//!
//! One session per page, built on start from LocalStorage-backed slots.
//! Payloads cross the boundary as JSON strings.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::events::{Event, EventBus, Signal};
use crate::initiative::{PcgDie, RollOutcome, seeded_rng};
use crate::platform::{KeyValueStore, LocalStorage, MemoryStore, SystemClock};
use crate::roster::{self, Player, PlayerId, RosterCoordinator};
use crate::settings::Settings;
use crate::SlotRegistry;

/// RNG salt for the session die
const DIE_RNG_SALT: u64 = 3;

struct Session {
    bus: Rc<EventBus<Event>>,
    coordinator: Rc<RefCell<RosterCoordinator>>,
    last_roll: Rc<RefCell<Vec<RollOutcome>>>,
}

thread_local! {
    static SESSION: RefCell<Option<Session>> = const { RefCell::new(None) };
}

fn open_store() -> Box<dyn KeyValueStore> {
    match LocalStorage::open() {
        Some(storage) => Box::new(storage),
        None => {
            log::warn!("LocalStorage unavailable, slots will not survive a reload");
            Box::new(MemoryStore::new())
        }
    }
}

fn build_session() -> Session {
    let settings = Settings::load();
    let registry = SlotRegistry::open(open_store(), settings.registry_config());
    let die = PcgDie::from_rng(seeded_rng(settings.seed, DIE_RNG_SALT));
    let coordinator = Rc::new(RefCell::new(RosterCoordinator::new(
        registry,
        &settings,
        Box::new(die),
        Box::new(SystemClock::new()),
    )));
    let bus = Rc::new(EventBus::new());
    roster::attach(&coordinator, &bus);

    let last_roll = Rc::new(RefCell::new(Vec::new()));
    {
        let last_roll = last_roll.clone();
        bus.subscribe(move |event: &Event| {
            if let Event::RollComplete(players) = event {
                *last_roll.borrow_mut() = players.iter().map(RollOutcome::from).collect();
            }
        });
    }

    Session {
        bus,
        coordinator,
        last_roll,
    }
}

fn with_session<R>(f: impl FnOnce(&Session) -> R) -> Result<R, JsValue> {
    SESSION.with(|session| match session.borrow().as_ref() {
        Some(session) => Ok(f(session)),
        None => Err(JsValue::from_str("roll keeper session not started")),
    })
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_player(json: &str) -> Result<Player, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("invalid player: {}", e)))
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&JsValue::from_str(&format!("logger already set: {}", e)));
    }
    log::info!("Roll Keeper starting...");

    let session = build_session();
    SESSION.with(|slot| *slot.borrow_mut() = Some(session));
}

/// Forward every signal to `callback(name)`
#[wasm_bindgen]
pub fn on_event(callback: js_sys::Function) -> Result<(), JsValue> {
    with_session(|s| {
        s.bus.subscribe(move |event: &Event| {
            if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_str(event.name())) {
                log::warn!("Event callback failed: {:?}", e);
            }
        });
    })
}

/// Roll initiative. Returns `[{uuid, name, roll, reroll}]`, first to act first.
#[wasm_bindgen]
pub fn roll_initiative() -> Result<String, JsValue> {
    let last_roll = with_session(|s| {
        s.bus.emit(&Event::RollStart);
        s.last_roll.clone()
    })?;
    to_json(last_roll.borrow().as_slice())
}

/// Spell-cast trigger; rolls like `roll_initiative`
#[wasm_bindgen]
pub fn cast_spell() -> Result<String, JsValue> {
    let last_roll = with_session(|s| {
        s.bus.emit(&Event::SpellCast);
        s.last_roll.clone()
    })?;
    to_json(last_roll.borrow().as_slice())
}

/// Add a participant. Without a payload a placeholder is created.
#[wasm_bindgen]
pub fn add_player(json: Option<String>) -> Result<(), JsValue> {
    let payload = json.as_deref().map(parse_player).transpose()?;
    with_session(|s| s.bus.emit(&Event::PlayerAdd(payload)))
}

#[wasm_bindgen]
pub fn update_player(json: &str) -> Result<(), JsValue> {
    let player = parse_player(json)?;
    with_session(|s| s.bus.emit(&Event::PlayerUpdate(player)))
}

#[wasm_bindgen]
pub fn delete_player(uuid: &str) -> Result<(), JsValue> {
    with_session(|s| s.bus.emit(&Event::PlayerDelete(PlayerId::new(uuid))))
}

#[wasm_bindgen]
pub fn create_slot(slot_name: &str) -> Result<(), JsValue> {
    with_session(|s| {
        s.bus.emit(&Event::SaveSlotCreate {
            slot_name: slot_name.to_string(),
        })
    })
}

#[wasm_bindgen]
pub fn select_slot(slot_name: &str) -> Result<(), JsValue> {
    with_session(|s| {
        s.bus.emit(&Event::SaveSlotSelect {
            slot_name: slot_name.to_string(),
        })
    })
}

#[wasm_bindgen]
pub fn delete_slot(slot_name: &str) -> Result<(), JsValue> {
    with_session(|s| {
        s.bus.emit(&Event::SaveSlotDelete {
            slot_name: slot_name.to_string(),
        })
    })
}

/// Names of every stored slot, as a JSON array
#[wasm_bindgen]
pub fn slots() -> Result<String, JsValue> {
    let names = with_session(|s| s.coordinator.borrow().registry().slot_names())?;
    to_json(&names)
}

#[wasm_bindgen]
pub fn active_slot() -> Result<String, JsValue> {
    with_session(|s| s.coordinator.borrow().registry().active_slot_name().to_string())
}

/// Current roster as JSON, in initiative order after a roll
#[wasm_bindgen]
pub fn players() -> Result<String, JsValue> {
    let players = with_session(|s| s.coordinator.borrow().roster().to_vec())?;
    to_json(&players)
}

/// Drive debounced writes; call from a timer or animation frame.
/// Returns true when a write was attempted.
#[wasm_bindgen]
pub fn tick() -> Result<bool, JsValue> {
    with_session(|s| s.coordinator.borrow_mut().poll())
}

/// Write pending edits now (e.g. on `pagehide`)
#[wasm_bindgen]
pub fn flush() -> Result<(), JsValue> {
    with_session(|s| s.coordinator.borrow_mut().flush())
}
