//! Roll Keeper entry point
//!
//! Natively this runs a short session against a JSON file store: it loads
//! the active slot, rolls initiative once and prints the order. The web
//! build is driven from JavaScript through the exports in `roll_keeper::web`.

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    use std::cell::RefCell;
    use std::process::ExitCode;
    use std::rc::Rc;

    use roll_keeper::events::{Event, EventBus};
    use roll_keeper::initiative::{PcgDie, seeded_rng};
    use roll_keeper::platform::{FileStore, SystemClock};
    use roll_keeper::roster::{self, RosterCoordinator};
    use roll_keeper::{RollOutcome, Settings, SlotRegistry};

    /// RNG salt for the session die
    const DIE_RNG_SALT: u64 = 3;

    env_logger::init();
    log::info!("Roll Keeper (native) starting...");

    let settings = Settings::load();
    let path = std::env::var("ROLL_KEEPER_STORE")
        .unwrap_or_else(|_| "roll_keeper_store.json".to_string());
    let store = match FileStore::open(&path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Cannot open store {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    let registry = SlotRegistry::open(Box::new(store), settings.registry_config());
    let die = PcgDie::from_rng(seeded_rng(settings.seed, DIE_RNG_SALT));
    let coordinator = Rc::new(RefCell::new(RosterCoordinator::new(
        registry,
        &settings,
        Box::new(die),
        Box::new(SystemClock::new()),
    )));
    let bus = Rc::new(EventBus::new());
    roster::attach(&coordinator, &bus);

    let order = Rc::new(RefCell::new(Vec::<RollOutcome>::new()));
    {
        let order = order.clone();
        bus.subscribe(move |event: &Event| {
            if let Event::RollComplete(players) = event {
                *order.borrow_mut() = players.iter().map(RollOutcome::from).collect();
            }
        });
    }

    bus.emit(&Event::RollStart);
    coordinator.borrow_mut().flush();

    println!(
        "Initiative for slot {:?}:",
        coordinator.borrow().registry().active_slot_name()
    );
    for (turn, outcome) in order.borrow().iter().enumerate() {
        let roll = outcome.roll.map_or_else(|| "-".to_string(), |r| r.to_string());
        match outcome.reroll {
            Some(reroll) => println!(
                "{:>3}. {:<20} {:>3} (tie-break {})",
                turn + 1,
                outcome.name,
                roll,
                reroll
            ),
            None => println!("{:>3}. {:<20} {:>3}", turn + 1, outcome.name, roll),
        }
    }
    ExitCode::SUCCESS
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is roll_keeper::web::start, this is just to satisfy the compiler
}
