//! Typed publish/subscribe bus
//!
//! Dispatch contract:
//! - subscribers run synchronously, in subscription order
//! - the subscriber list is snapshotted when an emission starts, so
//!   subscribing or unsubscribing inside a handler affects only later
//!   emissions
//! - an emission made inside a handler is dispatched depth-first: all of its
//!   subscribers run before the outer emission reaches its next subscriber

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::roster::{Player, PlayerId};

/// Anything that can travel on the bus
pub trait Signal {
    /// Wire name used in logs (`player:add`, `roll:complete`, ...)
    fn name(&self) -> &'static str;
}

/// Signals exchanged between the core and its presentation collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Add a participant; `None` creates a placeholder
    PlayerAdd(Option<Player>),
    /// Remove the participant with this uuid
    PlayerDelete(PlayerId),
    /// Edited fields of an existing participant
    PlayerUpdate(Player),
    /// Roll initiative
    RollStart,
    /// Spell-cast trigger; rolls initiative like `RollStart`
    SpellCast,
    /// Resolved roster, index 0 acts first
    RollComplete(Vec<Player>),
    SaveSlotCreate { slot_name: String },
    SaveSlotSelect { slot_name: String },
    SaveSlotDelete { slot_name: String },
    SaveSlotCreated { slot_name: String },
    SaveSlotCurrentChanged { slot_name: String },
    SaveSlotDeleted { slot_name: String },
}

impl Signal for Event {
    fn name(&self) -> &'static str {
        match self {
            Event::PlayerAdd(_) => "player:add",
            Event::PlayerDelete(_) => "player:delete",
            Event::PlayerUpdate(_) => "player:update",
            Event::RollStart => "roll:start",
            Event::SpellCast => "spell:cast",
            Event::RollComplete(_) => "roll:complete",
            Event::SaveSlotCreate { .. } => "saveSlot:create",
            Event::SaveSlotSelect { .. } => "saveSlot:select",
            Event::SaveSlotDelete { .. } => "saveSlot:delete",
            Event::SaveSlotCreated { .. } => "saveSlot:created",
            Event::SaveSlotCurrentChanged { .. } => "saveSlot:currentChanged",
            Event::SaveSlotDeleted { .. } => "saveSlot:deleted",
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Rc<dyn Fn(&E)>;

pub struct EventBus<E> {
    subscribers: RefCell<Vec<(SubscriptionId, Handler<E>)>>,
    next_id: Cell<u64>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }
}

impl<E: Signal> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: impl Fn(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Handler<E>> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        log::debug!(
            "Event emitted: {} ({} subscribers)",
            event.name(),
            snapshot.len()
        );
        for handler in snapshot {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Probe {
        Outer,
        Inner,
        Nth(u32),
    }

    impl Signal for Probe {
        fn name(&self) -> &'static str {
            "probe"
        }
    }

    fn recorder() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn nested_emission_is_depth_first() {
        let bus = Rc::new(EventBus::<Probe>::new());
        let log = recorder();

        {
            let log = log.clone();
            let weak = Rc::downgrade(&bus);
            bus.subscribe(move |e| {
                log.borrow_mut().push(format!("first:{:?}", e));
                if *e == Probe::Outer {
                    if let Some(bus) = weak.upgrade() {
                        bus.emit(&Probe::Inner);
                    }
                }
            });
        }
        {
            let log = log.clone();
            bus.subscribe(move |e| log.borrow_mut().push(format!("second:{:?}", e)));
        }

        bus.emit(&Probe::Outer);

        assert_eq!(
            *log.borrow(),
            ["first:Outer", "first:Inner", "second:Inner", "second:Outer"]
        );
    }

    #[test]
    fn subscribe_during_dispatch_waits_for_next_emission() {
        let bus = Rc::new(EventBus::<Probe>::new());
        let log = recorder();

        {
            let log = log.clone();
            let weak = Rc::downgrade(&bus);
            bus.subscribe(move |_| {
                if let Some(bus) = weak.upgrade() {
                    let log = log.clone();
                    bus.subscribe(move |e| log.borrow_mut().push(format!("late:{:?}", e)));
                }
            });
        }

        bus.emit(&Probe::Nth(1));
        assert!(log.borrow().is_empty());
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(&Probe::Nth(2));
        assert_eq!(*log.borrow(), ["late:Nth(2)"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::<Probe>::new();
        let log = recorder();
        let id = {
            let log = log.clone();
            bus.subscribe(move |e| log.borrow_mut().push(format!("{:?}", e)))
        };

        bus.emit(&Probe::Nth(1));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&Probe::Nth(2));

        assert_eq!(*log.borrow(), ["Nth(1)"]);
    }

    #[test]
    fn event_wire_names() {
        assert_eq!(Event::RollStart.name(), "roll:start");
        assert_eq!(Event::RollComplete(Vec::new()).name(), "roll:complete");
        assert_eq!(
            Event::SaveSlotCurrentChanged {
                slot_name: "a".to_string()
            }
            .name(),
            "saveSlot:currentChanged"
        );
    }

    proptest! {
        #[test]
        fn subscribers_run_in_subscription_order(count in 1usize..12, emissions in 1u32..5) {
            let bus = EventBus::<Probe>::new();
            let log = Rc::new(RefCell::new(Vec::new()));
            for i in 0..count {
                let log = log.clone();
                bus.subscribe(move |e| {
                    if let Probe::Nth(n) = e {
                        log.borrow_mut().push((*n, i));
                    }
                });
            }
            for n in 0..emissions {
                bus.emit(&Probe::Nth(n));
            }

            let expected: Vec<(u32, usize)> = (0..emissions)
                .flat_map(|n| (0..count).map(move |i| (n, i)))
                .collect();
            prop_assert_eq!(log.borrow().clone(), expected);
        }
    }
}
