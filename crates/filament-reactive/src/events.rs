//! Event bus: per-source pub/sub for discrete, non-retained events.
//!
//! Where a property is a continuous value you can always read back,
//! an event is transient: "this tray item was just added", "this
//! player closed". Payloads are delivered to live handlers and then
//! gone; there is no "get the last event".
//!
//! The common structural pattern pairs two events: a handler for
//! `"added"` builds a widget node from the payload and appends it,
//! and that new node owns a subscription to the matching `"removed"`
//! or `"closed"` event that detaches it again. The pairing must be
//! symmetric or the node leaks.
//!
//! # Invariants
//!
//! 1. `publish` invokes every live handler for the `(owner, event)`
//!    pair exactly once, in subscription order, synchronously.
//! 2. Dispatch iterates a snapshot; a handler unsubscribing itself or
//!    a sibling takes effect immediately and never corrupts iteration.
//! 3. Subscribing to a source that has published nothing yet is fine;
//!    the channel is created empty on demand.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use tracing::debug;

use filament_core::{SourceId, Value};

pub(crate) struct SubEntry {
    id: u64,
    alive: Rc<Cell<bool>>,
    handler: Rc<dyn Fn(&Value)>,
}

#[derive(Default)]
pub(crate) struct BusInner {
    channels: AHashMap<SourceId, AHashMap<String, Vec<SubEntry>>>,
    next_id: u64,
}

/// Shared, single-threaded event bus. Cloning yields another handle
/// to the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

/// RAII guard for one live event subscription.
pub struct Subscription {
    owner: SourceId,
    event: String,
    id: u64,
    alive: Rc<Cell<bool>>,
    bus: Weak<RefCell<BusInner>>,
}

impl Subscription {
    /// Unsubscribe now. Consuming the guard makes a double release
    /// unrepresentable.
    pub fn release(mut self) {
        self.release_in_place();
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.alive.get()
    }

    fn release_in_place(&mut self) {
        if !self.alive.replace(false) {
            return;
        }
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        if let Ok(mut inner) = bus.try_borrow_mut()
            && let Some(subs) = inner
                .channels
                .get_mut(&self.owner)
                .and_then(|events| events.get_mut(&self.event))
        {
            subs.retain(|entry| entry.id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_in_place();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("owner", &self.owner)
            .field("event", &self.event)
            .field("live", &self.alive.get())
            .finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `(owner, event)`. The handle keeps the
    /// subscription live; dropping or releasing it unsubscribes.
    #[must_use]
    pub fn subscribe(
        &self,
        owner: SourceId,
        event: &str,
        handler: impl Fn(&Value) + 'static,
    ) -> Subscription {
        let alive = Rc::new(Cell::new(true));
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .channels
            .entry(owner)
            .or_default()
            .entry(event.to_owned())
            .or_default()
            .push(SubEntry {
                id,
                alive: Rc::clone(&alive),
                handler: Rc::new(handler),
            });
        Subscription {
            owner,
            event: event.to_owned(),
            id,
            alive,
            bus: Rc::downgrade(&self.inner),
        }
    }

    /// Deliver `payload` to every live handler for `(owner, event)`,
    /// in subscription order.
    pub fn publish(&self, owner: SourceId, event: &str, payload: &Value) {
        let snapshot: Vec<(Rc<Cell<bool>>, Rc<dyn Fn(&Value)>)> = {
            let mut inner = self.inner.borrow_mut();
            let Some(subs) = inner
                .channels
                .get_mut(&owner)
                .and_then(|events| events.get_mut(event))
            else {
                return;
            };
            subs.retain(|entry| entry.alive.get());
            subs.iter()
                .map(|entry| (Rc::clone(&entry.alive), Rc::clone(&entry.handler)))
                .collect()
        };
        for (alive, handler) in snapshot {
            if alive.get() {
                handler(payload);
            }
        }
    }

    /// Drop every channel belonging to `owner` and invalidate its
    /// subscriptions. Best-effort teardown for sources that are gone.
    pub fn remove_source(&self, owner: SourceId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(events) = inner.channels.remove(&owner) {
            let mut invalidated = 0usize;
            for subs in events.into_values() {
                for entry in subs {
                    entry.alive.set(false);
                    invalidated += 1;
                }
            }
            debug!(%owner, invalidated, "event channels removed");
        }
    }

    /// Number of live subscriptions on `(owner, event)`.
    #[must_use]
    pub fn subscriber_count(&self, owner: SourceId, event: &str) -> usize {
        self.inner
            .borrow()
            .channels
            .get(&owner)
            .and_then(|events| events.get(event))
            .map_or(0, |subs| subs.iter().filter(|s| s.alive.get()).count())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventBus")
            .field("sources", &inner.channels.len())
            .finish()
    }
}
