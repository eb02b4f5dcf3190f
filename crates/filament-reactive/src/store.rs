//! Property store: named values per source object with change notification.
//!
//! The store is the single shared registry behind all property
//! bindings. Each `(owner, name)` pair owns one [`Slot`] holding the
//! current value and the bindings registered against the pair, in
//! registration order.
//!
//! # Invariants
//!
//! 1. `get` never blocks and, for a live owner with a registered
//!    name, never fails.
//! 2. `set` with a value equal to the stored one does nothing: no
//!    write, no notification. This holds across repeated identical
//!    external updates.
//! 3. Notification order is binding-registration order.
//! 4. Dispatch iterates a snapshot, so a binding released from inside
//!    a sink (its own or a sibling's) stops firing immediately and
//!    never corrupts iteration.
//! 5. After [`remove_source`](PropertyStore::remove_source), `get`
//!    reports the owner as dead and no binding on it fires again.
//!
//! # Failure Modes
//!
//! - `get` on a never-registered name: `UnknownProperty`.
//! - `get` on a removed owner: `DeadSource`.
//! - `set` on a removed owner: dropped with a debug log.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use tracing::{debug, trace};

use filament_core::{Result, SourceError, SourceId, Value};

/// One property binding registered on a slot.
pub(crate) struct BindingEntry {
    pub(crate) id: u64,
    pub(crate) alive: Rc<Cell<bool>>,
    /// Transform-then-sink, pre-composed by the binding engine.
    pub(crate) apply: Rc<dyn Fn(&Value)>,
}

/// Stored value plus the bindings observing it.
#[derive(Default)]
pub(crate) struct Slot {
    pub(crate) value: Value,
    pub(crate) bindings: Vec<BindingEntry>,
}

#[derive(Default)]
pub(crate) struct StoreInner {
    pub(crate) slots: AHashMap<SourceId, AHashMap<String, Slot>>,
    pub(crate) dead: AHashSet<SourceId>,
    pub(crate) next_binding_id: u64,
}

/// Shared, single-threaded property store. Cloning yields another
/// handle to the same registry.
#[derive(Clone, Default)]
pub struct PropertyStore {
    pub(crate) inner: Rc<RefCell<StoreInner>>,
}

impl PropertyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property with an initial value. No-op if the pair
    /// already exists; no binding is notified.
    pub fn register(&self, owner: SourceId, name: &str, initial: impl Into<Value>) {
        let mut inner = self.inner.borrow_mut();
        inner
            .slots
            .entry(owner)
            .or_default()
            .entry(name.to_owned())
            .or_insert_with(|| Slot {
                value: initial.into(),
                bindings: Vec::new(),
            });
    }

    /// Read the current value of `(owner, name)`.
    pub fn get(&self, owner: SourceId, name: &str) -> Result<Value> {
        let inner = self.inner.borrow();
        if let Some(slot) = inner.slots.get(&owner).and_then(|props| props.get(name)) {
            return Ok(slot.value.clone());
        }
        if inner.dead.contains(&owner) {
            return Err(SourceError::DeadSource { owner });
        }
        Err(SourceError::unknown_property(owner, name))
    }

    /// Whether `(owner, name)` currently has a slot.
    #[must_use]
    pub fn contains(&self, owner: SourceId, name: &str) -> bool {
        self.inner
            .borrow()
            .slots
            .get(&owner)
            .is_some_and(|props| props.contains_key(name))
    }

    /// Store a new value and notify the pair's bindings, in
    /// registration order, unless the value is unchanged.
    ///
    /// A first `set` for an unknown pair registers it implicitly; the
    /// sources behind the bar publish without a separate registration
    /// step.
    pub fn set(&self, owner: SourceId, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let snapshot: Vec<(Rc<Cell<bool>>, Rc<dyn Fn(&Value)>)> = {
            let mut inner = self.inner.borrow_mut();
            if inner.dead.contains(&owner) {
                debug!(%owner, name, "set on removed source dropped");
                return;
            }
            let slot = inner
                .slots
                .entry(owner)
                .or_default()
                .entry(name.to_owned())
                .or_default();
            if slot.value == value {
                trace!(%owner, name, "equal value suppressed");
                return;
            }
            slot.value = value.clone();
            // Lazy cleanup of released entries, then snapshot for dispatch.
            slot.bindings.retain(|entry| entry.alive.get());
            slot.bindings
                .iter()
                .map(|entry| (Rc::clone(&entry.alive), Rc::clone(&entry.apply)))
                .collect()
        };
        for (alive, apply) in snapshot {
            if alive.get() {
                apply(&value);
            }
        }
    }

    /// Tear down everything belonging to `owner`: all slots are
    /// dropped, every binding on them is invalidated, and subsequent
    /// `get`s report the source as dead.
    pub fn remove_source(&self, owner: SourceId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(props) = inner.slots.remove(&owner) {
            let mut invalidated = 0usize;
            for slot in props.into_values() {
                for entry in slot.bindings {
                    entry.alive.set(false);
                    invalidated += 1;
                }
            }
            debug!(%owner, invalidated, "source removed");
        }
        inner.dead.insert(owner);
    }

    /// Number of live bindings registered on `(owner, name)`.
    #[must_use]
    pub fn binding_count(&self, owner: SourceId, name: &str) -> usize {
        self.inner
            .borrow()
            .slots
            .get(&owner)
            .and_then(|props| props.get(name))
            .map_or(0, |slot| {
                slot.bindings.iter().filter(|b| b.alive.get()).count()
            })
    }
}

impl std::fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("PropertyStore")
            .field("sources", &inner.slots.len())
            .field("dead", &inner.dead.len())
            .finish()
    }
}
