//! Binding engine: live links from store properties to sinks.
//!
//! A binding composes an optional transform with a sink and registers
//! the pair against one `(owner, property)` slot. Creation paints the
//! sink once with the current value; every subsequent store
//! notification re-evaluates and writes, synchronously, on the same
//! call stack as the mutation that triggered it. There is no batching
//! or coalescing beyond the store's own equal-value suppression.
//!
//! # Failure Modes
//!
//! - Binding a name the owner never registered: `UnknownProperty`,
//!   fatal to this binding only.
//! - Transform failure (initial paint or update): logged via
//!   `tracing::warn!`; the sink keeps its last good value and the
//!   binding stays live for future updates.
//! - Release is idempotent by construction: [`Binding::release`]
//!   consumes the guard and `Drop` covers the rest.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::warn;

use filament_core::{Result, SourceId, TransformError, Value};

use crate::store::{BindingEntry, PropertyStore, StoreInner};

/// RAII guard for one live binding. Dropping it (or calling
/// [`release`](Binding::release)) unregisters the sink; no write
/// attributable to this binding happens afterwards.
pub struct Binding {
    owner: SourceId,
    name: String,
    id: u64,
    alive: Rc<Cell<bool>>,
    store: Weak<RefCell<StoreInner>>,
}

impl Binding {
    /// Release the binding now. Consuming the guard makes a double
    /// release unrepresentable.
    pub fn release(mut self) {
        self.release_in_place();
    }

    /// Whether the binding can still fire.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.alive.get()
    }

    /// The pair this binding observes.
    #[must_use]
    pub fn pair(&self) -> (SourceId, &str) {
        (self.owner, &self.name)
    }

    fn release_in_place(&mut self) {
        if !self.alive.replace(false) {
            return;
        }
        let Some(store) = self.store.upgrade() else {
            return;
        };
        // The registry is never borrowed while user code runs, but a
        // release from inside a store method would deadlock a plain
        // borrow_mut; the alive flag above already stops dispatch, so
        // entry removal can wait for the next lazy cleanup.
        if let Ok(mut inner) = store.try_borrow_mut()
            && let Some(slot) = inner
                .slots
                .get_mut(&self.owner)
                .and_then(|props| props.get_mut(&self.name))
        {
            slot.bindings.retain(|entry| entry.id != self.id);
        }
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.release_in_place();
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("live", &self.alive.get())
            .finish()
    }
}

type TransformFn = Rc<dyn Fn(&Value) -> std::result::Result<Value, TransformError>>;

impl PropertyStore {
    /// Bind `(owner, name)` straight to `sink` (identity transform).
    pub fn bind(
        &self,
        owner: SourceId,
        name: &str,
        sink: impl Fn(&Value) + 'static,
    ) -> Result<Binding> {
        self.bind_inner(owner, name, None, Rc::new(sink))
    }

    /// Bind through an infallible transform.
    pub fn bind_map(
        &self,
        owner: SourceId,
        name: &str,
        map: impl Fn(&Value) -> Value + 'static,
        sink: impl Fn(&Value) + 'static,
    ) -> Result<Binding> {
        self.bind_inner(owner, name, Some(Rc::new(move |v: &Value| Ok(map(v)))), Rc::new(sink))
    }

    /// Bind through a fallible transform. A failing transform is
    /// reported and skipped; the binding stays live.
    pub fn bind_try_map(
        &self,
        owner: SourceId,
        name: &str,
        map: impl Fn(&Value) -> std::result::Result<Value, TransformError> + 'static,
        sink: impl Fn(&Value) + 'static,
    ) -> Result<Binding> {
        self.bind_inner(owner, name, Some(Rc::new(map)), Rc::new(sink))
    }

    fn bind_inner(
        &self,
        owner: SourceId,
        name: &str,
        transform: Option<TransformFn>,
        sink: Rc<dyn Fn(&Value)>,
    ) -> Result<Binding> {
        let current = self.get(owner, name)?;

        let apply: Rc<dyn Fn(&Value)> = match transform {
            None => sink,
            Some(map) => {
                let prop = name.to_owned();
                Rc::new(move |value: &Value| match map(value) {
                    Ok(out) => sink(&out),
                    Err(err) => {
                        warn!(%owner, name = %prop, %err, "transform failed; sink keeps last value");
                    }
                })
            }
        };

        // Initial paint, before registration so a re-entrant set from
        // the sink cannot double-deliver the first value.
        apply(&current);

        let alive = Rc::new(Cell::new(true));
        let mut inner = self.inner.borrow_mut();
        inner.next_binding_id += 1;
        let id = inner.next_binding_id;
        if let Some(slot) = inner
            .slots
            .get_mut(&owner)
            .and_then(|props| props.get_mut(name))
        {
            slot.bindings.push(BindingEntry {
                id,
                alive: Rc::clone(&alive),
                apply,
            });
        } else {
            // The initial paint tore the slot down (e.g. the sink
            // removed the source). The guard stays inert.
            warn!(%owner, name, "slot vanished during bind; binding is inert");
            alive.set(false);
        }
        Ok(Binding {
            owner,
            name: name.to_owned(),
            id,
            alive,
            store: Rc::downgrade(&self.inner),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filament_core::SourceError;

    fn collector() -> (Rc<RefCell<Vec<Value>>>, impl Fn(&Value) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);
        (seen, move |v: &Value| sink_seen.borrow_mut().push(v.clone()))
    }

    #[test]
    fn initial_paint_then_update() {
        let store = PropertyStore::new();
        let ws = SourceId::next();
        store.register(ws, "id", 3i64);

        let (seen, sink) = collector();
        let _b = store.bind(ws, "id", sink).unwrap();

        store.set(ws, "id", 5i64);
        assert_eq!(*seen.borrow(), vec![Value::Int(3), Value::Int(5)]);
    }

    #[test]
    fn equal_value_writes_once() {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "v", 1i64);

        let (seen, sink) = collector();
        let _b = store.bind(owner, "v", sink).unwrap();

        store.set(owner, "v", 2i64);
        store.set(owner, "v", 2i64);
        store.set(owner, "v", 2i64);
        assert_eq!(*seen.borrow(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn bind_unknown_property_fails() {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        let err = store.bind(owner, "nope", |_| {}).unwrap_err();
        assert!(matches!(err, SourceError::UnknownProperty { .. }));
    }

    #[test]
    fn release_stops_writes() {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "v", 0i64);

        let (seen, sink) = collector();
        let b = store.bind(owner, "v", sink).unwrap();
        b.release();

        store.set(owner, "v", 9i64);
        assert_eq!(*seen.borrow(), vec![Value::Int(0)], "only the initial paint");
        assert_eq!(store.binding_count(owner, "v"), 0);
    }

    #[test]
    fn drop_releases() {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "v", 0i64);

        let (seen, sink) = collector();
        {
            let _b = store.bind(owner, "v", sink).unwrap();
            store.set(owner, "v", 1i64);
        }
        store.set(owner, "v", 2i64);
        assert_eq!(*seen.borrow(), vec![Value::Int(0), Value::Int(1)]);
    }

    #[test]
    fn notification_in_registration_order() {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "v", 0i64);

        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = Rc::clone(&order);
        let o2 = Rc::clone(&order);
        let _a = store.bind(owner, "v", move |_| o1.borrow_mut().push("a")).unwrap();
        let _b = store.bind(owner, "v", move |_| o2.borrow_mut().push("b")).unwrap();
        order.borrow_mut().clear(); // discard initial paints

        store.set(owner, "v", 1i64);
        assert_eq!(*order.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn transform_applies() {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "volume", 40i64);

        let (seen, sink) = collector();
        let _b = store
            .bind_map(owner, "volume", |v| Value::Text(v.to_string()), sink)
            .unwrap();
        store.set(owner, "volume", 55i64);
        assert_eq!(
            *seen.borrow(),
            vec![Value::Text("40".into()), Value::Text("55".into())]
        );
    }

    #[test]
    fn failing_transform_keeps_last_value_and_stays_live() {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "v", 1i64);

        let (seen, sink) = collector();
        let _b = store
            .bind_try_map(
                owner,
                "v",
                |v| match v {
                    Value::Int(i) if *i >= 0 => Ok(Value::Int(i * 10)),
                    _ => Err(TransformError::new("negative")),
                },
                sink,
            )
            .unwrap();

        store.set(owner, "v", -1i64); // fails, skipped
        store.set(owner, "v", 4i64); // binding still live
        assert_eq!(*seen.borrow(), vec![Value::Int(10), Value::Int(40)]);
    }

    #[test]
    fn sink_may_release_sibling_mid_dispatch() {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "v", 0i64);

        let (seen, sink) = collector();
        let victim = Rc::new(RefCell::new(None::<Binding>));
        let victim_slot = Rc::clone(&victim);
        let _killer = store
            .bind(owner, "v", move |_| {
                if let Some(b) = victim_slot.borrow_mut().take() {
                    b.release();
                }
            })
            .unwrap();
        *victim.borrow_mut() = Some(store.bind(owner, "v", sink).unwrap());
        seen.borrow_mut().clear();

        // Killer runs first (registered first) and releases the victim;
        // the victim must not fire in the same dispatch.
        store.set(owner, "v", 1i64);
        assert!(seen.borrow().is_empty());

        store.set(owner, "v", 2i64);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn sink_may_release_itself_mid_dispatch() {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "v", 0i64);

        let fired = Rc::new(Cell::new(0u32));
        let fired_in_sink = Rc::clone(&fired);
        let slot: Rc<RefCell<Option<Binding>>> = Rc::new(RefCell::new(None));
        let slot_in_sink = Rc::clone(&slot);
        let b = store
            .bind(owner, "v", move |_| {
                fired_in_sink.set(fired_in_sink.get() + 1);
                if let Some(me) = slot_in_sink.borrow_mut().take() {
                    me.release();
                }
            })
            .unwrap();
        *slot.borrow_mut() = Some(b);
        fired.set(0); // ignore initial paint (guard not yet stashed then)

        store.set(owner, "v", 1i64);
        store.set(owner, "v", 2i64);
        assert_eq!(fired.get(), 1, "self-release takes effect immediately");
    }

    #[test]
    fn remove_source_invalidates_bindings() {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "v", 0i64);

        let (seen, sink) = collector();
        let b = store.bind(owner, "v", sink).unwrap();
        store.remove_source(owner);

        assert!(!b.is_live());
        store.set(owner, "v", 1i64);
        assert_eq!(*seen.borrow(), vec![Value::Int(0)]);
    }

    #[test]
    fn identity_binding_tracks_get() {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "v", 0i64);

        let last = Rc::new(RefCell::new(Value::Null));
        let last_sink = Rc::clone(&last);
        let _b = store
            .bind(owner, "v", move |v| *last_sink.borrow_mut() = v.clone())
            .unwrap();

        for i in [3i64, 3, 7, -2] {
            store.set(owner, "v", i);
            assert_eq!(*last.borrow(), store.get(owner, "v").unwrap());
        }
    }
}
