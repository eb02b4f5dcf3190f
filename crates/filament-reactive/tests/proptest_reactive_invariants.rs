//! Property-based invariant tests for the property store, binding
//! engine, and event bus.
//!
//! These tests verify structural invariants that must hold for any
//! valid inputs:
//!
//! 1. `get` returns the last `set` value for any write sequence.
//! 2. A sink observes no two equal consecutive values (suppression).
//! 3. A sink observes exactly the distinct transitions, in order.
//! 4. Notification reaches bindings in registration order.
//! 5. A released binding never fires again, wherever the release
//!    lands in the write sequence.
//! 6. After `remove_source`, no binding fires and `get` reports dead.
//! 7. `publish` reaches every live subscriber exactly once, in
//!    subscription order.
//! 8. Sinks observing the same pair agree with `get` at every step.
//! 9. No panics on arbitrary value sequences.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;

use filament_core::{SourceId, Value};
use filament_reactive::{EventBus, PropertyStore};

// ── Helpers ─────────────────────────────────────────────────────────────

/// Scalar values only: `Float` is excluded so that `PartialEq` is a
/// proper equivalence and suppression is well-defined.
fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        "[a-z]{0,8}".prop_map(Value::Text),
    ]
}

fn value_seq() -> impl Strategy<Value = Vec<Value>> {
    proptest::collection::vec(value_strategy(), 1..32)
}

fn collector() -> (Rc<RefCell<Vec<Value>>>, impl Fn(&Value) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    (seen, move |v: &Value| sink.borrow_mut().push(v.clone()))
}

/// The initial value plus every write that differs from its
/// predecessor: exactly what a binding registered up-front must see.
fn distinct_transitions(initial: &Value, writes: &[Value]) -> Vec<Value> {
    let mut expected = vec![initial.clone()];
    for w in writes {
        if expected.last() != Some(w) {
            expected.push(w.clone());
        }
    }
    expected
}

// ═════════════════════════════════════════════════════════════════════════
// 1. get returns the last set value
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn get_returns_last_set(writes in value_seq()) {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        for w in &writes {
            store.set(owner, "p", w.clone());
        }
        prop_assert_eq!(
            store.get(owner, "p").unwrap(),
            writes.last().unwrap().clone()
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2 + 3. A sink sees exactly the distinct transitions, in order
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn sink_sees_distinct_transitions(initial in value_strategy(), writes in value_seq()) {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "p", initial.clone());

        let (seen, sink) = collector();
        let _b = store.bind(owner, "p", sink).unwrap();

        for w in &writes {
            store.set(owner, "p", w.clone());
        }

        let observed = seen.borrow().clone();
        prop_assert_eq!(observed.clone(), distinct_transitions(&initial, &writes));
        for pair in observed.windows(2) {
            prop_assert_ne!(&pair[0], &pair[1], "equal consecutive notification");
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Registration order is notification order
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn bindings_fire_in_registration_order(n in 1usize..8, writes in value_seq()) {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "p", Value::Null);

        let order = Rc::new(RefCell::new(Vec::new()));
        let guards: Vec<_> = (0..n)
            .map(|i| {
                let o = Rc::clone(&order);
                store.bind(owner, "p", move |_| o.borrow_mut().push(i)).unwrap()
            })
            .collect();
        order.borrow_mut().clear(); // initial paints

        for w in &writes {
            store.set(owner, "p", w.clone());
        }

        let fired = order.borrow().clone();
        prop_assert_eq!(fired.len() % n, 0);
        for round in fired.chunks(n) {
            prop_assert_eq!(round.to_vec(), (0..n).collect::<Vec<_>>());
        }
        drop(guards);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. A released binding never fires again
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn released_binding_is_silent(writes in value_seq(), release_at in 0usize..32) {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "p", Value::Null);

        let count = Rc::new(RefCell::new(0usize));
        let c = Rc::clone(&count);
        let mut guard = Some(
            store.bind(owner, "p", move |_| *c.borrow_mut() += 1).unwrap()
        );

        let mut fired_while_live = 0usize;
        for (i, w) in writes.iter().enumerate() {
            if i == release_at
                && let Some(b) = guard.take()
            {
                fired_while_live = *count.borrow();
                b.release();
            }
            store.set(owner, "p", w.clone());
        }

        if guard.is_none() && release_at < writes.len() {
            prop_assert_eq!(*count.borrow(), fired_while_live);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. remove_source silences bindings and kills reads
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn removed_source_is_inert(writes in value_seq()) {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "p", Value::Null);

        let (seen, sink) = collector();
        let b = store.bind(owner, "p", sink).unwrap();
        let painted = seen.borrow().len();

        store.remove_source(owner);
        prop_assert!(!b.is_live());

        for w in &writes {
            store.set(owner, "p", w.clone());
        }
        prop_assert_eq!(seen.borrow().len(), painted);
        prop_assert!(store.get(owner, "p").is_err());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. publish reaches every live subscriber exactly once, in order
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn publish_fans_out_once_in_order(
        n in 1usize..8,
        payloads in proptest::collection::vec(value_strategy(), 1..16),
    ) {
        let bus = EventBus::new();
        let owner = SourceId::next();

        let log = Rc::new(RefCell::new(Vec::new()));
        let subs: Vec<_> = (0..n)
            .map(|i| {
                let l = Rc::clone(&log);
                bus.subscribe(owner, "e", move |p| l.borrow_mut().push((i, p.clone())))
            })
            .collect();

        for p in &payloads {
            bus.publish(owner, "e", p);
        }

        let delivered = log.borrow().clone();
        prop_assert_eq!(delivered.len(), n * payloads.len());
        for (round, p) in payloads.iter().enumerate() {
            for i in 0..n {
                prop_assert_eq!(&delivered[round * n + i], &(i, p.clone()));
            }
        }
        drop(subs);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 8. An identity binding tracks get at every step
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn identity_binding_tracks_get(writes in value_seq()) {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "p", Value::Null);

        let last = Rc::new(RefCell::new(Value::Null));
        let l = Rc::clone(&last);
        let _b = store
            .bind(owner, "p", move |v| *l.borrow_mut() = v.clone())
            .unwrap();

        for w in &writes {
            store.set(owner, "p", w.clone());
            prop_assert_eq!(last.borrow().clone(), store.get(owner, "p").unwrap());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 9. No panics on arbitrary interleavings
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn arbitrary_interleaving_never_panics(
        ops in proptest::collection::vec((0u8..4, value_strategy()), 0..48),
    ) {
        let store = PropertyStore::new();
        let bus = EventBus::new();
        let owner = SourceId::next();
        let mut guards = Vec::new();
        let mut subs = Vec::new();

        for (op, v) in ops {
            match op {
                0 => store.set(owner, "p", v),
                1 => {
                    if let Ok(b) = store.bind(owner, "p", |_| {}) {
                        guards.push(b);
                    }
                }
                2 => {
                    subs.push(bus.subscribe(owner, "e", |_| {}));
                    bus.publish(owner, "e", &v);
                }
                _ => {
                    guards.pop();
                    subs.pop();
                }
            }
        }
        store.remove_source(owner);
        bus.remove_source(owner);
        store.set(owner, "p", Value::Null);
        bus.publish(owner, "e", &Value::Null);
    }
}
