//! Property-based invariant tests for widget-tree lifecycle.
//!
//! These tests verify structural invariants that must hold for any
//! valid inputs:
//!
//! 1. Detaching a root kills every node of the subtree, however the
//!    tree is shaped.
//! 2. Detach releases every binding the subtree took, leaving zero
//!    live bindings on every bound property.
//! 3. Detach is idempotent for arbitrary trees.
//! 4. `replace_children` leaves exactly the fresh children attached
//!    and every previous child dead.
//! 5. Writes after detach have no observable effect on any attribute.

use proptest::prelude::*;

use filament_core::{SourceId, Value};
use filament_reactive::PropertyStore;
use filament_widgets::{WidgetKind, WidgetNode};

// ── Helpers ─────────────────────────────────────────────────────────────

/// Tree shape: child counts per level, up to 3 levels deep.
fn shape_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    proptest::collection::vec(proptest::collection::vec(0usize..4, 1..4), 0..3)
}

/// Build a tree from a shape, collecting every created node.
fn build_tree(shape: &[Vec<usize>]) -> (WidgetNode, Vec<WidgetNode>) {
    let root = WidgetNode::new(WidgetKind::Box);
    let mut all = vec![root.clone()];
    let mut frontier = vec![root.clone()];
    for level in shape {
        let mut next = Vec::new();
        for (parent, count) in frontier.iter().zip(level.iter().cycle()) {
            for _ in 0..*count {
                let child = WidgetNode::new(WidgetKind::Label);
                parent.append(child.clone());
                all.push(child.clone());
                next.push(child);
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    (root, all)
}

// ═════════════════════════════════════════════════════════════════════════
// 1 + 3. Detach kills the whole subtree, idempotently
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn detach_kills_subtree(shape in shape_strategy()) {
        let (root, all) = build_tree(&shape);
        root.detach();
        for node in &all {
            prop_assert!(node.is_dead());
        }
        root.detach(); // second detach is a no-op
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2 + 5. Detach releases all bindings; later writes are inert
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn detach_releases_all_bindings(shape in shape_strategy(), writes in any::<i64>()) {
        let store = PropertyStore::new();
        let owner = SourceId::next();
        store.register(owner, "v", 0i64);

        let (root, all) = build_tree(&shape);
        for node in &all {
            node.bind_attr(&store, "label", owner, "v").unwrap();
        }
        prop_assert_eq!(store.binding_count(owner, "v"), all.len());

        root.detach();
        prop_assert_eq!(store.binding_count(owner, "v"), 0);

        store.set(owner, "v", writes);
        for node in &all {
            prop_assert_eq!(node.attr("label"), None, "dead node attrs are inert");
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. replace_children: fresh attached, previous dead
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn replace_children_full_swap(before in 0usize..6, after in 0usize..6) {
        let parent = WidgetNode::new(WidgetKind::Box);
        let old: Vec<WidgetNode> = (0..before)
            .map(|_| {
                let c = WidgetNode::new(WidgetKind::Label);
                parent.append(c.clone());
                c
            })
            .collect();

        let fresh: Vec<WidgetNode> =
            (0..after).map(|_| WidgetNode::new(WidgetKind::Label)).collect();
        parent.replace_children(fresh.clone());

        prop_assert_eq!(parent.child_count(), after);
        for c in &old {
            prop_assert!(c.is_dead());
        }
        for (i, c) in fresh.iter().enumerate() {
            prop_assert!(!c.is_dead());
            prop_assert_eq!(parent.child(i).unwrap().id(), c.id());
        }
    }
}
