//! Widget nodes: tree structure, attribute bindings, and teardown.
//!
//! A [`WidgetNode`] is a cheap-clone handle (`Rc<RefCell<..>>`) to one
//! node of the UI tree. Every live binding or subscription a node
//! depends on is recorded in the node's owned set; nothing else holds
//! those guards. Teardown is therefore a tree operation, not a
//! capture-and-callback pattern: [`detach`](WidgetNode::detach) walks
//! children first, then releases the node's own handles in reverse
//! registration order, then marks the node dead.
//!
//! # Invariants
//!
//! 1. A node exclusively owns its bindings/subscriptions; they are
//!    never shared between nodes.
//! 2. After `detach` returns, no handler owned directly or
//!    transitively by the node can fire again.
//! 3. `detach` on an already-dead node is a no-op.
//! 4. One attribute has at most one binding: rebinding replaces the
//!    previous binding, never stacks.
//! 5. Attribute sinks hold weak node references; a write aimed at a
//!    dead or dropped node is inert.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use tracing::{debug, trace};

use filament_core::{Result, SourceId, TransformError, Value};
use filament_reactive::{Binding, PollSource, PropertyStore, Subscription};

/// Global counter for unique widget ids.
static WIDGET_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a widget node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId(u64);

impl WidgetId {
    fn next() -> Self {
        Self(WIDGET_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// The thin rendering-facing vocabulary. Painting and layout belong
/// to the backend; the core only names what a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    BarWindow,
    CenterBox,
    Box,
    EventBox,
    Label,
    Button,
    Icon,
    Scale,
    Separator,
}

/// A handle the node owns and must release on teardown.
pub enum OwnedHandle {
    Binding(Binding),
    Subscription(Subscription),
    /// A poll source the node exclusively reads; detaching the node
    /// cancels it.
    Poll(PollSource),
}

impl OwnedHandle {
    fn release(self) {
        match self {
            OwnedHandle::Binding(b) => b.release(),
            OwnedHandle::Subscription(s) => s.release(),
            OwnedHandle::Poll(p) => p.cancel(),
        }
    }
}

struct NodeInner {
    id: WidgetId,
    kind: WidgetKind,
    attrs: AHashMap<String, Value>,
    handlers: AHashMap<String, Rc<dyn Fn(&Value)>>,
    children: Vec<WidgetNode>,
    owned: Vec<OwnedHandle>,
    attr_bindings: AHashMap<String, Binding>,
    dead: bool,
}

/// Cheap-clone handle to one node of the widget tree.
#[derive(Clone)]
pub struct WidgetNode {
    inner: Rc<RefCell<NodeInner>>,
}

/// Weak counterpart of [`WidgetNode`], for sinks and handlers that
/// must not keep the node alive.
#[derive(Clone)]
pub struct WeakWidgetNode {
    inner: Weak<RefCell<NodeInner>>,
}

impl WeakWidgetNode {
    #[must_use]
    pub fn upgrade(&self) -> Option<WidgetNode> {
        self.inner.upgrade().map(|inner| WidgetNode { inner })
    }
}

impl WidgetNode {
    #[must_use]
    pub fn new(kind: WidgetKind) -> Self {
        Self {
            inner: Rc::new(RefCell::new(NodeInner {
                id: WidgetId::next(),
                kind,
                attrs: AHashMap::new(),
                handlers: AHashMap::new(),
                children: Vec::new(),
                owned: Vec::new(),
                attr_bindings: AHashMap::new(),
                dead: false,
            })),
        }
    }

    #[must_use]
    pub fn id(&self) -> WidgetId {
        self.inner.borrow().id
    }

    #[must_use]
    pub fn kind(&self) -> WidgetKind {
        self.inner.borrow().kind
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.inner.borrow().dead
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakWidgetNode {
        WeakWidgetNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // ── Attributes & handlers ───────────────────────────────────────

    /// Current value of an attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<Value> {
        self.inner.borrow().attrs.get(name).cloned()
    }

    /// Write a static attribute. No-op on a dead node.
    pub fn set_attr(&self, name: &str, value: impl Into<Value>) {
        let mut inner = self.inner.borrow_mut();
        if inner.dead {
            return;
        }
        inner.attrs.insert(name.to_owned(), value.into());
    }

    /// Install a handler (click, scroll, change, ...), replacing any
    /// previous handler of the same name.
    pub fn set_handler(&self, name: &str, handler: impl Fn(&Value) + 'static) {
        self.set_handler_rc(name, Rc::new(handler));
    }

    pub(crate) fn set_handler_rc(&self, name: &str, handler: Rc<dyn Fn(&Value)>) {
        let mut inner = self.inner.borrow_mut();
        if inner.dead {
            return;
        }
        inner.handlers.insert(name.to_owned(), handler);
    }

    /// Invoke a named handler with `payload`. The rendering backend
    /// calls this for input events; tests call it directly. Unknown
    /// handlers and dead nodes are ignored.
    pub fn invoke(&self, name: &str, payload: &Value) {
        let handler = {
            let inner = self.inner.borrow();
            if inner.dead {
                return;
            }
            inner.handlers.get(name).cloned()
        };
        if let Some(handler) = handler {
            handler(payload);
        }
    }

    // ── Children ────────────────────────────────────────────────────

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.borrow().children.len()
    }

    #[must_use]
    pub fn child(&self, index: usize) -> Option<WidgetNode> {
        self.inner.borrow().children.get(index).cloned()
    }

    /// Snapshot of the current child handles.
    #[must_use]
    pub fn children(&self) -> Vec<WidgetNode> {
        self.inner.borrow().children.clone()
    }

    /// Append a child. Appending to a dead node detaches the child
    /// instead; it would never be shown and must not leak.
    pub fn append(&self, child: WidgetNode) {
        let dead = self.inner.borrow().dead;
        if dead {
            debug!(child = ?child.id(), "append to dead node; child detached");
            child.detach();
            return;
        }
        self.inner.borrow_mut().children.push(child);
    }

    /// Remove `child` from this node and detach it. Returns whether
    /// the child was present.
    pub fn remove_child(&self, child: &WidgetNode) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let before = inner.children.len();
            let target = child.id();
            inner.children.retain(|c| c.id() != target);
            inner.children.len() != before
        };
        if removed {
            child.detach();
        }
        removed
    }

    /// Replace the whole child sequence: the previous children are
    /// detached (cascading), then `fresh` is attached in order. On a
    /// dead node the fresh children are detached instead.
    pub fn replace_children(&self, fresh: Vec<WidgetNode>) {
        let old = {
            let mut inner = self.inner.borrow_mut();
            if inner.dead {
                drop(inner);
                for child in fresh {
                    child.detach();
                }
                return;
            }
            std::mem::take(&mut inner.children)
        };
        for child in old {
            child.detach();
        }
        self.inner.borrow_mut().children = fresh;
    }

    // ── Ownership & teardown ────────────────────────────────────────

    /// Record a binding in the node's owned set. On a dead node the
    /// handle is released immediately.
    pub fn own_binding(&self, binding: Binding) {
        self.own(OwnedHandle::Binding(binding));
    }

    /// Record a subscription in the node's owned set.
    pub fn own_subscription(&self, subscription: Subscription) {
        self.own(OwnedHandle::Subscription(subscription));
    }

    /// Record a poll source in the node's owned set; detach cancels it.
    pub fn own_poll(&self, poll: PollSource) {
        self.own(OwnedHandle::Poll(poll));
    }

    fn own(&self, handle: OwnedHandle) {
        let dead = self.inner.borrow().dead;
        if dead {
            handle.release();
            return;
        }
        self.inner.borrow_mut().owned.push(handle);
    }

    /// Number of handles in the owned set (excluding attribute
    /// bindings).
    #[must_use]
    pub fn owned_count(&self) -> usize {
        self.inner.borrow().owned.len()
    }

    /// Tear the subtree down: descendants first (depth-first), then
    /// this node's owned handles in reverse registration order, then
    /// the attribute bindings. Idempotent.
    pub fn detach(&self) {
        let children = {
            let mut inner = self.inner.borrow_mut();
            if inner.dead {
                return;
            }
            std::mem::take(&mut inner.children)
        };
        for child in &children {
            child.detach();
        }
        let (owned, attr_bindings, id) = {
            let mut inner = self.inner.borrow_mut();
            inner.dead = true;
            (
                std::mem::take(&mut inner.owned),
                std::mem::take(&mut inner.attr_bindings),
                inner.id,
            )
        };
        for handle in owned.into_iter().rev() {
            handle.release();
        }
        for (_, binding) in attr_bindings {
            binding.release();
        }
        trace!(node = ?id, "detached");
    }

    // ── Attribute bindings ──────────────────────────────────────────

    /// Bind an attribute straight to `(owner, property)`.
    pub fn bind_attr(
        &self,
        store: &PropertyStore,
        attr: &str,
        owner: SourceId,
        property: &str,
    ) -> Result<()> {
        let binding = store.bind(owner, property, self.attr_sink(attr))?;
        self.insert_attr_binding(attr, binding);
        Ok(())
    }

    /// Bind an attribute through an infallible transform.
    pub fn bind_attr_map(
        &self,
        store: &PropertyStore,
        attr: &str,
        owner: SourceId,
        property: &str,
        map: impl Fn(&Value) -> Value + 'static,
    ) -> Result<()> {
        let binding = store.bind_map(owner, property, map, self.attr_sink(attr))?;
        self.insert_attr_binding(attr, binding);
        Ok(())
    }

    /// Bind an attribute through a fallible transform.
    pub fn bind_attr_try_map(
        &self,
        store: &PropertyStore,
        attr: &str,
        owner: SourceId,
        property: &str,
        map: impl Fn(&Value) -> std::result::Result<Value, TransformError> + 'static,
    ) -> Result<()> {
        let binding = store.bind_try_map(owner, property, map, self.attr_sink(attr))?;
        self.insert_attr_binding(attr, binding);
        Ok(())
    }

    fn attr_sink(&self, attr: &str) -> impl Fn(&Value) + 'static {
        let weak = Rc::downgrade(&self.inner);
        let attr = attr.to_owned();
        move |value: &Value| {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.borrow_mut();
                if !inner.dead {
                    inner.attrs.insert(attr.clone(), value.clone());
                }
            }
        }
    }

    fn insert_attr_binding(&self, attr: &str, binding: Binding) {
        let dead = self.inner.borrow().dead;
        if dead {
            binding.release();
            return;
        }
        // Replaces (and thereby releases) any previous binding on the
        // same attribute.
        self.inner
            .borrow_mut()
            .attr_bindings
            .insert(attr.to_owned(), binding);
    }
}

impl PartialEq for WidgetNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for WidgetNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("WidgetNode")
            .field("id", &inner.id)
            .field("kind", &inner.kind)
            .field("children", &inner.children.len())
            .field("dead", &inner.dead)
            .finish()
    }
}
