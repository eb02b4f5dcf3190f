//! Declarative composition: blueprints in, live widget trees out.
//!
//! A [`Blueprint`] describes a node the way the bar configuration
//! wants to write it: static attributes, attributes bound to store
//! properties (optionally through a transform), input handlers,
//! children, and a one-shot `setup` hook for wiring event-bus
//! subscriptions against the freshly built node.
//!
//! Children come in two shapes. A static list is built once. A bound
//! list re-renders wholesale whenever the bound property changes: the
//! previous child nodes are detached (cascading teardown) and a fresh
//! sequence is built and attached. No per-item diffing is attempted,
//! so per-item widget state does not survive a list change.
//!
//! # Failure Modes
//!
//! - A bound attribute naming an unknown property is reported and
//!   skipped; the node still builds and its other bindings stay live.
//! - Same for a bound child list; the node simply keeps no children
//!   until rebound.

use std::rc::Rc;

use tracing::warn;

use filament_core::{SourceId, TransformError, Value};
use filament_reactive::{EventBus, PropertyStore};

use crate::node::{WidgetKind, WidgetNode};

type AttrTransform = Rc<dyn Fn(&Value) -> std::result::Result<Value, TransformError>>;
type ChildBuilder = Rc<dyn Fn(&Value) -> Vec<Blueprint>>;
type SetupHook = Box<dyn FnOnce(&WidgetNode)>;

struct BoundAttr {
    attr: String,
    owner: SourceId,
    property: String,
    transform: Option<AttrTransform>,
}

enum ChildSpec {
    None,
    Static(Vec<Blueprint>),
    Bound {
        owner: SourceId,
        property: String,
        build: ChildBuilder,
    },
}

/// Declarative description of one widget node.
pub struct Blueprint {
    kind: WidgetKind,
    attrs: Vec<(String, Value)>,
    bound: Vec<BoundAttr>,
    handlers: Vec<(String, Rc<dyn Fn(&Value)>)>,
    children: ChildSpec,
    setup: Vec<SetupHook>,
}

impl Blueprint {
    #[must_use]
    pub fn new(kind: WidgetKind) -> Self {
        Self {
            kind,
            attrs: Vec::new(),
            bound: Vec::new(),
            handlers: Vec::new(),
            children: ChildSpec::None,
            setup: Vec::new(),
        }
    }

    /// Static attribute.
    #[must_use]
    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.push((name.to_owned(), value.into()));
        self
    }

    /// Attribute bound to `(owner, property)`, identity transform.
    #[must_use]
    pub fn bind(mut self, attr: &str, owner: SourceId, property: &str) -> Self {
        self.bound.push(BoundAttr {
            attr: attr.to_owned(),
            owner,
            property: property.to_owned(),
            transform: None,
        });
        self
    }

    /// Attribute bound through an infallible transform.
    #[must_use]
    pub fn bind_map(
        mut self,
        attr: &str,
        owner: SourceId,
        property: &str,
        map: impl Fn(&Value) -> Value + 'static,
    ) -> Self {
        self.bound.push(BoundAttr {
            attr: attr.to_owned(),
            owner,
            property: property.to_owned(),
            transform: Some(Rc::new(move |v| Ok(map(v)))),
        });
        self
    }

    /// Attribute bound through a fallible transform.
    #[must_use]
    pub fn bind_try_map(
        mut self,
        attr: &str,
        owner: SourceId,
        property: &str,
        map: impl Fn(&Value) -> std::result::Result<Value, TransformError> + 'static,
    ) -> Self {
        self.bound.push(BoundAttr {
            attr: attr.to_owned(),
            owner,
            property: property.to_owned(),
            transform: Some(Rc::new(map)),
        });
        self
    }

    /// Input handler (click, scroll_up, change, ...).
    #[must_use]
    pub fn on(mut self, event: &str, handler: impl Fn(&Value) + 'static) -> Self {
        self.handlers.push((event.to_owned(), Rc::new(handler)));
        self
    }

    /// Append one static child.
    ///
    /// # Panics
    ///
    /// Panics if a bound child list was already declared; a node has
    /// either static children or one bound list, never both.
    #[must_use]
    pub fn child(mut self, blueprint: Blueprint) -> Self {
        match &mut self.children {
            ChildSpec::None => self.children = ChildSpec::Static(vec![blueprint]),
            ChildSpec::Static(kids) => kids.push(blueprint),
            ChildSpec::Bound { .. } => panic!("node already has a bound child list"),
        }
        self
    }

    /// Append several static children.
    #[must_use]
    pub fn children(mut self, blueprints: impl IntoIterator<Item = Blueprint>) -> Self {
        for bp in blueprints {
            self = self.child(bp);
        }
        self
    }

    /// Bind the whole child sequence to `(owner, property)`: on every
    /// change `build` maps the value to a fresh blueprint list and the
    /// previous children are fully replaced.
    ///
    /// # Panics
    ///
    /// Panics if children were already declared.
    #[must_use]
    pub fn children_bound(
        mut self,
        owner: SourceId,
        property: &str,
        build: impl Fn(&Value) -> Vec<Blueprint> + 'static,
    ) -> Self {
        match self.children {
            ChildSpec::None => {
                self.children = ChildSpec::Bound {
                    owner,
                    property: property.to_owned(),
                    build: Rc::new(build),
                };
            }
            _ => panic!("node already has children"),
        }
        self
    }

    /// One-shot hook invoked with the freshly built node, after
    /// attributes and children are wired. The usual place to install
    /// event-bus subscriptions that mutate the node's children.
    #[must_use]
    pub fn setup(mut self, hook: impl FnOnce(&WidgetNode) + 'static) -> Self {
        self.setup.push(Box::new(hook));
        self
    }
}

impl std::fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blueprint")
            .field("kind", &self.kind)
            .field("attrs", &self.attrs.len())
            .field("bound", &self.bound.len())
            .finish()
    }
}

/// Builds live widget trees from blueprints against one store and bus.
#[derive(Clone)]
pub struct Composer {
    store: PropertyStore,
    bus: EventBus,
}

impl Composer {
    #[must_use]
    pub fn new(store: PropertyStore, bus: EventBus) -> Self {
        Self { store, bus }
    }

    #[must_use]
    pub fn store(&self) -> &PropertyStore {
        &self.store
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Build a live node from `blueprint`.
    ///
    /// Bound attributes and bound children become part of the node's
    /// owned set; detaching the node releases them. Binding failures
    /// are reported and skipped so one broken widget cannot take the
    /// tree down.
    #[must_use]
    pub fn build(&self, blueprint: Blueprint) -> WidgetNode {
        let node = WidgetNode::new(blueprint.kind);

        for (name, value) in blueprint.attrs {
            node.set_attr(&name, value);
        }
        for (name, handler) in blueprint.handlers {
            node.set_handler_rc(&name, handler);
        }
        for bound in blueprint.bound {
            let result = match bound.transform {
                None => node.bind_attr(&self.store, &bound.attr, bound.owner, &bound.property),
                Some(map) => node.bind_attr_try_map(
                    &self.store,
                    &bound.attr,
                    bound.owner,
                    &bound.property,
                    move |v| map(v),
                ),
            };
            if let Err(err) = result {
                warn!(attr = %bound.attr, %err, "bound attribute skipped");
            }
        }

        match blueprint.children {
            ChildSpec::None => {}
            ChildSpec::Static(kids) => {
                for bp in kids {
                    let child = self.build(bp);
                    node.append(child);
                }
            }
            ChildSpec::Bound {
                owner,
                property,
                build,
            } => self.bind_children(&node, owner, &property, build),
        }

        for hook in blueprint.setup {
            hook(&node);
        }
        node
    }

    fn bind_children(
        &self,
        node: &WidgetNode,
        owner: SourceId,
        property: &str,
        build: ChildBuilder,
    ) {
        let composer = self.clone();
        let weak = node.downgrade();
        let sink = move |value: &Value| {
            let Some(target) = weak.upgrade() else {
                return;
            };
            if target.is_dead() {
                return;
            }
            let fresh: Vec<WidgetNode> = build(value)
                .into_iter()
                .map(|bp| composer.build(bp))
                .collect();
            target.replace_children(fresh);
        };
        match self.store.bind(owner, property, sink) {
            Ok(binding) => node.own_binding(binding),
            Err(err) => warn!(%owner, property, %err, "bound child list skipped"),
        }
    }
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer").finish()
    }
}
