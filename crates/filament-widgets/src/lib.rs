#![forbid(unsafe_code)]

//! Widget tree and declarative composition for Filament.
//!
//! The rendering backend is a consumer of this crate, not part of it:
//! a [`WidgetNode`] carries a kind, attributes, handlers, and
//! children, and the backend paints whatever the tree says. What this
//! crate owns is the *data-flow and lifecycle* layer:
//!
//! - [`Blueprint`]: declarative description of a node — static
//!   attributes, attributes bound to store properties (optionally
//!   through a transform), handlers, static or bound children, and a
//!   one-shot `setup` hook.
//! - [`Composer`]: turns blueprints into live nodes, wiring every
//!   bound attribute and bound child list into the node's owned set.
//! - [`WidgetNode::detach`]: depth-first teardown that releases every
//!   binding and subscription the subtree owns, exactly once.

pub mod compose;
pub mod node;

pub use compose::{Blueprint, Composer};
pub use node::{OwnedHandle, WeakWidgetNode, WidgetId, WidgetKind, WidgetNode};
