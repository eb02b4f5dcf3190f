//! Source identity and the capability contract for external data sources.
//!
//! A source object is anything with identity that exposes properties
//! and/or events: a workspace, a tray item, a media player, the audio
//! mixer, a synthetic poll timer. The core never owns a source's
//! state machine; it holds the id plus whatever the source published
//! into the property store and event bus.
//!
//! # Invariants
//!
//! 1. [`SourceId`]s are unique for the lifetime of the process.
//! 2. [`Source::read_property`] is synchronous and non-blocking.
//! 3. [`Source::command`] is fire-and-forget: no return value, and a
//!    failed command must not surface through the core.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;

use crate::error::Result;
use crate::value::Value;

/// Global counter backing [`SourceId::next`].
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a source object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceId(u64);

impl SourceId {
    /// Allocate a fresh, process-unique id.
    #[must_use]
    pub fn next() -> Self {
        Self(SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Capability contract every external source satisfies.
///
/// Concrete sources (compositor client, mixer, tray host, players)
/// implement this and publish their state changes into the property
/// store and event bus they were constructed with. The core only ever
/// talks to the trait.
pub trait Source {
    /// This source's identity.
    fn id(&self) -> SourceId;

    /// Read the current value of a property. Synchronous, non-blocking.
    fn read_property(&self, name: &str) -> Result<Value>;

    /// Dispatch a fire-and-forget command, e.g. `"set_volume"` or
    /// `"switch_to_workspace"`. The default implementation ignores it.
    fn command(&self, name: &str, arg: &Value) {
        let _ = (name, arg);
    }
}

/// Dependency-injection registry of named sources.
///
/// Built once at startup and handed to composition code. Tests inject
/// fakes; production wires the real protocol clients. This replaces
/// process-wide service lookup so the core has a testable seam.
#[derive(Clone, Default)]
pub struct Sources {
    inner: Rc<RefCell<AHashMap<String, Rc<dyn Source>>>>,
}

impl Sources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under `name`, replacing any previous entry.
    pub fn insert(&self, name: impl Into<String>, source: Rc<dyn Source>) {
        self.inner.borrow_mut().insert(name.into(), source);
    }

    /// Look up a source by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Rc<dyn Source>> {
        self.inner.borrow().get(name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl fmt::Debug for Sources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.inner.borrow().keys().cloned().collect();
        f.debug_struct("Sources").field("names", &names).finish()
    }
}
