#![forbid(unsafe_code)]

//! The Filament reactive engine.
//!
//! Four cooperating pieces keep a widget tree synchronized with
//! mutable external state:
//!
//! - [`PropertyStore`]: named, typed values per source object; the
//!   unit of observation.
//! - [`Binding`]: a live link from one `(owner, property)` pair to a
//!   sink, optionally through a transform; RAII release.
//! - [`EventBus`]: per-source pub/sub for discrete, non-retained
//!   events ("added", "removed", "closed"); RAII [`Subscription`].
//! - [`Poller`]: time-driven synthetic sources for data with no
//!   native push notification (a clock), pumped by [`Poller::run_due`].
//!
//! # Architecture
//!
//! Everything is single-threaded and event-loop-driven: `Rc<RefCell>`
//! registries, synchronous dispatch, no locks. Handlers run to
//! completion; dispatch iterates a snapshot of the subscriber list so
//! a handler may release itself or a sibling mid-dispatch.
//!
//! # Invariants
//!
//! 1. Setting a value equal to the current value is a no-op: no
//!    storage churn, no notifications.
//! 2. Bindings are notified in registration order for a given
//!    `(owner, property)` pair; likewise subscriptions for a given
//!    `(owner, event)` pair. No cross-pair ordering is promised.
//! 3. Releasing a handle (explicitly or by drop) takes effect
//!    immediately, including from inside a handler for the very pair
//!    being dispatched.
//! 4. A failing transform is reported and skipped; the sink keeps its
//!    last good value and the binding stays live.
//! 5. Removing a source invalidates every binding and subscription
//!    tied to it without the source's cooperation.

pub mod binding;
pub mod events;
pub mod poll;
pub mod store;

pub use binding::Binding;
pub use events::{EventBus, Subscription};
pub use poll::{PollSource, Poller};
pub use store::PropertyStore;
