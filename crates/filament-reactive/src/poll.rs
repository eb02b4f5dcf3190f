//! Poller: time-driven synthetic sources for data with no push notification.
//!
//! A poll source wraps a compute function and an interval. Its single
//! `"output"` property lives in the [`PropertyStore`] like any other
//! property, so bindings need no special case for pulled vs. pushed
//! data. The event loop drives the poller by calling
//! [`run_due`](Poller::run_due) at its wait points.
//!
//! Timer semantics: fixed period, not drift-corrected. One pump call
//! executes at most one tick per handle, and a re-entrancy flag keeps
//! a slow or re-entrant compute from stacking invocations.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace};
use web_time::Instant;

use filament_core::{Result, Source, SourceId, Value};

use crate::store::PropertyStore;

/// Name of the one property a poll source publishes.
pub const OUTPUT: &str = "output";

struct PollEntry {
    source: SourceId,
    interval: Duration,
    last_run: Instant,
    compute: Rc<dyn Fn() -> Value>,
    cancelled: Rc<Cell<bool>>,
    in_flight: Rc<Cell<bool>>,
}

/// Schedules poll sources and pumps their ticks. Cloning yields
/// another handle to the same schedule.
#[derive(Clone)]
pub struct Poller {
    store: PropertyStore,
    inner: Rc<RefCell<Vec<PollEntry>>>,
}

impl Poller {
    #[must_use]
    pub fn new(store: PropertyStore) -> Self {
        Self {
            store,
            inner: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Create a poll source that refreshes its `"output"` property by
    /// invoking `compute` every `interval`.
    ///
    /// `compute` runs once right away to seed the initial value, then
    /// once per due tick.
    pub fn schedule(
        &self,
        interval: Duration,
        compute: impl Fn() -> Value + 'static,
    ) -> PollSource {
        let source = SourceId::next();
        let compute: Rc<dyn Fn() -> Value> = Rc::new(compute);
        let cancelled = Rc::new(Cell::new(false));

        let initial = compute();
        self.store.set(source, OUTPUT, initial);

        self.inner.borrow_mut().push(PollEntry {
            source,
            interval,
            last_run: Instant::now(),
            compute: Rc::clone(&compute),
            cancelled: Rc::clone(&cancelled),
            in_flight: Rc::new(Cell::new(false)),
        });
        debug!(%source, ?interval, "poll source scheduled");

        PollSource {
            source,
            cancelled,
            store: self.store.clone(),
        }
    }

    /// Run every entry whose tick is due at `now`. Returns the number
    /// of computes executed.
    ///
    /// Cancelled entries are swept out here; their last value stays
    /// readable in the store.
    pub fn run_due(&self, now: Instant) -> usize {
        let due: Vec<(SourceId, Rc<dyn Fn() -> Value>, Rc<Cell<bool>>, Rc<Cell<bool>>)> = {
            let mut entries = self.inner.borrow_mut();
            entries.retain(|entry| !entry.cancelled.get());
            entries
                .iter_mut()
                .filter(|entry| {
                    now.checked_duration_since(entry.last_run)
                        .is_some_and(|elapsed| elapsed >= entry.interval)
                })
                .map(|entry| {
                    entry.last_run = now;
                    (
                        entry.source,
                        Rc::clone(&entry.compute),
                        Rc::clone(&entry.cancelled),
                        Rc::clone(&entry.in_flight),
                    )
                })
                .collect()
        };

        let mut ticks = 0usize;
        for (source, compute, cancelled, in_flight) in due {
            if cancelled.get() {
                continue;
            }
            if in_flight.replace(true) {
                trace!(%source, "tick skipped, compute already in flight");
                continue;
            }
            let value = compute();
            in_flight.set(false);
            self.store.set(source, OUTPUT, value);
            ticks += 1;
        }
        ticks
    }

    /// Number of scheduled, uncancelled entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .borrow()
            .iter()
            .filter(|e| !e.cancelled.get())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller").field("entries", &self.len()).finish()
    }
}

/// Handle to one scheduled poll source.
///
/// Implements [`Source`], so composition code can treat a clock or a
/// battery poll exactly like any pushed source.
pub struct PollSource {
    source: SourceId,
    cancelled: Rc<Cell<bool>>,
    store: PropertyStore,
}

impl PollSource {
    /// Identity of the synthetic source; bind against this.
    #[must_use]
    pub fn source_id(&self) -> SourceId {
        self.source
    }

    /// Stop future ticks. Idempotent; the last computed value remains
    /// readable from the store.
    pub fn cancel(&self) {
        if !self.cancelled.replace(true) {
            debug!(source = %self.source, "poll source cancelled");
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

impl Source for PollSource {
    fn id(&self) -> SourceId {
        self.source
    }

    fn read_property(&self, name: &str) -> Result<Value> {
        self.store.get(self.source, name)
    }
}

impl std::fmt::Debug for PollSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollSource")
            .field("source", &self.source)
            .field("cancelled", &self.cancelled.get())
            .finish()
    }
}
