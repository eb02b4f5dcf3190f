#![forbid(unsafe_code)]

//! Filament public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users:
//! the reactive core (property store, bindings, events, poller), the
//! widget tree with its composer, and ready-made bar blueprints in
//! [`demos`].

pub mod demos;

pub mod prelude {
    pub use filament_core as core;
    pub use filament_reactive as reactive;
    pub use filament_widgets as widgets;

    pub use filament_core::{
        Result, Source, SourceError, SourceId, Sources, TransformError, Value,
    };
    pub use filament_reactive::{
        Binding, EventBus, PollSource, Poller, PropertyStore, Subscription,
    };
    pub use filament_widgets::{Blueprint, Composer, WidgetKind, WidgetNode};
}

pub use prelude::*;
