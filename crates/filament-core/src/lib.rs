#![forbid(unsafe_code)]

//! Shared vocabulary for the Filament reactive core.
//!
//! This crate defines the types every other Filament crate speaks:
//!
//! - [`Value`]: the dynamic value carried by properties, transforms,
//!   event payloads, and widget attributes.
//! - [`SourceId`] / [`Source`]: identity and capability contract for
//!   external data sources (compositor, mixer, tray, players, ...).
//! - [`Sources`]: the dependency-injection registry handed to
//!   composition code instead of process-wide service lookup.
//! - [`SourceError`] / [`TransformError`]: the error taxonomy shared
//!   by the store, binding engine, and event bus.

pub mod error;
pub mod source;
pub mod value;

pub use error::{Result, SourceError, TransformError};
pub use source::{Source, SourceId, Sources};
pub use value::Value;
