//! Event data model: payload contract, per-dispatch envelope, priorities.
//!
//! This module groups everything a producer touches when defining and
//! publishing an event type.
//!
//! ## Contents
//! - [`Event`] — payload contract with fixed-at-type capabilities
//! - [`Envelope`], [`EventId`], [`Outcome`] — per-dispatch metadata and the
//!   cancellation/outcome protocol
//! - [`Priority`], [`SubscribeOpts`] — dispatch ordering keys
//!
//! The dispatch machinery itself lives in [`crate::bus`].

mod envelope;
mod event;
mod priority;

pub use envelope::{Envelope, EventId, Outcome};
pub use event::Event;
pub use priority::{Priority, SubscribeOpts};

pub(crate) use event::short_type_name;
