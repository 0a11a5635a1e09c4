//! Dispatch machinery: the registry, listener lists, and handler erasure.
//!
//! ## Contents
//! - [`Bus`] — event type → listener list map, subscribe/unsubscribe, the
//!   dispatch loop
//! - [`Handler`] — trait form for stateful subscribers
//! - [`HandlerId`], [`OwnerId`], [`HandlerInfo`] — subscription identities
//!   and diagnostics descriptors
//! - [`global()`] — the process-wide default instance
//!
//! ## Quick reference
//! - **Producers**: call [`Bus::publish`] / [`Bus::publish_blocking`].
//! - **Manual consumers**: [`Bus::subscribe`], [`Bus::subscribe_async`],
//!   [`Bus::subscribe_handler`] and the `_owned` variants.
//! - **Declarative consumers**: see [`crate::discovery`] — the registrar
//!   drives owner-tagged registration without manual subscribe calls.

pub(crate) mod handler;
pub(crate) mod listeners;

mod global;
mod registry;

pub use global::global;
pub use handler::Handler;
pub use listeners::{HandlerId, HandlerInfo, OwnerId};
pub use registry::Bus;
