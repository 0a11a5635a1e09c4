//! Declarative registration: subscriber types, handler tables, the registrar.
//!
//! This is the reflection-free rendition of handler discovery: instead of a
//! runtime scan for markers, each subscriber type enumerates its handler
//! methods in [`Subscriber::handlers`] — explicit, compile-time-checked
//! wiring. The [`Registrar`] binds those methods to live instances as they
//! attach and ties teardown to detach or [`OwnerGuard`] drop.
//!
//! ## Contents
//! - [`Subscriber`], [`HandlerTable`] — per-type handler enumeration
//! - [`Registrar`], [`OwnerGuard`] — lifecycle queue, drain, RAII teardown

mod registrar;
mod subscriber;

pub use registrar::{OwnerGuard, Registrar};
pub use subscriber::{HandlerTable, Subscriber};
