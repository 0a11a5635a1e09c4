//! # Declarative subscriber types and their handler tables.
//!
//! A type opts into automatic registration by implementing [`Subscriber`]:
//! it enumerates its handler methods into a [`HandlerTable`], each with
//! per-method subscription options. The table is compile-time-checked wiring
//! — a method with the wrong parameter or return type simply does not
//! compile, so malformed handlers cannot reach the bus.
//!
//! Tables describe a *type*; the [`Registrar`](crate::Registrar) binds them
//! to live `Arc` instances as those attach and registers every bound method
//! under the instance's owner identity.
//!
//! ## Example
//! ```rust
//! use tannoy::{Envelope, Event, HandlerError, HandlerTable, Priority, Subscriber};
//!
//! struct BuffApplied { pub stacks: u8 }
//! impl Event for BuffApplied {}
//!
//! struct BuffHud;
//!
//! impl BuffHud {
//!     fn on_buff(&self, ev: &mut BuffApplied, _env: &mut Envelope) -> Result<(), HandlerError> {
//!         let _ = ev.stacks;
//!         Ok(())
//!     }
//! }
//!
//! impl Subscriber for BuffHud {
//!     fn handlers(table: &mut HandlerTable<Self>) {
//!         table.on(Priority::Low, Self::on_buff);
//!     }
//! }
//! ```

use std::any::TypeId;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::bus::handler::{erase_async, erase_sync, ErasedCall};
use crate::error::HandlerError;
use crate::events::{short_type_name, Envelope, Event, SubscribeOpts};

/// # Type with declaratively registered handler methods.
///
/// Instances of a `Subscriber` are registered by attaching them to a
/// [`Registrar`](crate::Registrar); every method listed in
/// [`handlers`](Subscriber::handlers) is subscribed under the instance's
/// owner identity and torn down together on detach.
pub trait Subscriber: Send + Sync + 'static {
    /// Returns the subscriber type name used in logs and diagnostics dumps.
    fn name() -> &'static str
    where
        Self: Sized,
    {
        short_type_name::<Self>()
    }

    /// Enumerates the type's handler methods into `table`.
    ///
    /// A type listing no handlers is a configuration smell: attaching such
    /// an instance logs a warning and registers nothing.
    fn handlers(table: &mut HandlerTable<Self>)
    where
        Self: Sized;
}

/// One method listed in a table, not yet bound to an instance.
pub(crate) struct TableEntry<S> {
    pub(crate) type_id: TypeId,
    pub(crate) event_label: &'static str,
    pub(crate) opts: SubscribeOpts,
    pub(crate) method: &'static str,
    pub(crate) bind: Box<dyn Fn(Arc<S>) -> ErasedCall + Send + Sync>,
}

/// Handler methods of one subscriber type.
///
/// Filled by [`Subscriber::handlers`]; consumed by the registrar when an
/// instance attaches.
pub struct HandlerTable<S> {
    entries: Vec<TableEntry<S>>,
}

impl<S: Subscriber> Default for HandlerTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Subscriber> HandlerTable<S> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Lists a sync method: `fn(&self, &mut E, &mut Envelope) -> Result<..>`.
    pub fn on<E, O, M>(&mut self, opts: O, method: M) -> &mut Self
    where
        E: Event,
        O: Into<SubscribeOpts>,
        M: Fn(&S, &mut E, &mut Envelope) -> Result<(), HandlerError> + Send + Sync + Copy + 'static,
    {
        self.entries.push(TableEntry {
            type_id: TypeId::of::<E>(),
            event_label: E::label(),
            opts: opts.into(),
            method: std::any::type_name::<M>(),
            bind: Box::new(move |instance: Arc<S>| {
                erase_sync::<E, _>(move |event, envelope| method(&instance, event, envelope))
            }),
        });
        self
    }

    /// Lists an async method: one returning a [`BoxFuture`] borrowing its
    /// arguments for the invocation.
    pub fn on_async<E, O, M>(&mut self, opts: O, method: M) -> &mut Self
    where
        E: Event,
        O: Into<SubscribeOpts>,
        M: for<'a> Fn(&'a S, &'a mut E, &'a mut Envelope) -> BoxFuture<'a, Result<(), HandlerError>>
            + Send
            + Sync
            + Copy
            + 'static,
    {
        self.entries.push(TableEntry {
            type_id: TypeId::of::<E>(),
            event_label: E::label(),
            opts: opts.into(),
            method: std::any::type_name::<M>(),
            bind: Box::new(move |instance: Arc<S>| {
                erase_async::<E, _>(move |event, envelope| {
                    let instance = Arc::clone(&instance);
                    async move { method(&instance, &mut *event, &mut *envelope).await }.boxed()
                })
            }),
        });
        self
    }

    /// Number of listed methods.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table lists no methods.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<TableEntry<S>> {
        self.entries
    }
}
