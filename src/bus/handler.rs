//! # Handler forms and type erasure.
//!
//! The bus stores every subscription as one uniform callable taking the
//! payload as `&mut dyn Any` plus the envelope, returning a boxed future.
//! Three public forms erase into it:
//!
//! - a sync closure `Fn(&mut E, &mut Envelope) -> Result<(), HandlerError>`,
//! - an async closure returning a [`BoxFuture`],
//! - a [`Handler`] trait object for stateful subscribers.
//!
//! Erased callables downcast the payload back to the concrete type at the
//! boundary; the registry keys lists by `TypeId`, so a mismatch cannot occur
//! in correct code and surfaces as a [`HandlerError`] rather than a panic.
//!
//! ## Concurrency semantics
//! Each invocation produces a **fresh** future owning its own state; shared
//! state between invocations goes through an explicit `Arc` inside the
//! closure or handler.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::HandlerError;
use crate::events::{Envelope, Event};

/// Uniform callable every subscription erases into.
///
/// The payload and envelope share one lifetime so a handler's future may
/// borrow both for the duration of its own invocation.
pub(crate) type ErasedFn = dyn for<'a> Fn(
        &'a mut (dyn Any + Send),
        &'a mut Envelope,
    ) -> BoxFuture<'a, Result<(), HandlerError>>
    + Send
    + Sync;

/// Shared handle to an erased callable.
pub(crate) type ErasedCall = Arc<ErasedFn>;

/// # Stateful event handler.
///
/// For subscribers that carry state across invocations. Closures cover the
/// common case; implement this when the handler is a long-lived object shared
/// behind an `Arc`.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tannoy::{Envelope, Event, Handler, HandlerError};
///
/// struct ScoreChanged { pub delta: i64 }
/// impl Event for ScoreChanged {}
///
/// struct Scoreboard;
///
/// #[async_trait]
/// impl Handler<ScoreChanged> for Scoreboard {
///     async fn handle(
///         &self,
///         event: &mut ScoreChanged,
///         _envelope: &mut Envelope,
///     ) -> Result<(), HandlerError> {
///         let _ = event.delta;
///         Ok(())
///     }
///
///     fn label(&self) -> &'static str { "scoreboard" }
/// }
/// ```
#[async_trait]
pub trait Handler<E: Event>: Send + Sync + 'static {
    /// Processes one event. Errors are logged by the bus; dispatch continues.
    async fn handle(&self, event: &mut E, envelope: &mut Envelope) -> Result<(), HandlerError>;

    /// Returns the handler name used in logs and diagnostics dumps.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose —
    /// override it when possible.
    fn label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

fn mismatch<E: Event>() -> HandlerError {
    HandlerError::failed(format!("payload is not '{}'", E::label()))
}

/// Erases a sync closure.
pub(crate) fn erase_sync<E, F>(f: F) -> ErasedCall
where
    E: Event,
    F: Fn(&mut E, &mut Envelope) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(move |payload, envelope| {
        let result = match payload.downcast_mut::<E>() {
            Some(event) => f(event, envelope),
            None => Err(mismatch::<E>()),
        };
        futures::future::ready(result).boxed()
    })
}

/// Erases an async closure (one producing a fresh [`BoxFuture`] per call).
pub(crate) fn erase_async<E, F>(f: F) -> ErasedCall
where
    E: Event,
    F: for<'a> Fn(&'a mut E, &'a mut Envelope) -> BoxFuture<'a, Result<(), HandlerError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(move |payload, envelope| match payload.downcast_mut::<E>() {
        Some(event) => f(event, envelope),
        None => futures::future::ready(Err(mismatch::<E>())).boxed(),
    })
}

/// Erases a shared [`Handler`] trait object.
pub(crate) fn erase_handler<E, H>(handler: Arc<H>) -> ErasedCall
where
    E: Event,
    H: Handler<E>,
{
    Arc::new(move |payload, envelope| {
        let handler = Arc::clone(&handler);
        match payload.downcast_mut::<E>() {
            Some(event) => async move { handler.handle(event, envelope).await }.boxed(),
            None => futures::future::ready(Err(mismatch::<E>())).boxed(),
        }
    })
}
