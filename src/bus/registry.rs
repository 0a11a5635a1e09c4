//! # The bus: subscription registry and dispatch loop.
//!
//! [`Bus`] owns the map from event type to listener list and drives every
//! dispatch. Producers and consumers never reference each other; they only
//! share a `Bus`.
//!
//! ## Architecture
//! ```text
//! publish(&mut E)
//!     │
//!     ├─► lookup ListenerList by TypeId   (read lock; cached snapshot)
//!     ├─► copy descriptors into Envelope  (introspection)
//!     └─► for each record, in priority order:
//!             ├─ advance phase to the record's bucket
//!             ├─ skip if canceled and !receive_canceled
//!             └─ invoke, awaiting the future
//!                   └─ Err/panic → log, continue with the next handler
//! ```
//!
//! ## Rules
//! - Handlers for one dispatch run strictly sequentially; handler *k* is
//!   fully awaited before *k+1* starts.
//! - The snapshot is taken once per dispatch: subscribing or unsubscribing
//!   mid-flight never changes an in-flight call's order.
//! - No lock is held while a handler runs; the registry lock only guards map
//!   mutation and snapshot (re)computation.
//! - There is no cross-publish ordering guarantee and no handler timeout: a
//!   stuck handler stalls its own dispatch call.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, trace, warn};

use crate::bus::handler::{erase_async, erase_handler, erase_sync, ErasedCall, Handler};
use crate::bus::listeners::{HandlerId, HandlerInfo, HandlerRecord, ListenerList, OwnerId};
use crate::config::BusConfig;
use crate::error::HandlerError;
use crate::events::{Envelope, Event, SubscribeOpts};

/// In-process event bus with priority-ordered dispatch.
///
/// A `Bus` is an explicit value with controlled lifetime — construct one and
/// pass it by reference (or `Arc`) to producers and consumers. A process-wide
/// default instance is available through [`global()`](crate::global) for
/// hosts that prefer ambient access.
pub struct Bus {
    routes: RwLock<HashMap<TypeId, ListenerList>>,
    /// Owners already registered through the registrar; makes attach idempotent.
    processed: Mutex<HashSet<OwnerId>>,
    config: BusConfig,
    published: AtomicU64,
    invoked: AtomicU64,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    /// Creates a bus with the default [`BusConfig`].
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Creates a bus with an explicit config.
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            processed: Mutex::new(HashSet::new()),
            config,
            published: AtomicU64::new(0),
            invoked: AtomicU64::new(0),
        }
    }

    // ---- Subscribe / unsubscribe ----

    /// Subscribes a sync closure to events of type `E`.
    ///
    /// `opts` accepts a [`Priority`](crate::Priority), a raw `i32` (bucket
    /// derived via the numeric mapping), or a full [`SubscribeOpts`].
    ///
    /// Duplicate subscriptions are allowed and produce duplicate invocations;
    /// callers are responsible for not double-subscribing manually.
    pub fn subscribe<E, O, F>(&self, opts: O, f: F) -> HandlerId
    where
        E: Event,
        O: Into<SubscribeOpts>,
        F: Fn(&mut E, &mut Envelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.add::<E>(erase_sync::<E, _>(f), opts.into(), None, std::any::type_name::<F>(), None)
    }

    /// Subscribes an async closure (one producing a fresh boxed future per
    /// invocation) to events of type `E`.
    pub fn subscribe_async<E, O, F>(&self, opts: O, f: F) -> HandlerId
    where
        E: Event,
        O: Into<SubscribeOpts>,
        F: for<'a> Fn(&'a mut E, &'a mut Envelope) -> BoxFuture<'a, Result<(), HandlerError>>
            + Send
            + Sync
            + 'static,
    {
        self.add::<E>(erase_async::<E, _>(f), opts.into(), None, std::any::type_name::<F>(), None)
    }

    /// Subscribes a shared [`Handler`] object to events of type `E`.
    pub fn subscribe_handler<E, O, H>(&self, opts: O, handler: Arc<H>) -> HandlerId
    where
        E: Event,
        O: Into<SubscribeOpts>,
        H: Handler<E>,
    {
        let label = handler.label();
        self.add::<E>(erase_handler::<E, _>(handler), opts.into(), None, label, None)
    }

    /// Like [`subscribe`](Self::subscribe), additionally tagging the record
    /// with `owner` so it can be torn down in bulk via
    /// [`unsubscribe_owner`](Self::unsubscribe_owner).
    pub fn subscribe_owned<E, O, F>(&self, owner: OwnerId, opts: O, f: F) -> HandlerId
    where
        E: Event,
        O: Into<SubscribeOpts>,
        F: Fn(&mut E, &mut Envelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.add::<E>(
            erase_sync::<E, _>(f),
            opts.into(),
            Some(owner),
            std::any::type_name::<F>(),
            None,
        )
    }

    /// Owner-tagged variant of [`subscribe_async`](Self::subscribe_async).
    pub fn subscribe_async_owned<E, O, F>(&self, owner: OwnerId, opts: O, f: F) -> HandlerId
    where
        E: Event,
        O: Into<SubscribeOpts>,
        F: for<'a> Fn(&'a mut E, &'a mut Envelope) -> BoxFuture<'a, Result<(), HandlerError>>
            + Send
            + Sync
            + 'static,
    {
        self.add::<E>(
            erase_async::<E, _>(f),
            opts.into(),
            Some(owner),
            std::any::type_name::<F>(),
            None,
        )
    }

    /// Owner-tagged variant of [`subscribe_handler`](Self::subscribe_handler).
    pub fn subscribe_handler_owned<E, O, H>(&self, owner: OwnerId, opts: O, handler: Arc<H>) -> HandlerId
    where
        E: Event,
        O: Into<SubscribeOpts>,
        H: Handler<E>,
    {
        let label = handler.label();
        self.add::<E>(erase_handler::<E, _>(handler), opts.into(), Some(owner), label, None)
    }

    fn add<E: Event>(
        &self,
        call: ErasedCall,
        opts: SubscribeOpts,
        owner: Option<OwnerId>,
        label: &'static str,
        origin: Option<&'static str>,
    ) -> HandlerId {
        let record = HandlerRecord::new(call, opts, owner, label, origin);
        let id = record.id;
        trace!(
            event = E::label(),
            handler = label,
            priority = opts.priority.as_label(),
            fine = opts.fine,
            "subscribed"
        );
        self.add_erased(TypeId::of::<E>(), record);
        id
    }

    /// Inserts an already-erased record (registrar path).
    pub(crate) fn add_erased(&self, type_id: TypeId, record: HandlerRecord) {
        let mut routes = self.routes.write();
        routes.entry(type_id).or_insert_with(ListenerList::new).add(record);
    }

    /// Marks an owner as processed by the registrar.
    ///
    /// Returns `false` if it was already processed (attach is then a no-op).
    pub(crate) fn mark_owner_processed(&self, owner: OwnerId) -> bool {
        self.processed.lock().insert(owner)
    }

    /// Removes the subscription with the given id. Returns whether it existed.
    pub fn unsubscribe<E: Event>(&self, id: HandlerId) -> bool {
        let mut routes = self.routes.write();
        let type_id = TypeId::of::<E>();
        let Some(list) = routes.get_mut(&type_id) else {
            return false;
        };
        let removed = list.remove(id);
        if list.is_empty() {
            routes.remove(&type_id);
        }
        if removed {
            trace!(event = E::label(), id = %id, "unsubscribed");
        }
        removed
    }

    /// Removes every subscription, across every event type, bound to `owner`.
    ///
    /// The sole supported teardown path for auto-registered instances. Also
    /// forgets the owner in the processed set so a later re-attach works.
    pub fn unsubscribe_owner(&self, owner: OwnerId) -> usize {
        let removed = {
            let mut routes = self.routes.write();
            let mut removed = 0;
            for list in routes.values_mut() {
                removed += list.remove_owner(owner);
            }
            routes.retain(|_, list| !list.is_empty());
            removed
        };
        self.processed.lock().remove(&owner);
        if removed > 0 {
            debug!(owner = %owner, removed, "owner subscriptions removed");
        }
        removed
    }

    /// Removes every subscription for event type `E`. Returns the count.
    pub fn clear_event<E: Event>(&self) -> usize {
        let mut routes = self.routes.write();
        let removed = routes.remove(&TypeId::of::<E>()).map_or(0, |list| list.len());
        if removed > 0 {
            debug!(event = E::label(), removed, "event type cleared");
        }
        removed
    }

    /// Empties the bus: all subscriptions, processed owners, and counters.
    pub fn clear(&self) {
        self.routes.write().clear();
        self.processed.lock().clear();
        self.published.store(0, AtomicOrdering::Relaxed);
        self.invoked.store(0, AtomicOrdering::Relaxed);
    }

    // ---- Dispatch ----

    /// Dispatches `event` to every subscribed handler, in priority order.
    ///
    /// Handlers run strictly sequentially; handler *k* is fully awaited
    /// before *k+1* starts. A handler error or panic is logged and dispatch
    /// continues. Zero subscribers is not an error.
    ///
    /// Returns the [`Envelope`]: cancellation state, outcome, and whether at
    /// least one handler actually ran ([`Envelope::delivered`]).
    pub async fn publish<E: Event>(&self, event: &mut E) -> Envelope {
        self.published.fetch_add(1, AtomicOrdering::Relaxed);
        let mut envelope = Envelope::for_event::<E>();

        let Some(snapshot) = self.snapshot(TypeId::of::<E>()) else {
            if self.config.warn_unhandled {
                warn!(event = envelope.event_label(), id = %envelope.id(), "publish with no listeners");
            } else {
                trace!(event = envelope.event_label(), id = %envelope.id(), "publish with no listeners");
            }
            return envelope;
        };

        envelope.set_listeners(snapshot.iter().map(HandlerRecord::info).collect());
        trace!(
            event = envelope.event_label(),
            id = %envelope.id(),
            listeners = snapshot.len(),
            "dispatch started"
        );

        for (index, record) in snapshot.iter().enumerate() {
            envelope.set_current(Some(index));

            if let Err(err) = envelope.try_advance_phase(record.priority) {
                error!(
                    event = envelope.event_label(),
                    handler = record.label,
                    error = %err,
                    "dispatch phase regressed"
                );
                debug_assert!(false, "dispatch phase regressed: {err}");
            }

            if envelope.is_cancelable() && envelope.is_canceled() && !record.receive_canceled {
                if self.config.log_skips {
                    debug!(
                        event = envelope.event_label(),
                        handler = record.label,
                        "skipped: event canceled"
                    );
                } else {
                    trace!(
                        event = envelope.event_label(),
                        handler = record.label,
                        "skipped: event canceled"
                    );
                }
                continue;
            }

            let payload: &mut (dyn Any + Send) = &mut *event;
            let fut = (&*record.call)(payload, &mut envelope);
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(
                        event = envelope.event_label(),
                        id = %envelope.id(),
                        handler = record.label,
                        error = %err,
                        "handler failed"
                    );
                }
                Err(panic) => {
                    error!(
                        event = envelope.event_label(),
                        id = %envelope.id(),
                        handler = record.label,
                        panic = %panic_message(&panic),
                        "handler panicked"
                    );
                }
            }
            envelope.note_ran();
            self.invoked.fetch_add(1, AtomicOrdering::Relaxed);
        }

        envelope.set_current(None);
        trace!(
            event = envelope.event_label(),
            id = %envelope.id(),
            ran = envelope.handlers_run(),
            canceled = envelope.is_canceled(),
            "dispatch finished"
        );
        envelope
    }

    /// Synchronous form of [`publish`](Self::publish); blocks the calling
    /// thread until every handler (async ones included) has completed.
    pub fn publish_blocking<E: Event>(&self, event: &mut E) -> Envelope {
        futures::executor::block_on(self.publish(event))
    }

    /// Sorted snapshot for one event type, reusing the cache when the list
    /// has not been mutated since the last dispatch.
    fn snapshot(&self, type_id: TypeId) -> Option<Arc<[HandlerRecord]>> {
        {
            let routes = self.routes.read();
            match routes.get(&type_id) {
                None => return None,
                Some(list) => {
                    if let Some(snapshot) = list.cached() {
                        return Some(snapshot);
                    }
                }
            }
        }
        // Cache was stale; recompute under the write lock.
        let mut routes = self.routes.write();
        routes.get_mut(&type_id).map(|list| list.sorted())
    }

    // ---- Diagnostics ----

    /// Number of handlers currently subscribed to `E`.
    pub fn handler_count<E: Event>(&self) -> usize {
        self.routes
            .read()
            .get(&TypeId::of::<E>())
            .map_or(0, |list| list.len())
    }

    /// Ordered descriptor dump for `E`, in dispatch order.
    pub fn listeners<E: Event>(&self) -> Vec<HandlerInfo> {
        let mut routes = self.routes.write();
        routes
            .get_mut(&TypeId::of::<E>())
            .map_or_else(Vec::new, |list| list.infos())
    }

    /// Number of distinct event types with at least one subscription.
    pub fn event_type_count(&self) -> usize {
        self.routes.read().len()
    }

    /// Number of distinct owners with at least one subscription.
    pub fn owner_count(&self) -> usize {
        let routes = self.routes.read();
        let mut owners = HashSet::new();
        for list in routes.values() {
            for record in list.records() {
                if let Some(owner) = record.owner {
                    owners.insert(owner);
                }
            }
        }
        owners.len()
    }

    /// Total events published on this bus (including unhandled ones).
    pub fn events_published(&self) -> u64 {
        self.published.load(AtomicOrdering::Relaxed)
    }

    /// Total handler invocations across all dispatches (skips excluded).
    pub fn handlers_invoked(&self) -> u64 {
        self.invoked.load(AtomicOrdering::Relaxed)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Outcome, Priority};
    use std::sync::Mutex as StdMutex;

    struct Ping;
    impl Event for Ping {}

    struct Gate;
    impl Event for Gate {
        fn cancelable() -> bool {
            true
        }
        fn has_outcome() -> bool {
            true
        }
    }

    struct Pong;
    impl Event for Pong {}

    type Log = Arc<StdMutex<Vec<&'static str>>>;

    fn log() -> Log {
        Arc::new(StdMutex::new(Vec::new()))
    }

    fn push(log: &Log, entry: &'static str) {
        log.lock().unwrap().push(entry);
    }

    fn taken(log: &Log) -> Vec<&'static str> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_publish_invokes_in_priority_order() {
        let bus = Bus::new();
        let order = log();

        let o = order.clone();
        bus.subscribe(Priority::Normal, move |_ev: &mut Ping, _env: &mut Envelope| {
            push(&o, "b");
            Ok(())
        });
        let o = order.clone();
        bus.subscribe(Priority::High, move |_ev: &mut Ping, _env: &mut Envelope| {
            push(&o, "a");
            Ok(())
        });

        let receipt = bus.publish(&mut Ping).await;
        assert!(receipt.delivered());
        assert_eq!(receipt.handlers_run(), 2);
        assert_eq!(taken(&order), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unsubscribed_handler_never_runs_again() {
        let bus = Bus::new();
        let order = log();

        let o = order.clone();
        let a = bus.subscribe(Priority::High, move |_ev: &mut Ping, _env: &mut Envelope| {
            push(&o, "a");
            Ok(())
        });
        let o = order.clone();
        bus.subscribe(Priority::Normal, move |_ev: &mut Ping, _env: &mut Envelope| {
            push(&o, "b");
            Ok(())
        });

        bus.publish(&mut Ping).await;
        assert!(bus.unsubscribe::<Ping>(a));
        bus.publish(&mut Ping).await;

        assert_eq!(taken(&order), vec!["a", "b", "b"]);
    }

    #[tokio::test]
    async fn test_fine_priority_breaks_ties_within_bucket() {
        let bus = Bus::new();
        let order = log();

        let o = order.clone();
        bus.subscribe(
            SubscribeOpts {
                priority: Priority::Normal,
                fine: -5,
                receive_canceled: false,
            },
            move |_ev: &mut Ping, _env: &mut Envelope| {
                push(&o, "late");
                Ok(())
            },
        );
        let o = order.clone();
        bus.subscribe(
            SubscribeOpts {
                priority: Priority::Normal,
                fine: 10,
                receive_canceled: false,
            },
            move |_ev: &mut Ping, _env: &mut Envelope| {
                push(&o, "early");
                Ok(())
            },
        );

        bus.publish(&mut Ping).await;
        assert_eq!(taken(&order), vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_raw_numeric_priority_orders_across_buckets() {
        let bus = Bus::new();
        let order = log();

        for (fine, name) in [(-80, "lowest"), (60, "high"), (10, "normal"), (120, "highest")] {
            let o = order.clone();
            bus.subscribe(fine, move |_ev: &mut Ping, _env: &mut Envelope| {
                push(&o, name);
                Ok(())
            });
        }

        bus.publish(&mut Ping).await;
        assert_eq!(taken(&order), vec!["highest", "high", "normal", "lowest"]);
    }

    #[tokio::test]
    async fn test_cancel_skips_later_handlers_unless_opted_in() {
        let bus = Bus::new();
        let order = log();

        let o = order.clone();
        bus.subscribe(Priority::High, move |_ev: &mut Gate, env: &mut Envelope| {
            push(&o, "a");
            env.cancel()?;
            Ok(())
        });
        let o = order.clone();
        bus.subscribe(Priority::Normal, move |_ev: &mut Gate, _env: &mut Envelope| {
            push(&o, "b");
            Ok(())
        });
        let o = order.clone();
        bus.subscribe(
            SubscribeOpts::from(Priority::Low).receive_canceled(),
            move |_ev: &mut Gate, _env: &mut Envelope| {
                push(&o, "c");
                Ok(())
            },
        );

        let receipt = bus.publish(&mut Gate).await;
        assert_eq!(taken(&order), vec!["a", "c"], "b must be skipped after cancel");
        assert!(receipt.is_canceled());
        assert_eq!(receipt.handlers_run(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_only_affects_later_handlers() {
        let bus = Bus::new();
        let order = log();

        let o = order.clone();
        bus.subscribe(Priority::Normal, move |_ev: &mut Gate, _env: &mut Envelope| {
            push(&o, "same_bucket_tie");
            Ok(())
        });
        let o = order.clone();
        bus.subscribe(Priority::Normal, move |_ev: &mut Gate, env: &mut Envelope| {
            push(&o, "canceler");
            env.cancel()?;
            Ok(())
        });

        // Insertion order puts the canceler second; the first handler already ran.
        bus.publish(&mut Gate).await;
        assert_eq!(taken(&order), vec!["same_bucket_tie", "canceler"]);
    }

    #[tokio::test]
    async fn test_outcome_round_trips_to_publisher() {
        let bus = Bus::new();
        bus.subscribe(Priority::Normal, |_ev: &mut Gate, env: &mut Envelope| {
            env.set_outcome(Outcome::Deny)?;
            Ok(())
        });

        let receipt = bus.publish(&mut Gate).await;
        assert_eq!(receipt.outcome(), Outcome::Deny);
    }

    #[tokio::test]
    async fn test_capability_violation_inside_handler_does_not_stop_dispatch() {
        let bus = Bus::new();
        let order = log();

        let o = order.clone();
        bus.subscribe(Priority::High, move |_ev: &mut Ping, env: &mut Envelope| {
            push(&o, "violator");
            // Ping is not cancelable; this propagates as a handler error.
            env.cancel()?;
            Ok(())
        });
        let o = order.clone();
        bus.subscribe(Priority::Normal, move |_ev: &mut Ping, _env: &mut Envelope| {
            push(&o, "after");
            Ok(())
        });

        let receipt = bus.publish(&mut Ping).await;
        assert!(!receipt.is_canceled());
        assert_eq!(taken(&order), vec!["violator", "after"]);
    }

    #[tokio::test]
    async fn test_handler_panic_is_isolated() {
        let bus = Bus::new();
        let order = log();

        bus.subscribe(Priority::High, |_ev: &mut Ping, _env: &mut Envelope| {
            panic!("boom");
        });
        let o = order.clone();
        bus.subscribe(Priority::Normal, move |_ev: &mut Ping, _env: &mut Envelope| {
            push(&o, "survivor");
            Ok(())
        });

        let receipt = bus.publish(&mut Ping).await;
        assert!(receipt.delivered());
        assert_eq!(taken(&order), vec!["survivor"]);
    }

    #[tokio::test]
    async fn test_midflight_unsubscribe_does_not_change_snapshot() {
        let bus = Arc::new(Bus::new());
        let order = log();

        let o = order.clone();
        let b = bus.subscribe(Priority::Normal, move |_ev: &mut Ping, _env: &mut Envelope| {
            push(&o, "b");
            Ok(())
        });

        let o = order.clone();
        let bus_in_handler = Arc::clone(&bus);
        bus.subscribe(Priority::High, move |_ev: &mut Ping, _env: &mut Envelope| {
            push(&o, "a");
            bus_in_handler.unsubscribe::<Ping>(b);
            Ok(())
        });

        bus.publish(&mut Ping).await;
        assert_eq!(taken(&order), vec!["a", "b"], "snapshot was taken before a ran");

        bus.publish(&mut Ping).await;
        assert_eq!(taken(&order), vec!["a", "b", "a"], "b is gone on the next publish");
    }

    #[tokio::test]
    async fn test_unsubscribe_owner_across_event_types() {
        let bus = Bus::new();
        let owner = OwnerId::unique();
        let order = log();

        let o = order.clone();
        bus.subscribe_owned(owner, Priority::Normal, move |_ev: &mut Ping, _env: &mut Envelope| {
            push(&o, "ping");
            Ok(())
        });
        let o = order.clone();
        bus.subscribe_owned(owner, Priority::Normal, move |_ev: &mut Pong, _env: &mut Envelope| {
            push(&o, "pong");
            Ok(())
        });
        let o = order.clone();
        bus.subscribe(Priority::Normal, move |_ev: &mut Ping, _env: &mut Envelope| {
            push(&o, "kept");
            Ok(())
        });

        assert_eq!(bus.owner_count(), 1);
        assert_eq!(bus.unsubscribe_owner(owner), 2);
        assert_eq!(bus.owner_count(), 0);

        bus.publish(&mut Ping).await;
        bus.publish(&mut Pong).await;
        assert_eq!(taken(&order), vec!["kept"]);
    }

    #[tokio::test]
    async fn test_phase_advances_through_buckets() {
        let bus = Bus::new();
        bus.subscribe(Priority::High, |_ev: &mut Ping, env: &mut Envelope| {
            assert_eq!(env.phase(), Some(Priority::High));
            Ok(())
        });
        bus.subscribe(Priority::Low, |_ev: &mut Ping, env: &mut Envelope| {
            assert_eq!(env.phase(), Some(Priority::Low));
            Ok(())
        });

        let receipt = bus.publish(&mut Ping).await;
        assert_eq!(receipt.phase(), Some(Priority::Low));
    }

    #[tokio::test]
    async fn test_envelope_exposes_listener_snapshot_and_current_handler() {
        let bus = Bus::new();
        bus.subscribe(Priority::High, |_ev: &mut Ping, env: &mut Envelope| {
            assert_eq!(env.listeners().len(), 2);
            let current = env.current_handler().expect("mid-flight handler visible");
            assert_eq!(current.priority, Priority::High);
            Ok(())
        });
        bus.subscribe(Priority::Normal, |_ev: &mut Ping, _env: &mut Envelope| Ok(()));

        let receipt = bus.publish(&mut Ping).await;
        assert_eq!(receipt.listeners().len(), 2);
        assert!(receipt.current_handler().is_none(), "marker cleared after dispatch");
    }

    #[tokio::test]
    async fn test_async_handlers_are_awaited_in_order() {
        let bus = Bus::new();
        let order = log();

        let o = order.clone();
        bus.subscribe_async(Priority::High, move |_ev: &mut Ping, _env: &mut Envelope| {
            let o = o.clone();
            async move {
                tokio::task::yield_now().await;
                push(&o, "slow_high");
                Ok(())
            }
            .boxed()
        });
        let o = order.clone();
        bus.subscribe(Priority::Normal, move |_ev: &mut Ping, _env: &mut Envelope| {
            push(&o, "fast_normal");
            Ok(())
        });

        bus.publish(&mut Ping).await;
        assert_eq!(
            taken(&order),
            vec!["slow_high", "fast_normal"],
            "handler k is fully awaited before k+1"
        );
    }

    #[tokio::test]
    async fn test_handler_trait_objects_dispatch() {
        struct Recorder {
            order: Log,
        }

        #[async_trait::async_trait]
        impl Handler<Ping> for Recorder {
            async fn handle(&self, _event: &mut Ping, _envelope: &mut Envelope) -> Result<(), HandlerError> {
                push(&self.order, "recorder");
                Ok(())
            }

            fn label(&self) -> &'static str {
                "recorder"
            }
        }

        let bus = Bus::new();
        let order = log();
        bus.subscribe_handler(Priority::Normal, Arc::new(Recorder { order: order.clone() }));

        bus.publish(&mut Ping).await;
        assert_eq!(taken(&order), vec!["recorder"]);
        assert_eq!(bus.listeners::<Ping>()[0].label, "recorder");
    }

    #[test]
    fn test_blocking_publish_drives_async_handlers() {
        let bus = Bus::new();
        let order = log();

        let o = order.clone();
        bus.subscribe_async(Priority::Normal, move |_ev: &mut Ping, _env: &mut Envelope| {
            let o = o.clone();
            async move {
                push(&o, "ran");
                Ok(())
            }
            .boxed()
        });

        let receipt = bus.publish_blocking(&mut Ping);
        assert!(receipt.delivered());
        assert_eq!(taken(&order), vec!["ran"]);
    }

    #[tokio::test]
    async fn test_zero_subscribers_is_not_an_error() {
        let bus = Bus::new();
        let receipt = bus.publish(&mut Ping).await;
        assert!(!receipt.delivered());
        assert_eq!(receipt.handlers_run(), 0);
        assert_eq!(bus.events_published(), 1);
        assert_eq!(bus.handlers_invoked(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_manual_subscriptions_invoke_twice() {
        let bus = Bus::new();
        let order = log();

        for _ in 0..2 {
            let o = order.clone();
            bus.subscribe(Priority::Normal, move |_ev: &mut Ping, _env: &mut Envelope| {
                push(&o, "dup");
                Ok(())
            });
        }

        bus.publish(&mut Ping).await;
        assert_eq!(taken(&order), vec!["dup", "dup"]);
    }

    #[tokio::test]
    async fn test_diagnostics_counts_and_clear() {
        let bus = Bus::new();
        bus.subscribe(Priority::Normal, |_ev: &mut Ping, _env: &mut Envelope| Ok(()));
        bus.subscribe(Priority::Normal, |_ev: &mut Pong, _env: &mut Envelope| Ok(()));

        bus.publish(&mut Ping).await;
        assert_eq!(bus.event_type_count(), 2);
        assert_eq!(bus.handler_count::<Ping>(), 1);
        assert_eq!(bus.events_published(), 1);
        assert_eq!(bus.handlers_invoked(), 1);

        bus.clear();
        assert_eq!(bus.event_type_count(), 0);
        assert_eq!(bus.handler_count::<Ping>(), 0);
        assert_eq!(bus.events_published(), 0);
    }

    #[tokio::test]
    async fn test_clear_event_removes_one_type_only() {
        let bus = Bus::new();
        bus.subscribe(Priority::Normal, |_ev: &mut Ping, _env: &mut Envelope| Ok(()));
        bus.subscribe(Priority::Normal, |_ev: &mut Ping, _env: &mut Envelope| Ok(()));
        bus.subscribe(Priority::Normal, |_ev: &mut Pong, _env: &mut Envelope| Ok(()));

        assert_eq!(bus.clear_event::<Ping>(), 2);
        assert_eq!(bus.handler_count::<Ping>(), 0);
        assert_eq!(bus.handler_count::<Pong>(), 1);
    }

    #[tokio::test]
    async fn test_listener_dump_is_in_dispatch_order() {
        let bus = Bus::new();
        bus.subscribe(Priority::Low, |_ev: &mut Ping, _env: &mut Envelope| Ok(()));
        bus.subscribe(Priority::Highest, |_ev: &mut Ping, _env: &mut Envelope| Ok(()));

        let dump = bus.listeners::<Ping>();
        assert_eq!(dump.len(), 2);
        assert_eq!(dump[0].priority, Priority::Highest);
        assert_eq!(dump[1].priority, Priority::Low);
    }
}
