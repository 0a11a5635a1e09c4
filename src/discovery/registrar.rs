//! # Lifecycle-bound registration of subscriber instances.
//!
//! The [`Registrar`] is the bridge between object lifecycles and the bus:
//! when a subscriber instance comes alive it is attached, when it goes away
//! it is detached, and producer/consumer code never calls subscribe or
//! unsubscribe for it directly.
//!
//! ## Architecture
//! ```text
//! any thread:  attach(Arc<S>) ──┐
//!              detach(owner)  ──┼──► [unbounded queue]
//!              OwnerGuard drop ─┘          │
//!                                          ▼  drain() — designated context
//!                              Attach → mark owner processed (idempotent)
//!                                       → bus.add per bound method
//!                              Detach → bus.unsubscribe_owner
//! ```
//!
//! ## Rules
//! - Lifecycle notifications may originate on any thread; registry mutation
//!   happens only inside [`drain`](Registrar::drain), which the host calls
//!   on its designated context (a game loop tick, or the optional
//!   [`spawn_pump`](Registrar::spawn_pump) task).
//! - Instances alive before the first drain are all picked up by it: ops
//!   queue in order, so the startup scan is just the first drain.
//! - Attaching the same live instance twice registers once; the second
//!   attach is a no-op at drain time.
//! - [`OwnerGuard`] ties detach to scope exit for hosts whose object
//!   lifetimes are lexical.

use std::any::TypeId;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::bus::handler::ErasedCall;
use crate::bus::listeners::HandlerRecord;
use crate::bus::{Bus, OwnerId};
use crate::discovery::subscriber::{HandlerTable, Subscriber};
use crate::events::SubscribeOpts;

/// One handler method already bound to a live instance, waiting for drain.
struct BoundHandler {
    type_id: TypeId,
    event_label: &'static str,
    opts: SubscribeOpts,
    label: &'static str,
    call: ErasedCall,
}

enum Op {
    Attach {
        owner: OwnerId,
        subscriber: &'static str,
        handlers: Vec<BoundHandler>,
    },
    Detach {
        owner: OwnerId,
    },
}

/// Queues subscriber lifecycle notifications and applies them to a [`Bus`]
/// on the host's designated context.
pub struct Registrar {
    bus: Arc<Bus>,
    tx: mpsc::UnboundedSender<Op>,
    rx: Mutex<mpsc::UnboundedReceiver<Op>>,
    stop: CancellationToken,
    pump_started: AtomicBool,
}

impl Registrar {
    /// Creates a registrar applying lifecycle ops to `bus`.
    pub fn new(bus: Arc<Bus>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            bus,
            tx,
            rx: Mutex::new(rx),
            stop: CancellationToken::new(),
            pump_started: AtomicBool::new(false),
        }
    }

    /// The bus this registrar mutates.
    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    /// Enqueues registration of every handler method of `instance`.
    ///
    /// Safe to call from any thread; nothing is registered until the next
    /// [`drain`](Self::drain). Attaching the same live instance twice is a
    /// no-op the second time. Returns the instance's owner identity.
    pub fn attach<S: Subscriber>(&self, instance: Arc<S>) -> OwnerId {
        let owner = OwnerId::from_arc(&instance);

        let mut table = HandlerTable::new();
        S::handlers(&mut table);
        let handlers = table
            .into_entries()
            .into_iter()
            .map(|entry| BoundHandler {
                type_id: entry.type_id,
                event_label: entry.event_label,
                opts: entry.opts,
                label: entry.method,
                call: (entry.bind)(Arc::clone(&instance)),
            })
            .collect();

        self.enqueue(Op::Attach {
            owner,
            subscriber: S::name(),
            handlers,
        });
        owner
    }

    /// Like [`attach`](Self::attach), returning a guard that enqueues detach
    /// when dropped.
    pub fn attach_guarded<S: Subscriber>(&self, instance: Arc<S>) -> OwnerGuard {
        let owner = self.attach(instance);
        OwnerGuard {
            owner,
            tx: self.tx.clone(),
        }
    }

    /// Enqueues teardown of every subscription bound to `owner`.
    pub fn detach(&self, owner: OwnerId) {
        self.enqueue(Op::Detach { owner });
    }

    fn enqueue(&self, op: Op) {
        if self.tx.send(op).is_err() {
            warn!("registrar queue closed; lifecycle op dropped");
        }
    }

    /// Number of queued, not-yet-applied lifecycle ops.
    pub fn pending(&self) -> usize {
        self.rx.lock().len()
    }

    /// Applies every queued op, in order. Returns the number applied.
    ///
    /// Call this on the host's designated context only — it is the single
    /// place registry mutation happens on behalf of lifecycle notifications.
    pub fn drain(&self) -> usize {
        let mut rx = self.rx.lock();
        let mut applied = 0;
        while let Ok(op) = rx.try_recv() {
            match op {
                Op::Attach {
                    owner,
                    subscriber,
                    handlers,
                } => self.apply_attach(owner, subscriber, handlers),
                Op::Detach { owner } => {
                    let removed = self.bus.unsubscribe_owner(owner);
                    debug!(owner = %owner, removed, "subscriber detached");
                }
            }
            applied += 1;
        }
        applied
    }

    fn apply_attach(&self, owner: OwnerId, subscriber: &'static str, handlers: Vec<BoundHandler>) {
        if handlers.is_empty() {
            warn!(subscriber, owner = %owner, "subscriber type lists no handlers; nothing registered");
            return;
        }
        if !self.bus.mark_owner_processed(owner) {
            trace!(subscriber, owner = %owner, "instance already attached");
            return;
        }
        let count = handlers.len();
        for handler in handlers {
            let record = HandlerRecord::new(
                handler.call,
                handler.opts,
                Some(owner),
                handler.label,
                Some(subscriber),
            );
            trace!(
                subscriber,
                event = handler.event_label,
                handler = handler.label,
                "handler registered"
            );
            self.bus.add_erased(handler.type_id, record);
        }
        debug!(subscriber, owner = %owner, handlers = count, "subscriber attached");
    }

    /// Spawns a tokio task draining the queue every `every`.
    ///
    /// For hosts without their own tick to call [`drain`](Self::drain) from.
    /// May be called once per registrar; a second call logs a warning and
    /// returns `None`. The task stops on [`shutdown`](Self::shutdown) after
    /// a final drain.
    pub fn spawn_pump(self: Arc<Self>, every: Duration) -> Option<JoinHandle<()>> {
        if self.pump_started.swap(true, AtomicOrdering::SeqCst) {
            warn!("registrar pump already started");
            return None;
        }

        let me = self;
        Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = me.stop.cancelled() => break,
                    _ = tick.tick() => {
                        me.drain();
                    }
                }
            }
            me.drain();
        }))
    }

    /// Stops the pump task, if one was spawned.
    pub fn shutdown(&self) {
        self.stop.cancel();
    }
}

/// RAII handle for one attached instance; dropping it enqueues detach.
///
/// For hosts whose object lifetimes are lexical — an owning container keeps
/// the guard next to the instance and teardown follows automatically.
pub struct OwnerGuard {
    owner: OwnerId,
    tx: mpsc::UnboundedSender<Op>,
}

impl OwnerGuard {
    /// Owner identity this guard detaches on drop.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(Op::Detach { owner: self.owner });
    }
}
