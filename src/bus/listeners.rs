//! # Subscription records and the per-event-type listener list.
//!
//! A [`HandlerRecord`] is one subscription: the erased callable plus its
//! ordering keys, flags, owner, and debug labels. A [`ListenerList`] holds
//! the records for one event type in insertion order and lazily maintains a
//! priority-sorted snapshot, cached until the next mutation.
//!
//! ## Rules
//! - Sort order: ascending [`Priority`] bucket, then descending fine value,
//!   ties kept in insertion order (the sort is stable).
//! - The snapshot is an `Arc<[HandlerRecord]>`; the common dispatch path just
//!   clones the `Arc`, so an in-flight dispatch never observes a mutation.
//! - Lists are owned exclusively by the [`Bus`](crate::Bus), one per event
//!   type, behind its registry lock.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::bus::handler::ErasedCall;
use crate::events::{Priority, SubscribeOpts};

/// Global sequence counter for handler ids.
static HANDLER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Global sequence counter for synthetic owner ids.
static OWNER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Identity of one subscription, issued at subscribe time.
///
/// Ids increase monotonically across the process, so they double as
/// insertion-order witnesses in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) fn next() -> Self {
        HandlerId(HANDLER_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw sequence number.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "h#{}", self.0)
    }
}

/// Opaque identity a group of subscriptions is bound to, for bulk teardown.
///
/// Auto-registered instances get an id derived from their `Arc` address, so
/// two attaches of the same live instance agree on it. Manual owned
/// subscriptions typically use [`OwnerId::unique`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Derives the id for a live shared instance.
    ///
    /// Stable for the lifetime of the allocation: every clone of the same
    /// `Arc` maps to the same id.
    pub fn from_arc<T>(instance: &Arc<T>) -> Self {
        OwnerId(Arc::as_ptr(instance) as usize as u64)
    }

    /// Returns a fresh synthetic id for manual grouped subscriptions.
    pub fn unique() -> Self {
        OwnerId(OWNER_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw id value.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "owner#{:x}", self.0)
    }
}

/// Public descriptor of one subscription, used in diagnostics dumps and in
/// the envelope's listener snapshot.
#[derive(Clone, Debug)]
pub struct HandlerInfo {
    /// Subscription identity.
    pub id: HandlerId,
    /// Debug label (closure path, handler name, or bound method path).
    pub label: &'static str,
    /// Subscriber type the handler was bound from, if auto-registered.
    pub origin: Option<&'static str>,
    /// Coarse dispatch bucket.
    pub priority: Priority,
    /// Tie-break within the bucket.
    pub fine: i32,
    /// Whether the handler still runs after cancellation.
    pub receive_canceled: bool,
    /// Owner the subscription is bound to, if any.
    pub owner: Option<OwnerId>,
}

impl std::fmt::Display for HandlerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.origin {
            Some(origin) => write!(f, "{origin}::{}", self.label)?,
            None => write!(f, "{}", self.label)?,
        }
        write!(f, " [{}/{}]", self.priority.as_label(), self.fine)?;
        if self.receive_canceled {
            write!(f, " +canceled")?;
        }
        Ok(())
    }
}

/// One subscription as stored in a listener list.
#[derive(Clone)]
pub(crate) struct HandlerRecord {
    pub(crate) id: HandlerId,
    pub(crate) call: ErasedCall,
    pub(crate) priority: Priority,
    pub(crate) fine: i32,
    pub(crate) receive_canceled: bool,
    pub(crate) owner: Option<OwnerId>,
    pub(crate) label: &'static str,
    pub(crate) origin: Option<&'static str>,
}

impl HandlerRecord {
    pub(crate) fn new(
        call: ErasedCall,
        opts: SubscribeOpts,
        owner: Option<OwnerId>,
        label: &'static str,
        origin: Option<&'static str>,
    ) -> Self {
        Self {
            id: HandlerId::next(),
            call,
            priority: opts.priority,
            fine: opts.fine,
            receive_canceled: opts.receive_canceled,
            owner,
            label,
            origin,
        }
    }

    pub(crate) fn info(&self) -> HandlerInfo {
        HandlerInfo {
            id: self.id,
            label: self.label,
            origin: self.origin,
            priority: self.priority,
            fine: self.fine,
            receive_canceled: self.receive_canceled,
            owner: self.owner,
        }
    }
}

/// Listener collection for one event type.
///
/// Records stay in insertion order; the sorted view is computed lazily and
/// cached until the next mutation.
pub(crate) struct ListenerList {
    records: Vec<HandlerRecord>,
    cached: Option<Arc<[HandlerRecord]>>,
}

impl ListenerList {
    pub(crate) fn new() -> Self {
        Self {
            records: Vec::new(),
            cached: None,
        }
    }

    /// Appends a record and invalidates the cached order.
    pub(crate) fn add(&mut self, record: HandlerRecord) {
        self.records.push(record);
        self.cached = None;
    }

    /// Removes the record with the given id. Returns whether one was removed.
    pub(crate) fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        let removed = self.records.len() != before;
        if removed {
            self.cached = None;
        }
        removed
    }

    /// Removes every record bound to `owner`. Returns the count removed.
    pub(crate) fn remove_owner(&mut self, owner: OwnerId) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.owner != Some(owner));
        let removed = before - self.records.len();
        if removed > 0 {
            self.cached = None;
        }
        removed
    }

    /// Returns the cached sorted snapshot, if still valid.
    pub(crate) fn cached(&self) -> Option<Arc<[HandlerRecord]>> {
        self.cached.clone()
    }

    /// Returns the sorted snapshot, recomputing it only after a mutation.
    ///
    /// Stable sort: ascending bucket, descending fine, insertion order for
    /// full ties.
    pub(crate) fn sorted(&mut self) -> Arc<[HandlerRecord]> {
        if let Some(snapshot) = &self.cached {
            return Arc::clone(snapshot);
        }
        let mut ordered = self.records.clone();
        ordered.sort_by(|a, b| a.priority.cmp(&b.priority).then(b.fine.cmp(&a.fine)));
        let snapshot: Arc<[HandlerRecord]> = ordered.into();
        self.cached = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Ordered descriptor dump for diagnostics.
    pub(crate) fn infos(&mut self) -> Vec<HandlerInfo> {
        self.sorted().iter().map(HandlerRecord::info).collect()
    }

    pub(crate) fn records(&self) -> &[HandlerRecord] {
        &self.records
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
