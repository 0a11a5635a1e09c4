//! # Per-dispatch envelope: identity, capabilities, cancellation, outcome.
//!
//! A fresh [`Envelope`] accompanies every publish. Handlers receive it as
//! `&mut` alongside the payload, may cancel the dispatch or attach an
//! [`Outcome`] (if the payload type declares the capability), and can inspect
//! the listener snapshot the dispatch was taken against. The publisher gets
//! the envelope back when dispatch completes.
//!
//! ## Ordering guarantees
//! Each envelope has a globally unique id (`EventId`) that increases
//! monotonically across the process. The phase marker advances through the
//! priority buckets of one dispatch and never moves backward.
//!
//! ## Example
//! ```rust
//! use tannoy::{Envelope, Event, Outcome};
//!
//! struct Gate;
//! impl Event for Gate {
//!     fn cancelable() -> bool { true }
//!     fn has_outcome() -> bool { true }
//! }
//!
//! let mut env = Envelope::for_event::<Gate>();
//! env.cancel().unwrap();
//! env.set_outcome(Outcome::Deny).unwrap();
//!
//! assert!(env.is_canceled());
//! assert_eq!(env.outcome(), Outcome::Deny);
//! assert!(!env.delivered());
//! ```

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::bus::HandlerInfo;
use crate::error::BusError;
use crate::events::{Event, Priority};

/// Global sequence counter for envelope ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Globally unique, monotonically increasing envelope id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    fn next() -> Self {
        EventId(EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw sequence number.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Verdict a handler may attach to an outcome-capable event.
///
/// `Default` means no handler took a position; producers typically treat it
/// the same as `Allow` unless the event's docs say otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Outcome {
    /// No handler set an outcome.
    #[default]
    Default,
    /// The queried action should proceed.
    Allow,
    /// The queried action should be blocked.
    Deny,
}

impl Outcome {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Outcome::Default => "default",
            Outcome::Allow => "allow",
            Outcome::Deny => "deny",
        }
    }
}

/// Per-dispatch metadata handed `&mut` to every handler in turn.
///
/// Capability flags are captured from the payload type when the envelope is
/// created and enforced on every mutation; violating them returns a
/// [`BusError`] and leaves the envelope unchanged.
#[derive(Debug)]
pub struct Envelope {
    id: EventId,
    at: SystemTime,
    label: &'static str,
    type_id: TypeId,
    cancelable: bool,
    outcome_capable: bool,
    canceled: bool,
    outcome: Outcome,
    phase: Option<Priority>,
    listeners: Vec<HandlerInfo>,
    current: Option<usize>,
    ran: usize,
}

impl Envelope {
    /// Creates a fresh envelope for one dispatch of `E`.
    ///
    /// Publishing does this internally; the constructor is public so tests
    /// and diagnostics can build envelopes directly.
    pub fn for_event<E: Event>() -> Self {
        Self {
            id: EventId::next(),
            at: SystemTime::now(),
            label: E::label(),
            type_id: TypeId::of::<E>(),
            cancelable: E::cancelable(),
            outcome_capable: E::has_outcome(),
            canceled: false,
            outcome: Outcome::Default,
            phase: None,
            listeners: Vec::new(),
            current: None,
            ran: 0,
        }
    }

    /// Unique id of this dispatch.
    #[inline]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Wall-clock timestamp the envelope was created at.
    #[inline]
    pub fn created_at(&self) -> SystemTime {
        self.at
    }

    /// Label of the payload type this envelope was dispatched for.
    #[inline]
    pub fn event_label(&self) -> &'static str {
        self.label
    }

    /// `TypeId` of the payload type.
    #[inline]
    pub fn event_type(&self) -> TypeId {
        self.type_id
    }

    /// Whether the payload type declared the cancelable capability.
    #[inline]
    pub fn is_cancelable(&self) -> bool {
        self.cancelable
    }

    /// Whether the payload type declared the outcome capability.
    #[inline]
    pub fn has_outcome(&self) -> bool {
        self.outcome_capable
    }

    /// Marks the dispatch canceled.
    ///
    /// Handlers scheduled after the current one are skipped unless they
    /// subscribed with `receive_canceled`. Fails on a non-cancelable type.
    pub fn cancel(&mut self) -> Result<(), BusError> {
        self.set_canceled(true)
    }

    /// Sets or clears the canceled flag.
    ///
    /// Clearing is legal: a `receive_canceled` handler may un-cancel and let
    /// the rest of the chain run normally.
    pub fn set_canceled(&mut self, canceled: bool) -> Result<(), BusError> {
        if !self.cancelable {
            return Err(BusError::NotCancelable { event: self.label });
        }
        self.canceled = canceled;
        Ok(())
    }

    /// Whether the dispatch is currently canceled.
    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// Attaches an outcome verdict. Fails on a type without the capability.
    pub fn set_outcome(&mut self, outcome: Outcome) -> Result<(), BusError> {
        if !self.outcome_capable {
            return Err(BusError::NoOutcome { event: self.label });
        }
        self.outcome = outcome;
        Ok(())
    }

    /// Current outcome ([`Outcome::Default`] until a handler sets one).
    #[inline]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// The priority bucket the dispatch has advanced to, if any.
    #[inline]
    pub fn phase(&self) -> Option<Priority> {
        self.phase
    }

    /// Advances the phase marker to `bucket`.
    ///
    /// The marker may stay put or move to a later bucket; moving backward is
    /// a dispatch-ordering bug and fails without changing the marker.
    pub(crate) fn try_advance_phase(&mut self, bucket: Priority) -> Result<(), BusError> {
        if let Some(current) = self.phase {
            if bucket < current {
                return Err(BusError::PhaseRegression {
                    from: current,
                    to: bucket,
                });
            }
        }
        self.phase = Some(bucket);
        Ok(())
    }

    /// Ordered snapshot of the handlers this dispatch was taken against.
    #[inline]
    pub fn listeners(&self) -> &[HandlerInfo] {
        &self.listeners
    }

    /// Descriptor of the handler currently being invoked, if dispatch is
    /// mid-flight.
    pub fn current_handler(&self) -> Option<&HandlerInfo> {
        self.current.and_then(|i| self.listeners.get(i))
    }

    /// Number of handlers actually invoked so far (skipped ones excluded).
    #[inline]
    pub fn handlers_run(&self) -> usize {
        self.ran
    }

    /// Whether at least one handler actually ran.
    #[inline]
    pub fn delivered(&self) -> bool {
        self.ran > 0
    }

    pub(crate) fn set_listeners(&mut self, listeners: Vec<HandlerInfo>) {
        self.listeners = listeners;
    }

    pub(crate) fn set_current(&mut self, index: Option<usize>) {
        self.current = index;
    }

    pub(crate) fn note_ran(&mut self) {
        self.ran += 1;
    }
}
