//! Error types used by the bus and by handlers.
//!
//! This module defines two main error enums:
//!
//! - [`BusError`] — misuse of the envelope protocol (capability violations)
//!   and internal dispatch-ordering bugs.
//! - [`HandlerError`] — failures reported by individual handlers during
//!   dispatch.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for
//! logging/metrics. A `HandlerError` never aborts a dispatch: the bus logs it
//! with context and continues with the next handler.

use thiserror::Error;

use crate::events::Priority;

/// # Errors produced by the bus protocol itself.
///
/// These represent misuse of the envelope (mutating a capability the event
/// type does not declare) or a dispatch-ordering bug inside the registry.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// `cancel`/`set_canceled` was called on an event type that does not
    /// declare the cancelable capability.
    #[error("event type '{event}' is not cancelable")]
    NotCancelable {
        /// Label of the offending event type.
        event: &'static str,
    },

    /// `set_outcome` was called on an event type that does not declare the
    /// outcome capability.
    #[error("event type '{event}' does not carry an outcome")]
    NoOutcome {
        /// Label of the offending event type.
        event: &'static str,
    },

    /// The dispatch phase was asked to move backward.
    ///
    /// Phase only ever advances along the priority buckets of one dispatch;
    /// a regression means the registry invoked handlers out of order.
    #[error("dispatch phase may not regress from {from:?} to {to:?}")]
    PhaseRegression {
        /// Bucket the envelope was already at.
        from: Priority,
        /// Earlier bucket the caller tried to move back to.
        to: Priority,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tannoy::BusError;
    ///
    /// let err = BusError::NotCancelable { event: "Ping" };
    /// assert_eq!(err.as_label(), "not_cancelable");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::NotCancelable { .. } => "not_cancelable",
            BusError::NoOutcome { .. } => "no_outcome",
            BusError::PhaseRegression { .. } => "phase_regression",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::NotCancelable { event } => format!("not cancelable: {event}"),
            BusError::NoOutcome { event } => format!("no outcome capability: {event}"),
            BusError::PhaseRegression { from, to } => {
                format!("phase regression: {from:?} -> {to:?}")
            }
        }
    }
}

/// # Errors returned by handlers during dispatch.
///
/// A handler returning `Err` is logged with (event label, handler label) and
/// dispatch continues with the next handler; nothing here is fatal.
///
/// `BusError` converts into `HandlerError` so envelope misuse propagates out
/// of a handler with `?`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Envelope protocol misuse surfaced from inside a handler.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Handler failed with a plain message.
    #[error("handler failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// Handler failed with an underlying error value.
    #[error("handler failed: {source}")]
    Other {
        /// The underlying error.
        #[from]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl HandlerError {
    /// Creates a [`HandlerError::Failed`] from any displayable message.
    ///
    /// # Example
    /// ```
    /// use tannoy::HandlerError;
    ///
    /// let err = HandlerError::failed("boom");
    /// assert_eq!(err.as_label(), "handler_failed");
    /// ```
    pub fn failed(error: impl Into<String>) -> Self {
        HandlerError::Failed { error: error.into() }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Bus(e) => e.as_label(),
            HandlerError::Failed { .. } => "handler_failed",
            HandlerError::Other { .. } => "handler_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Bus(e) => e.as_message(),
            HandlerError::Failed { error } => format!("error: {error}"),
            HandlerError::Other { source } => format!("error: {source}"),
        }
    }
}
