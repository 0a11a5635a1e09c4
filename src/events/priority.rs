//! # Handler priorities and subscription options.
//!
//! Dispatch order is decided by a coarse [`Priority`] bucket first and a fine
//! `i32` value second. Buckets run in declaration order ([`Priority::Highest`]
//! first); within one bucket a larger fine value runs earlier; full ties keep
//! insertion order.
//!
//! When a subscription supplies only a raw integer, the bucket is derived via
//! [`Priority::from_fine`] and the integer becomes the fine value — the two
//! never disagree unless both are set explicitly through [`SubscribeOpts`].
//!
//! ## Example
//! ```rust
//! use tannoy::{Priority, SubscribeOpts};
//!
//! assert_eq!(Priority::from_fine(100), Priority::Highest);
//! assert_eq!(Priority::from_fine(0), Priority::Low);
//!
//! let opts: SubscribeOpts = 60.into();
//! assert_eq!(opts.priority, Priority::High);
//! assert_eq!(opts.fine, 60);
//! ```

/// Coarse dispatch bucket. Earlier variants run first.
///
/// The envelope's phase marker advances through these buckets during one
/// dispatch; it never moves backward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Runs before everything else (fine value `>= 100`).
    Highest,
    /// Runs early (fine value `>= 50`).
    High,
    /// Default bucket (fine value `> 0`).
    Normal,
    /// Runs late (fine value `>= -50`).
    Low,
    /// Runs after everything else.
    Lowest,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl Priority {
    /// Derives the bucket for a raw numeric priority.
    ///
    /// Mapping: `>= 100` → `Highest`, `>= 50` → `High`, `> 0` → `Normal`,
    /// `>= -50` → `Low`, everything else → `Lowest`. Note that `0` lands in
    /// `Low`, not `Normal`.
    pub fn from_fine(fine: i32) -> Self {
        if fine >= 100 {
            Priority::Highest
        } else if fine >= 50 {
            Priority::High
        } else if fine > 0 {
            Priority::Normal
        } else if fine >= -50 {
            Priority::Low
        } else {
            Priority::Lowest
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Priority::Highest => "highest",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
            Priority::Lowest => "lowest",
        }
    }
}

/// Options for one subscription.
///
/// Most call sites never build this directly: `subscribe` takes
/// `impl Into<SubscribeOpts>`, so a bare [`Priority`] or a raw `i32` works.
///
/// ## Precedence
/// `priority` orders first; `fine` only breaks ties within one bucket
/// (larger runs earlier); insertion order breaks full ties. Setting a fine
/// value that the mapping would place in a different bucket does not move
/// the handler between buckets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscribeOpts {
    /// Coarse dispatch bucket.
    pub priority: Priority,
    /// Tie-break within the bucket; larger runs earlier.
    pub fine: i32,
    /// Run this handler even after the event was canceled.
    pub receive_canceled: bool,
}

impl Default for SubscribeOpts {
    /// Returns `Priority::Normal`, fine `0`, `receive_canceled = false`.
    fn default() -> Self {
        Self {
            priority: Priority::Normal,
            fine: 0,
            receive_canceled: false,
        }
    }
}

impl SubscribeOpts {
    /// Flips `receive_canceled` on.
    #[inline]
    pub fn receive_canceled(mut self) -> Self {
        self.receive_canceled = true;
        self
    }
}

impl From<Priority> for SubscribeOpts {
    /// Bucket as given, fine `0`, `receive_canceled = false`.
    fn from(priority: Priority) -> Self {
        Self {
            priority,
            fine: 0,
            receive_canceled: false,
        }
    }
}

impl From<i32> for SubscribeOpts {
    /// Bucket derived via [`Priority::from_fine`], fine = the raw value.
    fn from(fine: i32) -> Self {
        Self {
            priority: Priority::from_fine(fine),
            fine,
            receive_canceled: false,
        }
    }
}
