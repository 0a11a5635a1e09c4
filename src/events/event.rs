//! # Payload contract for publishable event types.
//!
//! Any `Send + Sync + 'static` type can flow through the bus by implementing
//! [`Event`]. Capabilities are declared once at the type: whether a dispatch
//! of this type may be canceled mid-flight, and whether handlers may attach
//! an [`Outcome`](crate::Outcome) verdict. The bus enforces both at every
//! envelope mutation.
//!
//! ## Example
//! ```rust
//! use tannoy::Event;
//!
//! struct PlayerDamaged { pub amount: u32 }
//!
//! impl Event for PlayerDamaged {
//!     fn cancelable() -> bool { true }
//! }
//!
//! assert_eq!(PlayerDamaged::label(), "PlayerDamaged");
//! assert!(PlayerDamaged::cancelable());
//! assert!(!PlayerDamaged::has_outcome());
//! ```

/// Marker trait for types that can be published on a [`Bus`](crate::Bus).
///
/// Capabilities are fixed at the implementing type and captured into the
/// envelope at publish time; they cannot change per instance.
pub trait Event: Send + Sync + 'static {
    /// Returns a stable, human-readable name for logs and diagnostics.
    ///
    /// The default strips the module path from `type_name::<Self>()` —
    /// override it when the short name is ambiguous.
    fn label() -> &'static str
    where
        Self: Sized,
    {
        short_type_name::<Self>()
    }

    /// Whether a handler may halt dispatch of this type via
    /// [`Envelope::cancel`](crate::Envelope::cancel).
    fn cancelable() -> bool
    where
        Self: Sized,
    {
        false
    }

    /// Whether handlers may attach an [`Outcome`](crate::Outcome) via
    /// [`Envelope::set_outcome`](crate::Envelope::set_outcome).
    fn has_outcome() -> bool
    where
        Self: Sized,
    {
        false
    }
}

/// Last path segment of `type_name::<T>()`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;
    impl Event for Plain {}

    struct Gate;
    impl Event for Gate {
        fn label() -> &'static str {
            "gate"
        }
        fn cancelable() -> bool {
            true
        }
        fn has_outcome() -> bool {
            true
        }
    }

    #[test]
    fn test_defaults_declare_nothing() {
        assert_eq!(Plain::label(), "Plain");
        assert!(!Plain::cancelable());
        assert!(!Plain::has_outcome());
    }

    #[test]
    fn test_overrides_stick() {
        assert_eq!(Gate::label(), "gate");
        assert!(Gate::cancelable());
        assert!(Gate::has_outcome());
    }
}
