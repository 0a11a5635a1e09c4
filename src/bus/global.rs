//! Process-wide default bus.
//!
//! Explicit [`Bus`] values passed by reference are the primary API; this
//! module preserves ambient-access convenience for hosts that want one
//! process-wide instance without threading a reference everywhere.
//!
//! The instance is created lazily on first use and lives for the rest of the
//! process; [`Bus::clear`] empties it when a host (or a test) needs a clean
//! slate.
//!
//! # Example
//! ```ignore
//! // In any module:
//! tannoy::global().publish_blocking(&mut LevelLoaded { id: 3 });
//! ```

use std::sync::OnceLock;

use crate::bus::registry::Bus;

static GLOBAL: OnceLock<Bus> = OnceLock::new();

/// Returns the process-wide default bus, creating it on first use.
pub fn global() -> &'static Bus {
    GLOBAL.get_or_init(Bus::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Envelope, Event, Priority};

    struct GlobalProbe;
    impl Event for GlobalProbe {}

    #[test]
    fn test_global_returns_the_same_instance() {
        let a: *const Bus = global();
        let b: *const Bus = global();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_global_is_clearable() {
        global().subscribe(Priority::Normal, |_ev: &mut GlobalProbe, _env: &mut Envelope| Ok(()));
        assert_eq!(global().handler_count::<GlobalProbe>(), 1);

        global().clear();
        assert_eq!(global().handler_count::<GlobalProbe>(), 0);
    }
}
