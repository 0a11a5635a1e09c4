//! # Bus configuration.
//!
//! Provides [`BusConfig`] — knobs for the dispatch loop's logging behavior.
//!
//! All fields are public for flexibility; [`BusConfig::default`] matches the
//! quiet behavior most hosts want in release builds.

/// Configuration for a [`Bus`](crate::Bus).
///
/// ## Field semantics
/// - `warn_unhandled`: a publish that finds zero listeners logs at `warn`
///   instead of `trace` (useful while wiring a new event type)
/// - `log_skips`: handlers skipped because the event was canceled log at
///   `debug` instead of `trace`
#[derive(Clone, Copy, Debug)]
pub struct BusConfig {
    /// Log publishes with no listeners at `warn` level.
    ///
    /// Zero listeners is never an error — this only raises the visibility of
    /// event types nobody subscribed to yet.
    pub warn_unhandled: bool,

    /// Log cancellation skips at `debug` level.
    ///
    /// Skips happen when a cancelable event was canceled and a later handler
    /// did not opt into `receive_canceled`.
    pub log_skips: bool,
}

impl Default for BusConfig {
    /// Returns a config with:
    /// - `warn_unhandled = false` (unhandled publishes trace only);
    /// - `log_skips = false` (cancel skips trace only).
    fn default() -> Self {
        Self {
            warn_unhandled: false,
            log_skips: false,
        }
    }
}
