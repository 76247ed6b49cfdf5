// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracking configuration.

/// Delay between the last observable scroll change and the idle evaluation.
pub const DEFAULT_IDLE_DELAY_MS: u64 = 300;

/// Minimum per-axis offset change treated as scrolling.
pub const DEFAULT_THROTTLE: f64 = 1.0;

/// Process-scoped tracking settings, owned by a [`Tracker`](crate::Tracker).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackingConfig {
    /// Global switch. While off, `track` has no effect and nothing notifies.
    pub enabled: bool,
    /// When on, only nodes flagged [`NodeFlags::SELECTED`](crate::NodeFlags::SELECTED) notify.
    pub selective_tracking: bool,
    /// Scroll idle debounce window in milliseconds.
    pub idle_delay_ms: u64,
    /// Throttle given to newly tracked scrollable nodes.
    pub default_throttle: f64,
}

impl TrackingConfig {
    /// The default configuration with tracking switched on.
    pub const fn enabled() -> Self {
        Self {
            enabled: true,
            selective_tracking: false,
            idle_delay_ms: DEFAULT_IDLE_DELAY_MS,
            default_throttle: DEFAULT_THROTTLE,
        }
    }
}

impl Default for TrackingConfig {
    /// Tracking starts switched off and must be enabled explicitly.
    fn default() -> Self {
        Self {
            enabled: false,
            ..Self::enabled()
        }
    }
}
