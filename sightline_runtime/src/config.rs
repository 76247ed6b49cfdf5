// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use sightline_core::TrackingConfig;

/// Name given to the tracking worker thread unless configured otherwise.
pub const DEFAULT_QUEUE_NAME: &str = "sightline.tracking";

/// Settings for a [`Tracking`](crate::Tracking) instance.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeConfig {
    /// Settings handed to the tracker.
    pub tracking: TrackingConfig,
    /// Worker thread name.
    pub queue_name: String,
}

impl RuntimeConfig {
    /// Default settings with tracking switched on.
    pub fn enabled() -> Self {
        Self {
            tracking: TrackingConfig::enabled(),
            ..Self::default()
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            queue_name: DEFAULT_QUEUE_NAME.to_owned(),
        }
    }
}
