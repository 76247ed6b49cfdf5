// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Outward-facing callbacks.

use alloc::boxed::Box;
use core::fmt;

/// Receives enter/exit events for a tracked element.
///
/// Called on the UI thread.
pub trait ViewabilityListener<E>: Send + Sync {
    /// The element went from not visible to partially visible.
    fn view_started(&self, element: E);

    /// The element left the viewport. `max_percentage` is the highest percentage it reached
    /// over the node's lifetime.
    fn view_ended(&self, element: E, max_percentage: f32);
}

/// A deferred outward callback.
///
/// The tracker never calls listeners or condition handlers directly. It queues callbacks in its
/// outbox, and the embedder runs them on the UI thread.
pub struct Callback(Box<dyn FnOnce() + Send>);

impl Callback {
    /// Wraps a closure.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Runs the callback.
    pub fn run(self) {
        (self.0)();
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}
