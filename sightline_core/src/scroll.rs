// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scroll offset debouncing for scrollable nodes.

use kurbo::{Point, Vec2};

use crate::timer::TimerId;

/// Converts a stream of content offsets into throttled deltas.
///
/// The debouncer only decides *whether* an offset change is observable and what its delta is.
/// The owning tree does the rest: it pushes `Scrolling(delta)` into the subtree, and arms the
/// idle check whose [`TimerId`] is parked here so the next observable change can cancel it.
#[derive(Clone, Debug)]
pub struct ScrollDebouncer {
    last_offset: Point,
    throttle: f64,
    idle_task: Option<TimerId>,
}

impl ScrollDebouncer {
    /// Creates a debouncer starting at `offset`.
    pub fn new(offset: Point, throttle: f64) -> Self {
        Self {
            last_offset: offset,
            throttle: sanitize_throttle(throttle),
            idle_task: None,
        }
    }

    /// Feeds a new content offset.
    ///
    /// Returns `last - new` when the change is observable, and records `new` as the last
    /// offset. Changes below the throttle on both axes are dropped without touching state.
    pub fn observe(&mut self, offset: Point) -> Option<Vec2> {
        let delta = self.last_offset - offset;
        if delta.x.abs() < self.throttle && delta.y.abs() < self.throttle {
            return None;
        }
        if delta == Vec2::ZERO {
            return None;
        }
        self.last_offset = offset;
        Some(delta)
    }

    /// The last observable offset.
    pub fn last_offset(&self) -> Point {
        self.last_offset
    }

    /// Minimum per-axis change that counts as scrolling.
    pub fn throttle(&self) -> f64 {
        self.throttle
    }

    /// Replaces the throttle. Negative or non-finite values become 0.
    pub fn set_throttle(&mut self, throttle: f64) {
        self.throttle = sanitize_throttle(throttle);
    }

    /// Parks the pending idle check, returning the one it replaces.
    pub fn replace_idle_task(&mut self, id: TimerId) -> Option<TimerId> {
        self.idle_task.replace(id)
    }

    /// Takes the pending idle check, if any.
    pub fn take_idle_task(&mut self) -> Option<TimerId> {
        self.idle_task.take()
    }

    /// Returns `true` if `id` is the idle check currently parked here.
    pub fn is_idle_task(&self, id: TimerId) -> bool {
        self.idle_task == Some(id)
    }
}

fn sanitize_throttle(throttle: f64) -> f64 {
    if throttle.is_finite() && throttle > 0.0 {
        throttle
    } else {
        0.0
    }
}
