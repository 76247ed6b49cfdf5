// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::sync::Arc;
use core::fmt;

use super::{Condition, ConditionContext, TrackingHandler, VisibleInterval};
use crate::geometry::clamp_percentage;
use crate::types::ScrollState;

/// Reports every interval the element spends at or above `min_percentage`.
///
/// Each interval produces [`TrackingHandler::viewability_started`] when it opens and
/// [`TrackingHandler::viewability_ended`] when it closes. Intervals that lasted at least
/// `min_duration_ms` are also reported through [`TrackingHandler::condition_met`]. The cycle
/// repeats for as long as the node lives.
pub struct DurationTrackingCondition {
    min_percentage: f32,
    min_duration_ms: u64,
    start_ms: Option<u64>,
    max_percentage: f32,
    last_percentage: f32,
    handler: Arc<dyn TrackingHandler>,
}

impl DurationTrackingCondition {
    /// Creates the condition. `min_percentage` is clamped into `[0, 100]`.
    pub fn new(
        min_percentage: f32,
        min_duration_ms: u64,
        handler: Arc<dyn TrackingHandler>,
    ) -> Self {
        Self {
            min_percentage: clamp_percentage(min_percentage),
            min_duration_ms,
            start_ms: None,
            max_percentage: 0.0,
            last_percentage: -1.0,
            handler,
        }
    }

    /// Start of the open interval, if any.
    pub fn interval_start(&self) -> Option<u64> {
        self.start_ms
    }

    fn open(&mut self, cx: &mut ConditionContext<'_>, percentage: f32) {
        self.start_ms = Some(cx.now_ms());
        self.max_percentage = percentage;
        let handler = self.handler.clone();
        cx.dispatch(move || handler.viewability_started());
    }

    fn close(&mut self, cx: &mut ConditionContext<'_>) {
        let Some(start_ms) = self.start_ms.take() else {
            return;
        };
        let interval = VisibleInterval {
            start_ms,
            duration_ms: cx.now_ms().saturating_sub(start_ms),
            max_percentage: self.max_percentage,
        };
        if interval.duration_ms >= self.min_duration_ms {
            let handler = self.handler.clone();
            cx.dispatch(move || handler.condition_met(interval));
        }
        let handler = self.handler.clone();
        cx.dispatch(move || handler.viewability_ended(interval));
    }
}

impl Condition for DurationTrackingCondition {
    fn evaluate(&mut self, cx: &mut ConditionContext<'_>, _state: ScrollState, percentage: f32) {
        self.max_percentage = self.max_percentage.max(percentage);
        if percentage >= self.min_percentage && self.start_ms.is_none() {
            self.open(cx, percentage);
        } else if percentage < self.min_percentage && self.start_ms.is_some() {
            self.close(cx);
        }
        self.last_percentage = percentage;
    }

    fn reset(&mut self, cx: &mut ConditionContext<'_>) {
        self.close(cx);
        self.max_percentage = 0.0;
        self.last_percentage = -1.0;
    }
}

impl fmt::Debug for DurationTrackingCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurationTrackingCondition")
            .field("min_percentage", &self.min_percentage)
            .field("min_duration_ms", &self.min_duration_ms)
            .field("start_ms", &self.start_ms)
            .field("max_percentage", &self.max_percentage)
            .field("last_percentage", &self.last_percentage)
            .finish_non_exhaustive()
    }
}
