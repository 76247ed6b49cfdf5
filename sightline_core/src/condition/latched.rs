// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::sync::Arc;
use core::fmt;

use super::{Condition, ConditionContext, ThresholdHandler};
use crate::geometry::clamp_percentage;
use crate::timer::TimerId;
use crate::types::ScrollState;

/// Met when the element stays at or above `min_percentage` for `min_duration_ms`.
///
/// Crossing the threshold arms a confirmation timer; dropping below it cancels the timer. The
/// confirmation succeeds only if the percentage is still met when it fires, so the check is made
/// once at expiry and not continuously. Once met the condition is latched: staying visible fires
/// nothing more, and the next drop below the threshold fires failure exactly once.
///
/// A `min_duration_ms` of zero confirms at the same instant.
pub struct ViewabilityCondition {
    min_percentage: f32,
    min_duration_ms: u64,
    last_percentage: f32,
    is_met: bool,
    is_percentage_met: bool,
    pending: Option<TimerId>,
    handler: Arc<dyn ThresholdHandler>,
}

impl ViewabilityCondition {
    /// Creates the condition. `min_percentage` is clamped into `[0, 100]`.
    pub fn new(
        min_percentage: f32,
        min_duration_ms: u64,
        handler: Arc<dyn ThresholdHandler>,
    ) -> Self {
        Self {
            min_percentage: clamp_percentage(min_percentage),
            min_duration_ms,
            last_percentage: -1.0,
            is_met: false,
            is_percentage_met: false,
            pending: None,
            handler,
        }
    }

    /// Returns `true` while latched met.
    pub fn is_met(&self) -> bool {
        self.is_met
    }

    /// Returns `true` while a confirmation is armed.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn set_percentage_met(&mut self, cx: &mut ConditionContext<'_>, met: bool) {
        if self.is_percentage_met == met {
            return;
        }
        self.is_percentage_met = met;
        if let Some(stale) = self.pending.take() {
            cx.cancel(stale);
        }
        if met {
            self.pending = Some(cx.schedule(self.min_duration_ms));
        }
    }

    fn failure(&self, cx: &mut ConditionContext<'_>) {
        let handler = self.handler.clone();
        cx.dispatch(move || handler.condition_failed());
    }
}

impl Condition for ViewabilityCondition {
    fn evaluate(&mut self, cx: &mut ConditionContext<'_>, _state: ScrollState, percentage: f32) {
        if !self.is_met && percentage >= self.min_percentage {
            self.set_percentage_met(cx, true);
        } else if percentage < self.min_percentage {
            self.set_percentage_met(cx, false);
            if self.is_met {
                self.is_met = false;
                self.failure(cx);
            }
        }
        self.last_percentage = percentage;
    }

    fn reset(&mut self, cx: &mut ConditionContext<'_>) {
        if self.is_met && self.last_percentage < self.min_percentage {
            self.is_met = false;
            self.last_percentage = -1.0;
            self.failure(cx);
        }
        self.set_percentage_met(cx, false);
    }

    fn on_timer(&mut self, cx: &mut ConditionContext<'_>, timer: TimerId) {
        if self.pending != Some(timer) {
            return;
        }
        self.pending = None;
        if !self.is_percentage_met {
            return;
        }
        self.is_met = true;
        let handler = self.handler.clone();
        cx.dispatch(move || handler.condition_met());
    }
}

impl fmt::Debug for ViewabilityCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewabilityCondition")
            .field("min_percentage", &self.min_percentage)
            .field("min_duration_ms", &self.min_duration_ms)
            .field("last_percentage", &self.last_percentage)
            .field("is_met", &self.is_met)
            .field("is_percentage_met", &self.is_percentage_met)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
