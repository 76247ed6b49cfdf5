// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::sync::Arc;
use core::fmt;

use super::{Condition, ConditionContext, ThresholdHandler};
use crate::geometry::clamp_percentage;
use crate::types::ScrollState;

/// Met when scrolling settles with the element at or above `min_percentage`.
///
/// - Success fires the first time the state is [`ScrollState::Idle`] with the percentage at or
///   above the threshold.
/// - Failure fires once when the percentage drops below the threshold after a success.
pub struct IdleThresholdCondition {
    min_percentage: f32,
    is_met: bool,
    last_percentage: f32,
    handler: Arc<dyn ThresholdHandler>,
}

impl IdleThresholdCondition {
    /// Creates the condition. `min_percentage` is clamped into `[0, 100]`.
    pub fn new(min_percentage: f32, handler: Arc<dyn ThresholdHandler>) -> Self {
        Self {
            min_percentage: clamp_percentage(min_percentage),
            is_met: false,
            last_percentage: -1.0,
            handler,
        }
    }

    /// The clamped threshold.
    pub fn min_percentage(&self) -> f32 {
        self.min_percentage
    }

    /// Returns `true` while latched met.
    pub fn is_met(&self) -> bool {
        self.is_met
    }

    fn success(&self, cx: &mut ConditionContext<'_>) {
        let handler = self.handler.clone();
        cx.dispatch(move || handler.condition_met());
    }

    fn failure(&self, cx: &mut ConditionContext<'_>) {
        let handler = self.handler.clone();
        cx.dispatch(move || handler.condition_failed());
    }
}

impl Condition for IdleThresholdCondition {
    fn evaluate(&mut self, cx: &mut ConditionContext<'_>, state: ScrollState, percentage: f32) {
        if !self.is_met && state.is_idle() && percentage >= self.min_percentage {
            self.is_met = true;
            self.success(cx);
        } else if self.is_met && percentage < self.min_percentage {
            self.is_met = false;
            self.failure(cx);
        }
        self.last_percentage = percentage;
    }

    fn reset(&mut self, cx: &mut ConditionContext<'_>) {
        if self.is_met && self.last_percentage < self.min_percentage {
            self.is_met = false;
            self.last_percentage = -1.0;
            self.failure(cx);
        }
    }
}

impl fmt::Debug for IdleThresholdCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleThresholdCondition")
            .field("min_percentage", &self.min_percentage)
            .field("is_met", &self.is_met)
            .field("last_percentage", &self.last_percentage)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::harness::{Event, Harness, Recorder};
    use kurbo::Vec2;

    const SCROLLING: ScrollState = ScrollState::Scrolling(Vec2::new(0.0, -10.0));

    #[test]
    fn waits_for_idle_before_success() {
        let recorder = Recorder::new();
        let mut condition = IdleThresholdCondition::new(50.0, recorder.clone());
        let mut h = Harness::default();

        h.evaluate(&mut condition, 0, SCROLLING, 80.0);
        assert!(recorder.take().is_empty(), "scrolling never satisfies the condition");

        h.evaluate(&mut condition, 300, ScrollState::Idle, 80.0);
        assert_eq!(recorder.take(), [Event::Met]);

        h.evaluate(&mut condition, 400, ScrollState::Idle, 90.0);
        assert!(recorder.take().is_empty(), "already met, no repeat");
    }

    #[test]
    fn drop_below_threshold_fails_once() {
        let recorder = Recorder::new();
        let mut condition = IdleThresholdCondition::new(50.0, recorder.clone());
        let mut h = Harness::default();

        h.evaluate(&mut condition, 0, ScrollState::Idle, 60.0);
        h.evaluate(&mut condition, 10, SCROLLING, 20.0);
        h.evaluate(&mut condition, 20, SCROLLING, 10.0);
        assert_eq!(recorder.take(), [Event::Met, Event::Failed]);
        assert!(!condition.is_met());

        // Scrolling back above the threshold needs another idle.
        h.evaluate(&mut condition, 30, SCROLLING, 70.0);
        assert!(recorder.take().is_empty());
        h.evaluate(&mut condition, 330, ScrollState::Idle, 70.0);
        assert_eq!(recorder.take(), [Event::Met]);
    }

    #[test]
    fn reset_fails_only_below_threshold() {
        let recorder = Recorder::new();
        let mut condition = IdleThresholdCondition::new(50.0, recorder.clone());
        let mut h = Harness::default();

        h.evaluate(&mut condition, 0, ScrollState::Idle, 60.0);
        h.reset(&mut condition, 5);
        assert_eq!(recorder.take(), [Event::Met], "still above threshold, reset is silent");
        assert!(condition.is_met());
    }

    #[test]
    fn threshold_is_clamped() {
        let recorder = Recorder::new();
        assert_eq!(IdleThresholdCondition::new(150.0, recorder.clone()).min_percentage(), 100.0);
        assert_eq!(IdleThresholdCondition::new(-1.0, recorder).min_percentage(), 0.0);
    }
}
