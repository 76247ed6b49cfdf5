// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pluggable viewability conditions.
//!
//! A condition is a small state machine attached to one node. The node feeds it every
//! `(scroll state, percentage)` pair it evaluates, and the condition turns that stream into
//! discrete business events delivered through a handler on the UI thread.
//!
//! Three machines are provided:
//!
//! - [`IdleThresholdCondition`]: met once the nearest scroll view is idle with the element at or
//!   above a percentage; fails when it drops below again.
//! - [`DurationTrackingCondition`]: reports every above-threshold interval with its start, length
//!   and peak percentage, and flags the intervals that lasted long enough. Repeats indefinitely.
//! - [`ViewabilityCondition`]: met when the element stays at or above a percentage for a minimum
//!   duration, checked once when that duration elapses. Latched until the percentage drops.
//!
//! ## Timers and callbacks
//!
//! Conditions never sleep and never call handlers directly. They go through the
//! [`ConditionContext`] handed to every call:
//!
//! - [`ConditionContext::schedule`] arms a timer owned by the condition; when it is due the
//!   tracker calls [`Condition::on_timer`] with the matching [`TimerId`].
//! - [`ConditionContext::dispatch`] queues an outward callback for the UI thread.
//!
//! Timers armed by a condition are dropped when the node's condition list is replaced or the node
//! is discarded, so a stale confirmation never reaches a newer configuration.

mod duration;
mod idle;
mod latched;

pub use duration::DurationTrackingCondition;
pub use idle::IdleThresholdCondition;
pub use latched::ViewabilityCondition;

use alloc::vec::Vec;

use crate::listener::Callback;
use crate::timer::{TimerId, TimerQueue};
use crate::tree::TimerTask;
use crate::types::{NodeId, ScrollState};

/// A state machine driven by a node's percentage stream.
///
/// All methods run on the tracking worker.
pub trait Condition: Send {
    /// Feeds the latest scroll state and visible percentage (in `[0, 100]`).
    fn evaluate(&mut self, cx: &mut ConditionContext<'_>, state: ScrollState, percentage: f32);

    /// Returns to the initial state. Called before the condition is replaced.
    fn reset(&mut self, cx: &mut ConditionContext<'_>);

    /// A timer armed through [`ConditionContext::schedule`] is due.
    ///
    /// [`ConditionContext::now_ms`] reports the timer's deadline.
    fn on_timer(&mut self, cx: &mut ConditionContext<'_>, timer: TimerId) {
        let _ = (cx, timer);
    }
}

/// Identifies the condition a timer belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ConditionOwner {
    pub(crate) node: NodeId,
    pub(crate) epoch: u32,
    pub(crate) slot: usize,
}

/// Capabilities handed to a [`Condition`] for the duration of one call.
pub struct ConditionContext<'a> {
    now_ms: u64,
    owner: ConditionOwner,
    timers: &'a mut TimerQueue<TimerTask>,
    outbox: &'a mut Vec<Callback>,
}

impl<'a> ConditionContext<'a> {
    pub(crate) fn new(
        now_ms: u64,
        owner: ConditionOwner,
        timers: &'a mut TimerQueue<TimerTask>,
        outbox: &'a mut Vec<Callback>,
    ) -> Self {
        Self {
            now_ms,
            owner,
            timers,
            outbox,
        }
    }

    /// Current wall-clock time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Arms a timer that fires `delay_ms` from now.
    pub fn schedule(&mut self, delay_ms: u64) -> TimerId {
        let deadline = self.now_ms.saturating_add(delay_ms);
        self.timers
            .schedule(deadline, TimerTask::Condition(self.owner))
    }

    /// Cancels a timer armed by this condition. Unknown or fired timers are ignored.
    pub fn cancel(&mut self, timer: TimerId) {
        self.timers.cancel(timer);
    }

    /// Queues `f` to run on the UI thread.
    pub fn dispatch(&mut self, f: impl FnOnce() + Send + 'static) {
        self.outbox.push(Callback::new(f));
    }
}

impl core::fmt::Debug for ConditionContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConditionContext")
            .field("now_ms", &self.now_ms)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Handler for the threshold conditions ([`IdleThresholdCondition`] and
/// [`ViewabilityCondition`]).
///
/// Both methods are required; there is no silent default. Called on the UI thread.
pub trait ThresholdHandler: Send + Sync {
    /// The condition became satisfied.
    fn condition_met(&self);

    /// The condition stopped being satisfied after a previous success.
    fn condition_failed(&self);
}

/// One continuous interval during which an element stayed at or above a threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisibleInterval {
    /// Wall-clock start of the interval, in milliseconds.
    pub start_ms: u64,
    /// Length of the interval, in milliseconds.
    pub duration_ms: u64,
    /// Highest percentage observed during the interval.
    pub max_percentage: f32,
}

/// Handler for [`DurationTrackingCondition`].
///
/// All methods are required. Called on the UI thread.
pub trait TrackingHandler: Send + Sync {
    /// The element reached the threshold.
    fn viewability_started(&self);

    /// The element dropped below the threshold, closing `interval`.
    fn viewability_ended(&self, interval: VisibleInterval);

    /// A closed interval lasted at least the minimum duration.
    ///
    /// Delivered before the matching [`TrackingHandler::viewability_ended`].
    fn condition_met(&self, interval: VisibleInterval);
}

#[cfg(test)]
pub(crate) mod harness {
    //! Drives a single condition without a tree.

    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use std::sync::Mutex;

    use super::*;

    /// Events recorded by [`Recorder`].
    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum Event {
        Met,
        Failed,
        Started,
        Ended(VisibleInterval),
        MetInterval(VisibleInterval),
    }

    #[derive(Debug, Default)]
    pub(crate) struct Recorder(Mutex<Vec<Event>>);

    impl Recorder {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn push(&self, event: Event) {
            self.0.lock().expect("recorder lock").push(event);
        }

        pub(crate) fn take(&self) -> Vec<Event> {
            core::mem::take(&mut *self.0.lock().expect("recorder lock"))
        }
    }

    impl ThresholdHandler for Recorder {
        fn condition_met(&self) {
            self.push(Event::Met);
        }

        fn condition_failed(&self) {
            self.push(Event::Failed);
        }
    }

    impl TrackingHandler for Recorder {
        fn viewability_started(&self) {
            self.push(Event::Started);
        }

        fn viewability_ended(&self, interval: VisibleInterval) {
            self.push(Event::Ended(interval));
        }

        fn condition_met(&self, interval: VisibleInterval) {
            self.push(Event::MetInterval(interval));
        }
    }

    const OWNER: ConditionOwner = ConditionOwner {
        node: NodeId::new(0, 0),
        epoch: 0,
        slot: 0,
    };

    #[derive(Default)]
    pub(crate) struct Harness {
        timers: TimerQueue<TimerTask>,
        outbox: Vec<Callback>,
    }

    impl Harness {
        pub(crate) fn evaluate(
            &mut self,
            condition: &mut dyn Condition,
            now_ms: u64,
            state: ScrollState,
            percentage: f32,
        ) {
            self.advance(condition, now_ms);
            let mut cx = ConditionContext::new(now_ms, OWNER, &mut self.timers, &mut self.outbox);
            condition.evaluate(&mut cx, state, percentage);
            self.deliver();
        }

        pub(crate) fn reset(&mut self, condition: &mut dyn Condition, now_ms: u64) {
            self.advance(condition, now_ms);
            let mut cx = ConditionContext::new(now_ms, OWNER, &mut self.timers, &mut self.outbox);
            condition.reset(&mut cx);
            self.deliver();
        }

        /// Fires every timer due at or before `now_ms`.
        pub(crate) fn advance(&mut self, condition: &mut dyn Condition, now_ms: u64) {
            while let Some((id, deadline, _)) = self.timers.pop_due(now_ms) {
                let mut cx =
                    ConditionContext::new(deadline, OWNER, &mut self.timers, &mut self.outbox);
                condition.on_timer(&mut cx, id);
            }
            self.deliver();
        }

        pub(crate) fn pending_timers(&self) -> usize {
            self.timers.len()
        }

        fn deliver(&mut self) {
            for callback in self.outbox.drain(..) {
                callback.run();
            }
        }
    }
}
