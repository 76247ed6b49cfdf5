// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cancellable deadline queue driven by an external clock.
//!
//! Deadlines are absolute wall-clock milliseconds. Nothing fires on its own: the owner polls
//! [`TimerQueue::pop_due`] with the current time, and uses [`TimerQueue::next_deadline`] to know
//! when to come back.

use alloc::collections::BTreeMap;
use hashbrown::HashMap;

/// Handle of a scheduled timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TimerId(u64);

/// A queue of payloads keyed by deadline.
///
/// Timers with equal deadlines fire in scheduling order.
#[derive(Clone, Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    queue: BTreeMap<(u64, TimerId), T>,
    deadlines: HashMap<TimerId, u64>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }
}

impl<T> TimerQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `payload` to become due at `deadline_ms`.
    pub fn schedule(&mut self, deadline_ms: u64, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.queue.insert((deadline_ms, id), payload);
        self.deadlines.insert(id, deadline_ms);
        id
    }

    /// Cancels a pending timer and returns its payload.
    ///
    /// Cancelling a timer that already fired or was already cancelled is a no-op.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let deadline = self.deadlines.remove(&id)?;
        self.queue.remove(&(deadline, id))
    }

    /// Returns `true` if `id` has neither fired nor been cancelled.
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    /// The earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.first_key_value().map(|((deadline, _), _)| *deadline)
    }

    /// Removes and returns the earliest timer due at or before `now_ms`, with its deadline.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(TimerId, u64, T)> {
        let (&(deadline, id), _) = self.queue.first_key_value()?;
        if deadline > now_ms {
            return None;
        }
        let payload = self.queue.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        Some((id, deadline, payload))
    }

    /// Cancels every timer whose payload does not satisfy `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        let deadlines = &mut self.deadlines;
        self.queue.retain(|(_, id), payload| {
            let kept = keep(payload);
            if !kept {
                deadlines.remove(id);
            }
            kept
        });
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if no timer is pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Cancels everything.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_then_schedule_order() {
        let mut timers = TimerQueue::new();
        let late = timers.schedule(300, "late");
        let first = timers.schedule(100, "first");
        let second = timers.schedule(100, "second");
        assert_eq!(timers.next_deadline(), Some(100));

        assert!(timers.pop_due(99).is_none(), "nothing is due before 100");
        assert_eq!(timers.pop_due(100), Some((first, 100, "first")));
        assert_eq!(timers.pop_due(100), Some((second, 100, "second")));
        assert!(timers.pop_due(100).is_none());
        assert_eq!(timers.pop_due(1_000), Some((late, 300, "late")));
        assert!(timers.is_empty());
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut timers = TimerQueue::new();
        let a = timers.schedule(10, 'a');
        let b = timers.schedule(20, 'b');
        assert_eq!(timers.cancel(a), Some('a'));
        assert_eq!(timers.cancel(a), None, "double cancel is a no-op");
        assert!(!timers.is_pending(a));
        assert!(timers.is_pending(b));
        assert_eq!(timers.pop_due(50).map(|(id, _, _)| id), Some(b));
        assert_eq!(timers.cancel(b), None, "cancelling a fired timer is a no-op");
    }

    #[test]
    fn retain_drops_matching_payloads() {
        let mut timers = TimerQueue::new();
        let keep = timers.schedule(5, 1_u32);
        let drop_me = timers.schedule(6, 2_u32);
        timers.retain(|payload| *payload != 2);
        assert!(timers.is_pending(keep));
        assert!(!timers.is_pending(drop_me));
        assert_eq!(timers.len(), 1);
    }
}
