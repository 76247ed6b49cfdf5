// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The host-facing tracking facade.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use kurbo::{Point, Rect};
use sightline_core::condition::Condition;
use sightline_core::{
    Callback, Element, GeometryChange, HostTree, MAX_HOST_DEPTH, NodeId, Tracker,
    ViewabilityListener, WeakRef, ancestors,
};
use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::error::QueueError;
use crate::main_thread::{MainThreadDispatcher, MainThreadQueue};
use crate::queue::{QueueHandle, TaskHandle, WorkQueue};

/// Wall-clock milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Worker-side state: the tracker plus what it needs to reach the UI thread.
struct Engine<E: Element, H> {
    tracker: Tracker<E>,
    host: Arc<H>,
    dispatcher: MainThreadDispatcher,
    queue: QueueHandle<Engine<E, H>>,
    /// Deadline the timer pump is armed for.
    pump: Option<(u64, TaskHandle)>,
}

impl<E: Element, H: HostTree<E> + Send + Sync + 'static> Engine<E, H> {
    /// Runs due timers, forwards queued callbacks, and re-arms the timer pump.
    fn finish(&mut self) {
        self.tracker.advance(now_ms());
        let callbacks = self.tracker.take_callbacks();
        if let Err(err) = self.dispatcher.dispatch_all(callbacks) {
            warn!(error = %err, "dropping outward callbacks");
        }
        self.rearm();
    }

    fn rearm(&mut self) {
        let next = self.tracker.next_deadline();
        if let Some((armed, _)) = &self.pump
            && Some(*armed) == next
        {
            return;
        }
        if let Some((_, task)) = self.pump.take() {
            task.cancel();
        }
        let Some(deadline) = next else {
            return;
        };
        let delay = deadline.saturating_sub(now_ms()).saturating_add(1);
        let task = self
            .queue
            .schedule_after(Duration::from_millis(delay), |engine| {
                engine.pump = None;
                engine.finish();
            });
        self.pump = Some((deadline, task));
    }

    /// Re-queries the frames of `ids` and their visible subtrees, one tree level per hop.
    ///
    /// Frames are read on the UI thread and applied back here, so a parent's visible frame is
    /// always in place before its children are clipped against it.
    fn refresh(&mut self, ids: impl IntoIterator<Item = NodeId>, make_visible: bool) {
        let batch: Vec<(NodeId, E)> = ids
            .into_iter()
            .filter_map(|id| {
                self.tracker
                    .begin_frame_query(id, make_visible)
                    .map(|element| (id, element))
            })
            .collect();
        if batch.is_empty() {
            return;
        }
        let host = Arc::clone(&self.host);
        let queue = self.queue.clone();
        let query = Callback::new(move || {
            let frames: Vec<(NodeId, Option<Rect>)> = batch
                .into_iter()
                .map(|(id, element)| (id, host.frame_in_root(element)))
                .collect();
            let applied = queue.dispatch(move |engine| {
                engine.apply_frames(frames, make_visible);
                engine.finish();
            });
            if let Err(err) = applied {
                warn!(error = %err, "dropping frame update");
            }
        });
        if let Err(err) = self.dispatcher.dispatch(query) {
            warn!(error = %err, "dropping frame query");
        }
    }

    fn apply_frames(&mut self, frames: Vec<(NodeId, Option<Rect>)>, make_visible: bool) {
        let now = now_ms();
        let mut next = Vec::new();
        for (id, frame) in frames {
            next.extend(self.tracker.apply_frame(id, frame, now));
        }
        self.refresh(next, make_visible);
    }
}

/// Visibility tracking for a host UI.
///
/// Every method is meant to be called on the UI thread. Host reads happen right there; the
/// tracker itself lives on a dedicated worker, and everything it reports comes back through the
/// [`MainThreadDispatcher`] given at construction. Frame reads that the worker needs later
/// (after a show, a geometry change, or an attach) are posted to the UI thread the same way.
///
/// Signals are fire-and-forget: if the worker is gone they are logged and dropped. The
/// exceptions are [`Tracking::element_destroyed`], which waits so that nothing outlives the
/// element, and the [`Tracking::flush`] family.
pub struct Tracking<E: Element, H: HostTree<E> + Send + Sync + 'static> {
    queue: WorkQueue<Engine<E, H>>,
    host: Arc<H>,
}

impl<E: Element, H: HostTree<E> + Send + Sync + 'static> fmt::Debug for Tracking<E, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracking")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<E: Element, H: HostTree<E> + Send + Sync + 'static> Tracking<E, H> {
    /// Starts the tracking worker.
    pub fn new(
        config: RuntimeConfig,
        host: Arc<H>,
        dispatcher: MainThreadDispatcher,
    ) -> Result<Self, QueueError> {
        let engine_host = Arc::clone(&host);
        let tracking = config.tracking;
        let queue = WorkQueue::spawn(&config.queue_name, move |queue| Engine {
            tracker: Tracker::new(tracking),
            host: engine_host,
            dispatcher,
            queue: queue.clone(),
            pump: None,
        })?;
        Ok(Self { queue, host })
    }

    fn submit(&self, job: impl FnOnce(&mut Engine<E, H>) + Send + 'static) {
        let result = self.queue.dispatch(move |engine| {
            job(engine);
            engine.finish();
        });
        if let Err(err) = result {
            warn!(error = %err, "dropping tracking signal");
        }
    }

    // --- configuration ---

    /// Global switch. While off, [`Tracking::track`] has no effect and nothing notifies.
    pub fn set_enabled(&self, enabled: bool) {
        self.submit(move |engine| engine.tracker.set_enabled(enabled));
    }

    /// Restrict notifications to elements flagged with [`Tracking::set_selected`].
    pub fn set_selective_tracking(&self, selective: bool) {
        self.submit(move |engine| engine.tracker.set_selective_tracking(selective));
    }

    /// Flag an element for selective tracking.
    pub fn set_selected(&self, element: E, selected: bool) {
        self.submit(move |engine| {
            if let Some(id) = engine.tracker.node_of(element) {
                engine.tracker.set_selected(id, selected);
            }
        });
    }

    /// Drop every node and pending task. The configuration is kept.
    pub fn reset(&self) {
        self.submit(|engine| engine.tracker.reset());
    }

    // --- registration ---

    /// Start tracking `element`, or replace the listener and conditions of a tracked one.
    ///
    /// Elements the host reports a scroll offset for are tracked as scroll views. The node is
    /// attached below its nearest tracked display ancestor, then its frame is read.
    pub fn track(
        &self,
        element: E,
        listener: WeakRef<dyn ViewabilityListener<E>>,
        conditions: Vec<Box<dyn Condition>>,
    ) {
        let scroll_offset = self.host.scroll_offset(element);
        let chain = ancestors(&*self.host, element, MAX_HOST_DEPTH);
        self.submit(move |engine| {
            let now = now_ms();
            let Some(id) = engine
                .tracker
                .track(element, listener, conditions, scroll_offset, now)
            else {
                return;
            };
            engine.tracker.attach_to_ancestors(id, &chain);
            engine.refresh([id], false);
        });
    }

    /// Set the minimum observable scroll delta of a tracked scroll view.
    pub fn set_throttle(&self, element: E, throttle: f64) {
        self.submit(move |engine| {
            if let Some(id) = engine.tracker.node_of(element) {
                engine.tracker.set_throttle(id, throttle);
            }
        });
    }

    // --- host signals ---

    /// `element` joined a display hierarchy.
    pub fn element_added(&self, element: E) {
        let chain = ancestors(&*self.host, element, MAX_HOST_DEPTH);
        self.submit(move |engine| {
            let Some(id) = engine.tracker.node_of(element) else {
                return;
            };
            engine.tracker.attach_to_ancestors(id, &chain);
            engine.refresh([id], false);
        });
    }

    /// `element` left its display parent.
    pub fn element_removed(&self, element: E) {
        self.submit(move |engine| {
            if let Some(id) = engine.tracker.node_of(element) {
                engine.tracker.detach(id);
            }
        });
    }

    /// `element` is being destroyed. Waits until its node is gone.
    ///
    /// Returns `true` if the element was tracked.
    pub fn element_destroyed(&self, element: E) -> bool {
        let result = self.queue.sync(move |engine| {
            let discarded = engine.tracker.discard(element);
            engine.finish();
            discarded
        });
        match result {
            Ok(discarded) => {
                if discarded {
                    debug!(?element, "element destroyed");
                }
                discarded
            }
            Err(err) => {
                warn!(error = %err, ?element, "could not discard element");
                false
            }
        }
    }

    /// `element` became visible again. Its subtree's frames are re-read.
    pub fn element_shown(&self, element: E) {
        self.submit(move |engine| {
            if let Some(id) = engine.tracker.node_of(element) {
                engine.refresh([id], true);
            }
        });
    }

    /// `element` is about to be hidden. Its whole subtree ends its view.
    pub fn element_hidden(&self, element: E) {
        self.submit(move |engine| {
            if let Some(id) = engine.tracker.node_of(element) {
                engine.tracker.mark_not_visible(id, now_ms());
            }
        });
    }

    /// The application is active again.
    pub fn app_foregrounded(&self) {
        self.submit(|engine| engine.tracker.app_foregrounded(now_ms()));
    }

    /// The application is moving to the background.
    pub fn app_backgrounded(&self) {
        self.submit(|engine| engine.tracker.app_backgrounded(now_ms()));
    }

    /// A tracked scroll view reported a new content offset.
    pub fn scroll_offset_changed(&self, element: E, offset: Point) {
        self.submit(move |engine| {
            if let Some(id) = engine.tracker.node_of(element) {
                engine.tracker.scroll_offset_changed(id, offset, now_ms());
            }
        });
    }

    /// The host moved or resized `element`. Changes that keep the frame are ignored.
    pub fn geometry_changed(&self, element: E, change: GeometryChange) {
        if !change.affects_frame() {
            return;
        }
        self.submit(move |engine| {
            if let Some(id) = engine.tracker.node_of(element) {
                engine.refresh([id], false);
            }
        });
    }

    // --- synchronization ---

    /// Blocks until every signal sent so far has been processed by the worker.
    ///
    /// Frame reads posted to the UI thread meanwhile are not run; see [`Tracking::settle`].
    pub fn flush(&self) -> Result<(), QueueError> {
        self.queue.sync(|_| ())
    }

    /// Alternates [`Tracking::flush`] with draining `ui` until neither side has work left.
    ///
    /// Must be called on the thread that owns `ui`. Delayed work (scroll idle checks, condition
    /// confirmations) that is not yet due is left pending.
    pub fn settle(&self, ui: &MainThreadQueue) -> Result<(), QueueError> {
        loop {
            self.flush()?;
            if ui.run_pending() == 0 {
                return Ok(());
            }
        }
    }

    /// Runs `f` against the tracker on the worker and returns its result.
    pub fn inspect<R: Send + 'static>(
        &self,
        f: impl FnOnce(&Tracker<E>) -> R + Send + 'static,
    ) -> Result<R, QueueError> {
        self.queue.sync(move |engine| f(&engine.tracker))
    }
}
