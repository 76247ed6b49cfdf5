// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracker tree: structure, geometry, evaluation, timers.

use alloc::boxed::Box;
use alloc::{vec, vec::Vec};
use core::mem;

use hashbrown::HashMap;
use kurbo::{Point, Rect, Vec2};
use smallvec::SmallVec;

use crate::condition::{Condition, ConditionContext, ConditionOwner};
use crate::config::TrackingConfig;
use crate::geometry::{visible_frame, visible_percentage};
use crate::host::{HostTree, MAX_HOST_DEPTH, ancestors};
use crate::listener::{Callback, ViewabilityListener};
use crate::scroll::ScrollDebouncer;
use crate::timer::{TimerId, TimerQueue};
use crate::types::{Element, NodeFlags, NodeId, ScrollState};
use crate::weak::{WeakRef, WeakSet};

/// Work the tracker has deferred to a deadline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum TimerTask {
    /// Debounced idle check of a scrollable node.
    ScrollIdle(NodeId),
    /// A timer armed by one of a node's conditions.
    Condition(ConditionOwner),
}

impl TimerTask {
    fn node(&self) -> NodeId {
        match *self {
            Self::ScrollIdle(node) => node,
            Self::Condition(owner) => owner.node,
        }
    }
}

/// Visibility tracker for a tree of host elements.
///
/// One node per tracked element, linked into a parent/children tree that mirrors the host
/// display hierarchy. Each node clips its frame against its parent's *visible* frame, turns the
/// result into a percentage, and feeds that percentage to its listener and conditions.
///
/// The tracker is single-writer and deterministic: every operation that can fire events takes
/// the current wall-clock time in milliseconds, and delayed work (scroll idle checks, condition
/// confirmations) only runs from [`Tracker::advance`]. Outward events are never delivered
/// inline; they are queued and handed out by [`Tracker::take_callbacks`] so the embedder can run
/// them on the UI thread.
///
/// Operations that need host geometry come in two forms. The direct form takes a
/// [`HostTree`] and is convenient when the tracker lives on the UI thread. The split form
/// ([`Tracker::begin_frame_query`] / [`Tracker::apply_frame`],
/// [`Tracker::needs_parent`] / [`Tracker::attach_to_ancestors`]) lets a worker own the tracker
/// while the host is only queried on the UI thread.
///
/// ## Example
///
/// ```rust
/// use kurbo::Rect;
/// use sightline_core::{HostTree, Tracker, TrackingConfig, WeakRef};
///
/// struct Host;
/// impl HostTree<u32> for Host {
///     fn parent_of(&self, element: u32) -> Option<u32> {
///         (element == 2).then_some(1)
///     }
///     fn frame_in_root(&self, element: u32) -> Option<Rect> {
///         Some(match element {
///             1 => Rect::new(0.0, 0.0, 100.0, 100.0),
///             _ => Rect::new(0.0, 50.0, 100.0, 150.0),
///         })
///     }
/// }
///
/// let mut tracker = Tracker::new(TrackingConfig::enabled());
/// let root = tracker.track(1, WeakRef::empty(), Vec::new(), None, 0).unwrap();
/// tracker.reset_frame(root, &Host, 0);
///
/// let item = tracker.track(2, WeakRef::empty(), Vec::new(), None, 0).unwrap();
/// tracker.attach(item, &Host, 0);
///
/// assert_eq!(tracker.parent_of(item), Some(root));
/// assert_eq!(tracker.last_percentage(item), Some(50.0));
/// ```
pub struct Tracker<E: Element> {
    /// slots
    nodes: Vec<Option<Node<E>>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    by_element: HashMap<E, NodeId>,
    timers: TimerQueue<TimerTask>,
    outbox: Vec<Callback>,
    config: TrackingConfig,
}

impl<E: Element> core::fmt::Debug for Tracker<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        let free = self.free_list.len();
        f.debug_struct("Tracker")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &free)
            .field("pending_timers", &self.timers.len())
            .field("queued_callbacks", &self.outbox.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<E: Element> Default for Tracker<E> {
    fn default() -> Self {
        Self::new(TrackingConfig::default())
    }
}

struct Node<E: Element> {
    generation: u32,
    element: E,
    parent: Option<NodeId>,
    children: WeakSet<NodeId>,
    absolute_frame: Rect,
    visible_frame: Rect,
    last_percentage: f32,
    max_percentage: f32,
    flags: NodeFlags,
    conditions: Vec<Box<dyn Condition>>,
    condition_epoch: u32,
    listener: WeakRef<dyn ViewabilityListener<E>>,
    scroll: Option<ScrollDebouncer>,
}

impl<E: Element> Node<E> {
    fn new(
        generation: u32,
        element: E,
        listener: WeakRef<dyn ViewabilityListener<E>>,
        conditions: Vec<Box<dyn Condition>>,
        scroll: Option<ScrollDebouncer>,
    ) -> Self {
        Self {
            generation,
            element,
            parent: None,
            children: WeakSet::new(),
            absolute_frame: Rect::ZERO,
            visible_frame: Rect::ZERO,
            last_percentage: -1.0,
            max_percentage: -1.0,
            flags: NodeFlags::default(),
            conditions,
            condition_epoch: 0,
            listener,
            scroll,
        }
    }

    fn started_callback(&self) -> Callback {
        let listener = self.listener.clone();
        let element = self.element;
        Callback::new(move || {
            if let Some(listener) = listener.resolve() {
                listener.view_started(element);
            }
        })
    }

    fn ended_callback(&self) -> Callback {
        let listener = self.listener.clone();
        let element = self.element;
        let max_percentage = self.max_percentage.max(0.0);
        Callback::new(move || {
            if let Some(listener) = listener.resolve() {
                listener.view_ended(element, max_percentage);
            }
        })
    }

    fn owner(&self, id: NodeId, slot: usize) -> ConditionOwner {
        ConditionOwner {
            node: id,
            epoch: self.condition_epoch,
            slot,
        }
    }

    fn evaluate_conditions(
        &mut self,
        id: NodeId,
        timers: &mut TimerQueue<TimerTask>,
        outbox: &mut Vec<Callback>,
        now_ms: u64,
        state: ScrollState,
        percentage: f32,
    ) {
        for slot in 0..self.conditions.len() {
            let owner = self.owner(id, slot);
            let mut cx = ConditionContext::new(now_ms, owner, timers, outbox);
            self.conditions[slot].evaluate(&mut cx, state, percentage);
        }
    }
}

fn node_ref<E: Element>(nodes: &[Option<Node<E>>], id: NodeId) -> Option<&Node<E>> {
    nodes
        .get(id.idx())
        .and_then(|n| n.as_ref())
        .filter(|n| n.generation == id.1)
}

fn node_mut<E: Element>(nodes: &mut [Option<Node<E>>], id: NodeId) -> Option<&mut Node<E>> {
    nodes
        .get_mut(id.idx())
        .and_then(|n| n.as_mut())
        .filter(|n| n.generation == id.1)
}

fn should_notify(config: &TrackingConfig, flags: NodeFlags) -> bool {
    config.enabled && (!config.selective_tracking || flags.contains(NodeFlags::SELECTED))
}

impl<E: Element> Tracker<E> {
    /// Create an empty tracker.
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            by_element: HashMap::new(),
            timers: TimerQueue::new(),
            outbox: Vec::new(),
            config,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// Existing scrollable nodes keep their throttle; the idle delay applies to checks armed
    /// from now on.
    pub fn set_config(&mut self, config: TrackingConfig) {
        self.config = config;
    }

    /// Global switch. While off, [`Tracker::track`] is a no-op and nothing notifies.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Restrict notifications to nodes flagged with [`Tracker::set_selected`].
    pub fn set_selective_tracking(&mut self, selective: bool) {
        self.config.selective_tracking = selective;
    }

    /// Drop every node, timer and queued callback. The configuration is kept.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.generations.clear();
        self.free_list.clear();
        self.by_element.clear();
        self.timers.clear();
        self.outbox.clear();
    }

    // --- registration ---

    /// Start tracking `element`, or update the node that already tracks it.
    ///
    /// For an existing node the listener is replaced and the condition list is replaced
    /// wholesale (the old conditions are reset first). A `scroll_offset` makes the node
    /// scrollable if it was not already. New nodes start as unattached roots; see
    /// [`Tracker::attach`].
    ///
    /// Returns `None` while tracking is disabled.
    pub fn track(
        &mut self,
        element: E,
        listener: WeakRef<dyn ViewabilityListener<E>>,
        conditions: Vec<Box<dyn Condition>>,
        scroll_offset: Option<Point>,
        now_ms: u64,
    ) -> Option<NodeId> {
        if !self.config.enabled {
            return None;
        }
        if let Some(id) = self.node_of(element) {
            self.set_listener(id, listener);
            self.set_conditions(id, conditions, now_ms);
            let throttle = self.config.default_throttle;
            if let Some(offset) = scroll_offset
                && let Some(node) = self.node_opt_mut(id)
                && node.scroll.is_none()
            {
                node.scroll = Some(ScrollDebouncer::new(offset, throttle));
            }
            return Some(id);
        }

        let scroll = scroll_offset.map(|o| ScrollDebouncer::new(o, self.config.default_throttle));
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, element, listener, conditions, scroll));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes
                .push(Some(Node::new(generation, element, listener, conditions, scroll)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let id = NodeId::new(idx, generation);
        self.by_element.insert(element, id);
        sdebug!(?element, ?id, "tracking element");
        Some(id)
    }

    /// Replace the listener of a node.
    pub fn set_listener(&mut self, id: NodeId, listener: WeakRef<dyn ViewabilityListener<E>>) {
        if let Some(node) = self.node_opt_mut(id) {
            node.listener = listener;
        }
    }

    /// Replace the condition list of a node.
    ///
    /// The previous conditions are reset first, then every timer they armed is dropped, so no
    /// stale confirmation reaches the new list.
    pub fn set_conditions(&mut self, id: NodeId, conditions: Vec<Box<dyn Condition>>, now_ms: u64) {
        let Self {
            nodes,
            timers,
            outbox,
            ..
        } = self;
        let Some(node) = node_mut(nodes, id) else {
            return;
        };
        for slot in 0..node.conditions.len() {
            let owner = node.owner(id, slot);
            let mut cx = ConditionContext::new(now_ms, owner, timers, outbox);
            node.conditions[slot].reset(&mut cx);
        }
        timers.retain(|task| !matches!(task, TimerTask::Condition(owner) if owner.node == id));
        node.condition_epoch = node.condition_epoch.wrapping_add(1);
        node.conditions = conditions;
    }

    /// Update the minimum observable scroll delta of a scrollable node.
    ///
    /// Returns `false` if the node is gone or not scrollable.
    pub fn set_throttle(&mut self, id: NodeId, throttle: f64) -> bool {
        match self.node_opt_mut(id).and_then(|n| n.scroll.as_mut()) {
            Some(scroll) => {
                scroll.set_throttle(throttle);
                true
            }
            None => false,
        }
    }

    /// Flag a node for selective tracking.
    pub fn set_selected(&mut self, id: NodeId, selected: bool) {
        if let Some(node) = self.node_opt_mut(id) {
            node.flags.set(NodeFlags::SELECTED, selected);
        }
    }

    // --- topology ---

    /// Returns `true` if the node is alive and has no live parent.
    pub fn needs_parent(&self, id: NodeId) -> bool {
        self.node_opt(id)
            .is_some_and(|n| n.parent.is_none_or(|p| !self.is_alive(p)))
    }

    /// Attach a node below its nearest tracked display ancestor.
    ///
    /// Walks the host hierarchy upward from the node's element. A node that already has a live
    /// parent is left alone, and a node with no tracked ancestor stays a root. On success the
    /// node's frame is reset, which evaluates it and its subtree.
    pub fn attach<H: HostTree<E> + ?Sized>(&mut self, id: NodeId, host: &H, now_ms: u64) -> bool {
        let Some(element) = self.element_of(id) else {
            return false;
        };
        if !self.needs_parent(id) {
            return false;
        }
        let chain = ancestors(host, element, MAX_HOST_DEPTH);
        if self.attach_to_ancestors(id, &chain).is_none() {
            return false;
        }
        self.reset_frame(id, host, now_ms);
        true
    }

    /// Link a node below the first element of `ancestors` (nearest first) that has a live node.
    ///
    /// Returns the new parent. No-op if the node already has a live parent, if no ancestor is
    /// tracked, or if linking would create a cycle. Does not touch geometry.
    pub fn attach_to_ancestors(&mut self, id: NodeId, ancestors: &[E]) -> Option<NodeId> {
        if !self.needs_parent(id) {
            return None;
        }
        let parent = ancestors.iter().find_map(|e| self.node_of(*e))?;
        if parent == id || self.is_ancestor(id, parent) {
            sdebug!(?id, ?parent, "refusing to attach: would create a cycle");
            return None;
        }
        // Clear out the stale link left by a discarded parent.
        if let Some(node) = self.node_opt_mut(id) {
            node.parent = None;
        }
        self.sweep_children(parent, None);
        self.link_parent(id, parent);
        sdebug!(?id, ?parent, "attached");
        Some(parent)
    }

    /// Unlink a node from its parent. Its own children stay attached to it.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.node_opt(id).and_then(|n| n.parent) else {
            return false;
        };
        self.sweep_children(parent, Some(id));
        if let Some(node) = self.node_opt_mut(id) {
            node.parent = None;
        }
        sdebug!(?id, ?parent, "detached");
        true
    }

    /// Stop tracking `element`: detach its node, drop its timers, and free the slot.
    ///
    /// The node's id becomes stale. Its children keep a link that now resolves to no parent, so
    /// a later [`Tracker::attach`] can re-parent them.
    pub fn discard(&mut self, element: E) -> bool {
        let Some(id) = self.by_element.remove(&element) else {
            return false;
        };
        if !self.is_alive(id) {
            return false;
        }
        self.detach(id);
        self.timers.retain(|task| task.node() != id);
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
        sdebug!(?element, ?id, "discarded");
        true
    }

    // --- geometry ---

    /// Re-query the node's frame and re-evaluate it and its subtree.
    pub fn reset_frame<H: HostTree<E> + ?Sized>(&mut self, id: NodeId, host: &H, now_ms: u64) {
        self.set_absolute_frame_and_evaluate(id, false, host, now_ms);
    }

    /// Mark visible (if `make_visible`), re-query geometry, evaluate, and recurse into children.
    ///
    /// Nodes that are not visible are skipped together with their subtree. A node whose element
    /// can no longer be resolved is detached.
    pub fn set_absolute_frame_and_evaluate<H: HostTree<E> + ?Sized>(
        &mut self,
        id: NodeId,
        make_visible: bool,
        host: &H,
        now_ms: u64,
    ) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(element) = self.begin_frame_query(id, make_visible) else {
                continue;
            };
            let frame = host.frame_in_root(element);
            let children = self.apply_frame(id, frame, now_ms);
            stack.extend(children.into_iter().rev());
        }
    }

    /// First half of a frame reset: returns the element to query, or `None` to skip the node.
    ///
    /// Marks the node visible when `make_visible` is set. Hidden nodes are skipped.
    pub fn begin_frame_query(&mut self, id: NodeId, make_visible: bool) -> Option<E> {
        let node = self.node_opt_mut(id)?;
        if make_visible {
            node.flags.insert(NodeFlags::VISIBLE);
        }
        node.flags.contains(NodeFlags::VISIBLE).then_some(node.element)
    }

    /// Second half of a frame reset: stores the queried frame and evaluates the node as idle.
    ///
    /// `None` means the element is unresolvable and detaches the node. A node hidden or
    /// discarded since the query is left untouched; visibility is only ever granted by
    /// [`Tracker::begin_frame_query`]. Returns the live children to reset next, in order.
    pub fn apply_frame(
        &mut self,
        id: NodeId,
        frame: Option<Rect>,
        now_ms: u64,
    ) -> SmallVec<[NodeId; 8]> {
        let Some(frame) = frame else {
            if self.is_alive(id) {
                sdebug!(?id, "element unresolvable, detaching");
                self.detach(id);
            }
            return SmallVec::new();
        };
        let Some(node) = self.node_opt_mut(id) else {
            return SmallVec::new();
        };
        if !node.flags.contains(NodeFlags::VISIBLE) {
            return SmallVec::new();
        }
        node.absolute_frame = frame;
        strace!(?id, ?frame, "frame reset");
        self.evaluate_viewability(id, ScrollState::Idle, now_ms);
        self.children_of(id)
    }

    /// Translate a node's absolute frame without querying the host.
    pub fn update_frame(&mut self, id: NodeId, delta: Vec2) {
        if let Some(node) = self.node_opt_mut(id) {
            node.absolute_frame = node.absolute_frame + delta;
        }
    }

    // --- evaluation ---

    /// Recompute the node's visible percentage and notify.
    ///
    /// - The frame is clipped by the parent's visible frame (roots clip against themselves).
    /// - While scrolling, an unchanged percentage is a no-op.
    /// - `max_percentage` only grows.
    /// - Hidden or muted nodes record the percentage and stop there.
    /// - Otherwise `view_started` fires on `last <= 0 && new > 0` and `view_ended` on the
    ///   reverse, and every condition receives `(state, percentage)`.
    pub fn evaluate_viewability(&mut self, id: NodeId, state: ScrollState, now_ms: u64) {
        let Some(node) = self.node_opt(id) else {
            return;
        };
        let clip = node
            .parent
            .and_then(|p| self.node_opt(p))
            .map(|p| p.visible_frame)
            .unwrap_or(node.absolute_frame);

        let config = self.config;
        let Self {
            nodes,
            timers,
            outbox,
            ..
        } = self;
        let Some(node) = node_mut(nodes, id) else {
            return;
        };
        let percentage = visible_percentage(node.absolute_frame, clip);
        node.visible_frame = visible_frame(node.absolute_frame, clip);

        if !state.is_idle() && percentage == node.last_percentage {
            return;
        }
        node.max_percentage = node.max_percentage.max(percentage);

        let notify = should_notify(&config, node.flags);
        if config.selective_tracking
            && node.flags.contains(NodeFlags::SELECTED)
            && percentage != node.last_percentage
        {
            strace!(
                element = ?node.element,
                percentage,
                absolute = ?node.absolute_frame,
                visible = ?node.visible_frame,
                "percentage changed"
            );
        }
        if !notify || !node.flags.contains(NodeFlags::VISIBLE) {
            node.last_percentage = percentage;
            return;
        }

        let last = node.last_percentage;
        if last <= 0.0 && percentage > 0.0 {
            outbox.push(node.started_callback());
        } else if last > 0.0 && percentage <= 0.0 {
            outbox.push(node.ended_callback());
        }
        node.evaluate_conditions(id, timers, outbox, now_ms, state, percentage);
        node.last_percentage = percentage;
    }

    /// Evaluate a node, then its descendants (pre-order).
    pub fn evaluate(&mut self, id: NodeId, state: ScrollState, now_ms: u64) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            self.evaluate_viewability(id, state, now_ms);
            stack.extend(self.children_of(id).into_iter().rev());
        }
    }

    /// Translate a node by `delta`, evaluate it, then do the same for its descendants.
    pub fn update_frame_and_evaluate(
        &mut self,
        id: NodeId,
        state: ScrollState,
        delta: Vec2,
        now_ms: u64,
    ) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            self.update_frame(id, delta);
            self.evaluate_viewability(id, state, now_ms);
            stack.extend(self.children_of(id).into_iter().rev());
        }
    }

    /// Mark a whole subtree as off screen without recomputing geometry.
    ///
    /// Every node loses its visible flag, then gets a forced [`Tracker::handle_view_ended`],
    /// children before their parents.
    pub fn mark_not_visible(&mut self, id: NodeId, now_ms: u64) {
        let mut stack = vec![id];
        let mut order = Vec::new();
        while let Some(id) = stack.pop() {
            let Some(node) = self.node_opt_mut(id) else {
                continue;
            };
            node.flags.remove(NodeFlags::VISIBLE);
            order.push(id);
            stack.extend(self.children_of(id));
        }
        for id in order.into_iter().rev() {
            self.handle_view_ended(id, now_ms);
        }
    }

    /// Force an "exited" transition: the last percentage drops to 0, the listener gets
    /// `view_ended(max)` and the conditions get `(Idle, 0)`.
    pub fn handle_view_ended(&mut self, id: NodeId, now_ms: u64) {
        let config = self.config;
        let Self {
            nodes,
            timers,
            outbox,
            ..
        } = self;
        let Some(node) = node_mut(nodes, id) else {
            return;
        };
        node.last_percentage = 0.0;
        if !should_notify(&config, node.flags) {
            return;
        }
        outbox.push(node.ended_callback());
        node.evaluate_conditions(id, timers, outbox, now_ms, ScrollState::Idle, 0.0);
    }

    /// The application moved to the background: every node ends its view.
    pub fn app_backgrounded(&mut self, now_ms: u64) {
        for id in self.live_ids() {
            self.handle_view_ended(id, now_ms);
        }
    }

    /// The application came back: every node is re-evaluated as idle.
    pub fn app_foregrounded(&mut self, now_ms: u64) {
        for id in self.live_ids() {
            self.evaluate_viewability(id, ScrollState::Idle, now_ms);
        }
    }

    // --- scrolling ---

    /// A scrollable node reported a new content offset.
    ///
    /// Ignored while the node is hidden or when the change is below its throttle. Otherwise the
    /// children are translated and evaluated as scrolling, and the idle check is re-armed.
    /// Returns the applied delta.
    pub fn scroll_offset_changed(
        &mut self,
        id: NodeId,
        offset: Point,
        now_ms: u64,
    ) -> Option<Vec2> {
        let node = self.node_opt_mut(id)?;
        if !node.flags.contains(NodeFlags::VISIBLE) {
            return None;
        }
        let delta = node.scroll.as_mut()?.observe(offset)?;

        let state = ScrollState::Scrolling(delta);
        for child in self.children_of(id) {
            self.update_frame_and_evaluate(child, state, delta, now_ms);
        }

        let deadline = now_ms.saturating_add(self.config.idle_delay_ms);
        let timer = self.timers.schedule(deadline, TimerTask::ScrollIdle(id));
        let stale = self
            .node_opt_mut(id)
            .and_then(|n| n.scroll.as_mut())
            .and_then(|s| s.replace_idle_task(timer));
        if let Some(stale) = stale {
            self.timers.cancel(stale);
        }
        Some(delta)
    }

    // --- timers and output ---

    /// Run every delayed task due at or before `now_ms`, in deadline order.
    ///
    /// Each task observes its own deadline as the current time.
    pub fn advance(&mut self, now_ms: u64) {
        while let Some((timer, deadline, task)) = self.timers.pop_due(now_ms) {
            match task {
                TimerTask::ScrollIdle(id) => self.fire_scroll_idle(id, timer, deadline),
                TimerTask::Condition(owner) => self.fire_condition_timer(owner, timer, deadline),
            }
        }
    }

    fn fire_scroll_idle(&mut self, id: NodeId, timer: TimerId, now_ms: u64) {
        let Some(scroll) = self.node_opt_mut(id).and_then(|n| n.scroll.as_mut()) else {
            return;
        };
        if !scroll.is_idle_task(timer) {
            return;
        }
        scroll.take_idle_task();
        sdebug!(?id, "scroll idle");
        for child in self.children_of(id) {
            self.evaluate(child, ScrollState::Idle, now_ms);
        }
    }

    fn fire_condition_timer(&mut self, owner: ConditionOwner, timer: TimerId, now_ms: u64) {
        let Self {
            nodes,
            timers,
            outbox,
            ..
        } = self;
        let Some(node) = node_mut(nodes, owner.node) else {
            return;
        };
        if node.condition_epoch != owner.epoch {
            return;
        }
        let Some(condition) = node.conditions.get_mut(owner.slot) else {
            return;
        };
        let mut cx = ConditionContext::new(now_ms, owner, timers, outbox);
        condition.on_timer(&mut cx, timer);
    }

    /// The earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Number of pending delayed tasks.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Take the outward callbacks queued so far, in firing order.
    ///
    /// The caller is expected to run them on the UI thread.
    pub fn take_callbacks(&mut self) -> Vec<Callback> {
        mem::take(&mut self.outbox)
    }

    // --- queries ---

    /// Returns `true` if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some()
    }

    /// The live node tracking `element`.
    pub fn node_of(&self, element: E) -> Option<NodeId> {
        self.by_element
            .get(&element)
            .copied()
            .filter(|id| self.is_alive(*id))
    }

    /// The element a node tracks.
    pub fn element_of(&self, id: NodeId) -> Option<E> {
        self.node_opt(id).map(|n| n.element)
    }

    /// The live parent of a node.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.parent.filter(|p| self.is_alive(*p))
    }

    /// Live children of a node, in attach order.
    pub fn children_of(&self, id: NodeId) -> SmallVec<[NodeId; 8]> {
        let Some(node) = self.node_opt(id) else {
            return SmallVec::new();
        };
        node.children
            .iter()
            .filter(|c| self.node_opt(*c).is_some_and(|n| n.parent == Some(id)))
            .collect()
    }

    /// Absolute frame in root coordinates.
    pub fn absolute_frame(&self, id: NodeId) -> Option<Rect> {
        self.node_opt(id).map(|n| n.absolute_frame)
    }

    /// Frame after clipping by the parent's visible frame.
    pub fn visible_frame(&self, id: NodeId) -> Option<Rect> {
        self.node_opt(id).map(|n| n.visible_frame)
    }

    /// Last evaluated percentage; `-1` before the first evaluation.
    pub fn last_percentage(&self, id: NodeId) -> Option<f32> {
        self.node_opt(id).map(|n| n.last_percentage)
    }

    /// Highest percentage the node ever reached; `-1` before the first evaluation.
    pub fn max_percentage(&self, id: NodeId) -> Option<f32> {
        self.node_opt(id).map(|n| n.max_percentage)
    }

    /// Returns `true` if the node is flagged visible.
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.node_opt(id)
            .is_some_and(|n| n.flags.contains(NodeFlags::VISIBLE))
    }

    /// Flags of a node.
    pub fn flags(&self, id: NodeId) -> Option<NodeFlags> {
        self.node_opt(id).map(|n| n.flags)
    }

    /// Returns `true` if the node is scrollable.
    pub fn is_scrollable(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.scroll.is_some())
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.by_element.len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.by_element.is_empty()
    }

    // --- internals ---

    fn node_opt(&self, id: NodeId) -> Option<&Node<E>> {
        node_ref(&self.nodes, id)
    }

    fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node<E>> {
        node_mut(&mut self.nodes, id)
    }

    fn live_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, n)| {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "NodeId uses 32-bit indices."
                )]
                let idx = idx as u32;
                n.as_ref().map(|n| NodeId::new(idx, n.generation))
            })
            .collect()
    }

    /// Returns `true` if `ancestor` is on the parent chain of `id`.
    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = self.parent_of(id);
        let mut steps = 0;
        while let Some(p) = cursor
            && steps <= self.nodes.len()
        {
            if p == ancestor {
                return true;
            }
            cursor = self.parent_of(p);
            steps += 1;
        }
        false
    }

    fn link_parent(&mut self, id: NodeId, parent: NodeId) {
        if let Some(p) = self.node_opt_mut(parent) {
            p.children.insert(id);
        }
        if let Some(node) = self.node_opt_mut(id) {
            node.parent = Some(parent);
        }
    }

    /// Drop `removed` and every stale entry from the children of `parent`.
    fn sweep_children(&mut self, parent: NodeId, removed: Option<NodeId>) -> usize {
        let Some(mut children) = self
            .node_opt_mut(parent)
            .map(|n| mem::take(&mut n.children))
        else {
            return 0;
        };
        let nodes = &self.nodes;
        let dropped = children.sweep(removed, |c| {
            node_ref(nodes, c).is_some_and(|n| n.parent == Some(parent))
        });
        if let Some(p) = self.node_opt_mut(parent) {
            p.children = children;
        }
        dropped
    }
}
