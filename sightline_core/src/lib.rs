// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sightline Core: deterministic visibility tracking for trees of on-screen elements.
//!
//! Sightline answers "how much of this element can the viewer see right now?" for every tracked
//! element of a host UI, and turns the answers into lifecycle and business events:
//!
//! - entered viewport / exited viewport, through a [`ViewabilityListener`];
//! - "at least P% visible once scrolling settles", through [`condition::IdleThresholdCondition`];
//! - "at least P% visible for at least D ms", latched, through [`condition::ViewabilityCondition`];
//! - every above-threshold interval with its duration and peak, through
//!   [`condition::DurationTrackingCondition`].
//!
//! ## Model
//!
//! A [`Tracker`] holds one node per tracked element, linked into a tree that mirrors the host
//! display hierarchy. Each node stores its frame in a shared root coordinate space and clips it
//! against its parent's already clipped *visible frame*, so nested scroll views compose without
//! walking ancestor chains. Only axis-aligned rectangle intersection is modeled.
//!
//! Scrollable nodes debounce their content offset: observable changes translate the subtree and
//! evaluate it as [`ScrollState::Scrolling`], and a single [`ScrollState::Idle`] evaluation follows
//! once no change has been seen for [`TrackingConfig::idle_delay_ms`] (300 ms by default).
//!
//! ## Determinism
//!
//! Nothing in this crate reads a clock, spawns a thread, or calls back into the host on its own:
//!
//! - operations that can fire events take the current wall-clock time in milliseconds;
//! - delayed work only runs from [`Tracker::advance`];
//! - outward events are queued as [`Callback`]s and handed out by [`Tracker::take_callbacks`];
//! - host geometry is read through the [`HostTree`] trait, with split variants of every
//!   host-dependent operation for embedders that keep the tracker off the UI thread.
//!
//! The `sightline_runtime` crate provides that embedding: a serial worker thread that owns the
//! tracker, and a dispatcher that runs callbacks on the UI thread.
//!
//! ## API overview
//!
//! - [`Tracker`]: the tree, geometry, evaluation and timers.
//! - [`NodeId`]: generational handle of a node. [`NodeFlags`]: visibility and selection.
//! - [`condition`]: the [`Condition`](condition::Condition) trait and the three provided machines.
//! - [`WeakRef`] / [`WeakSet`]: weak holders that never keep their referents alive.
//! - [`TimerQueue`]: the cancellable deadline queue behind every delayed task.
//! - [`visible_percentage`] / [`visible_frame`]: the clipping geometry.
//!
//! ## Features
//!
//! - `std` (default): enables `std` in Kurbo.
//! - `libm`: `no_std` float math through Kurbo's `libm` feature.
//! - `tracing`: emits `tracing` events under the `sightline` target for structural changes,
//!   frame resets, scroll idles, and (with selective tracking) percentage changes.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

pub mod condition;
mod config;
mod geometry;
mod host;
mod listener;
mod scroll;
mod timer;
mod tree;
mod types;
mod weak;

pub use config::{DEFAULT_IDLE_DELAY_MS, DEFAULT_THROTTLE, TrackingConfig};
pub use geometry::{clamp_percentage, visible_frame, visible_percentage};
pub use host::{HostTree, MAX_HOST_DEPTH, ancestors};
pub use listener::{Callback, ViewabilityListener};
pub use scroll::ScrollDebouncer;
pub use timer::{TimerId, TimerQueue};
pub use tree::Tracker;
pub use types::{Element, GeometryChange, NodeFlags, NodeId, ScrollState};
pub use weak::{WeakRef, WeakSet};
