// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sightline Runtime: threading and host integration for [`sightline_core`].
//!
//! The core tracker is single-writer and never touches threads or clocks. This crate supplies
//! the missing pieces:
//!
//! - [`WorkQueue`]: one named worker thread that owns the tracker and runs jobs serially, with
//!   immediate on-worker dispatch, a blocking `sync`, and cancellable delayed jobs.
//! - [`MainThreadDispatcher`] / [`MainThreadQueue`]: the channel that carries every outward
//!   callback (listener and condition handler calls, host frame reads) to the UI thread.
//! - [`Tracking`]: the facade the host framework calls from its UI thread, one method per
//!   lifecycle signal.
//!
//! ## Threads
//!
//! ```text
//!  UI thread                         tracking worker
//!  ---------                         ---------------
//!  Tracking::track / element_* ───►  Tracker: attach, geometry, conditions
//!  MainThreadQueue::run_pending ◄──  view_started / view_ended / handler calls
//!  HostTree::frame_in_root     ◄──►  frame reads, one tree level per round trip
//! ```
//!
//! The host is only read on the UI thread. The worker wakes on its own for scroll idle checks
//! and condition confirmations, using wall-clock time.
//!
//! ## Errors and logging
//!
//! Fire-and-forget signals log a `tracing` warning and carry on when the worker is gone.
//! Blocking calls return [`QueueError`]. No subscriber is installed by this crate.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use kurbo::Rect;
//! use sightline_core::{HostTree, ViewabilityListener, WeakRef};
//! use sightline_runtime::{RuntimeConfig, Tracking, main_thread_channel};
//!
//! struct Host;
//! impl HostTree<u32> for Host {
//!     fn parent_of(&self, _: u32) -> Option<u32> {
//!         None
//!     }
//!     fn frame_in_root(&self, _: u32) -> Option<Rect> {
//!         Some(Rect::new(0.0, 0.0, 10.0, 10.0))
//!     }
//! }
//!
//! struct Print;
//! impl ViewabilityListener<u32> for Print {
//!     fn view_started(&self, element: u32) {
//!         println!("{element} entered");
//!     }
//!     fn view_ended(&self, element: u32, max_percentage: f32) {
//!         println!("{element} left, peak {max_percentage}%");
//!     }
//! }
//!
//! let (dispatcher, ui) = main_thread_channel();
//! let tracking = Tracking::new(RuntimeConfig::enabled(), Arc::new(Host), dispatcher).unwrap();
//!
//! let listener: Arc<dyn ViewabilityListener<u32>> = Arc::new(Print);
//! tracking.track(7, WeakRef::new(&listener), Vec::new());
//!
//! // On the UI thread, from the run loop:
//! tracking.settle(&ui).unwrap();
//! ```

mod config;
mod error;
mod main_thread;
mod queue;
mod tracking;

pub use config::{DEFAULT_QUEUE_NAME, RuntimeConfig};
pub use error::QueueError;
pub use main_thread::{MainThreadDispatcher, MainThreadQueue, main_thread_channel};
pub use queue::{QueueHandle, TaskHandle, WorkQueue};
pub use tracking::Tracking;
