// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Callback forwarding from the tracking worker to the UI thread.
//!
//! The worker holds a [`MainThreadDispatcher`] and sends every outward [`Callback`] through it.
//! The UI thread owns the matching [`MainThreadQueue`] and drains it from its run loop. An
//! optional waker lets the host schedule that drain when callbacks arrive.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use sightline_core::Callback;

use crate::error::QueueError;

/// Creates a connected dispatcher/queue pair.
pub fn main_thread_channel() -> (MainThreadDispatcher, MainThreadQueue) {
    let (sender, receiver) = unbounded();
    (
        MainThreadDispatcher {
            sender,
            waker: None,
        },
        MainThreadQueue { receiver },
    )
}

/// A `Send + Sync` handle that forwards callbacks to the UI thread.
///
/// Cloning is cheap.
#[derive(Clone)]
pub struct MainThreadDispatcher {
    sender: Sender<Callback>,
    waker: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl fmt::Debug for MainThreadDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainThreadDispatcher")
            .field("pending", &self.sender.len())
            .field("has_waker", &self.waker.is_some())
            .finish_non_exhaustive()
    }
}

impl MainThreadDispatcher {
    /// Calls `waker` (on the sending thread) after each batch of callbacks is queued.
    ///
    /// Hosts use it to post a drain of the [`MainThreadQueue`] to their run loop.
    #[must_use]
    pub fn with_waker(mut self, waker: impl Fn() + Send + Sync + 'static) -> Self {
        self.waker = Some(Arc::new(waker));
        self
    }

    /// Queues one callback.
    pub fn dispatch(&self, callback: Callback) -> Result<(), QueueError> {
        self.dispatch_all([callback]).map(|_| ())
    }

    /// Queues callbacks in order and wakes the UI thread once. Returns how many were queued.
    pub fn dispatch_all(
        &self,
        callbacks: impl IntoIterator<Item = Callback>,
    ) -> Result<usize, QueueError> {
        let mut count = 0;
        for callback in callbacks {
            self.sender
                .send(callback)
                .map_err(|_| QueueError::Disconnected)?;
            count += 1;
        }
        if count > 0
            && let Some(waker) = &self.waker
        {
            waker();
        }
        Ok(count)
    }
}

/// The UI-thread side of [`main_thread_channel`].
pub struct MainThreadQueue {
    receiver: Receiver<Callback>,
}

impl fmt::Debug for MainThreadQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainThreadQueue")
            .field("pending", &self.receiver.len())
            .finish()
    }
}

impl MainThreadQueue {
    /// Runs every queued callback, including ones queued while draining. Returns the count.
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        for callback in self.receiver.try_iter() {
            callback.run();
            count += 1;
        }
        count
    }

    /// Waits up to `timeout` for a callback, then drains. Returns the number run.
    pub fn run_timeout(&self, timeout: Duration) -> usize {
        match self.receiver.recv_timeout(timeout) {
            Ok(first) => {
                first.run();
                1 + self.run_pending()
            }
            Err(_) => 0,
        }
    }

    /// Number of callbacks waiting.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if no callback is waiting.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
