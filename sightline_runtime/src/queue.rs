// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Serial work queue.
//!
//! A [`WorkQueue`] owns one worker thread and the state `S` that thread works on. Jobs are
//! closures over `&mut S` and run strictly one after another, so the state needs no locking.
//!
//! - [`QueueHandle::dispatch`] enqueues from any thread. Called from the worker itself, the job
//!   runs right after the current one returns, ahead of everything already queued.
//! - [`QueueHandle::dispatch_with`] takes the state the caller is holding. On the worker the job
//!   runs synchronously and immediately; anywhere else it is enqueued like `dispatch`.
//! - [`QueueHandle::sync`] blocks until the job has run and returns its result.
//! - [`QueueHandle::schedule_after`] runs a job once a delay has elapsed, unless its
//!   [`TaskHandle`] is cancelled first.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::QueueError;

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Job<S>),
    RunAt {
        deadline: Instant,
        task: TaskHandle,
        job: Job<S>,
    },
    Shutdown,
}

struct Shared<S> {
    worker: OnceLock<ThreadId>,
    /// Jobs dispatched from the worker itself.
    inline: Mutex<VecDeque<Job<S>>>,
}

/// Cancellation handle for a job armed with [`QueueHandle::schedule_after`].
#[derive(Clone, Debug, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Prevents the job from running. Has no effect once it ran.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once [`TaskHandle::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Cloneable entry point to a [`WorkQueue`].
pub struct QueueHandle<S> {
    sender: Sender<Message<S>>,
    shared: Arc<Shared<S>>,
}

impl<S> Clone for QueueHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> fmt::Debug for QueueHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueHandle")
            .field("worker", &self.shared.worker.get())
            .field("queued", &self.sender.len())
            .finish_non_exhaustive()
    }
}

impl<S> QueueHandle<S> {
    /// Returns `true` when called on the queue's worker thread.
    pub fn is_current(&self) -> bool {
        self.shared
            .worker
            .get()
            .is_some_and(|worker| *worker == thread::current().id())
    }
}

impl<S: 'static> QueueHandle<S> {
    /// Runs `job` on the worker without waiting for it.
    pub fn dispatch(&self, job: impl FnOnce(&mut S) + Send + 'static) -> Result<(), QueueError> {
        if self.is_current() {
            self.shared.inline.lock().push_back(Box::new(job));
            return Ok(());
        }
        self.sender
            .send(Message::Run(Box::new(job)))
            .map_err(|_| QueueError::Disconnected)
    }

    /// Runs `job` now if called on the worker, otherwise enqueues it.
    ///
    /// `state` is the state the calling job was handed. It is only touched on the worker, so
    /// nested work keeps its place in the caller's sequence instead of waiting for it to return.
    pub fn dispatch_with(
        &self,
        state: &mut S,
        job: impl FnOnce(&mut S) + Send + 'static,
    ) -> Result<(), QueueError> {
        if self.is_current() {
            job(state);
            return Ok(());
        }
        self.sender
            .send(Message::Run(Box::new(job)))
            .map_err(|_| QueueError::Disconnected)
    }

    /// Runs `job` on the worker and waits for its result.
    ///
    /// Fails with [`QueueError::Reentrant`] on the worker thread, where waiting would never end.
    pub fn sync<R: Send + 'static>(
        &self,
        job: impl FnOnce(&mut S) -> R + Send + 'static,
    ) -> Result<R, QueueError> {
        if self.is_current() {
            return Err(QueueError::Reentrant);
        }
        let (tx, rx) = bounded(1);
        self.sender
            .send(Message::Run(Box::new(move |state| {
                let _ = tx.send(job(state));
            })))
            .map_err(|_| QueueError::Disconnected)?;
        rx.recv().map_err(|_| QueueError::Disconnected)
    }

    /// Runs `job` on the worker once `delay` has elapsed.
    ///
    /// The returned handle comes back already cancelled if the queue has shut down.
    pub fn schedule_after(
        &self,
        delay: Duration,
        job: impl FnOnce(&mut S) + Send + 'static,
    ) -> TaskHandle {
        let task = TaskHandle::default();
        let Some(deadline) = Instant::now().checked_add(delay) else {
            debug!(?delay, "delay out of range, task dropped");
            task.cancel();
            return task;
        };
        let message = Message::RunAt {
            deadline,
            task: task.clone(),
            job: Box::new(job),
        };
        if self.sender.send(message).is_err() {
            task.cancel();
        }
        task
    }
}

/// A serial queue backed by one named worker thread.
///
/// Dropping the queue lets already queued jobs finish, drops pending delayed jobs, and joins
/// the worker.
pub struct WorkQueue<S> {
    handle: QueueHandle<S>,
    worker: Option<JoinHandle<()>>,
    name: String,
}

impl<S> fmt::Debug for WorkQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl<S: 'static> WorkQueue<S> {
    /// Starts the worker thread. `init` builds the state on the worker.
    pub fn spawn(
        name: &str,
        init: impl FnOnce(&QueueHandle<S>) -> S + Send + 'static,
    ) -> Result<Self, QueueError> {
        let (sender, receiver) = unbounded();
        let handle = QueueHandle {
            sender,
            shared: Arc::new(Shared {
                worker: OnceLock::new(),
                inline: Mutex::new(VecDeque::new()),
            }),
        };
        let own = handle.clone();
        let worker = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let _ = own.shared.worker.set(thread::current().id());
                let state = init(&own);
                let QueueHandle { shared, .. } = own;
                run(state, &receiver, &shared);
            })?;
        debug!(queue = name, "worker started");
        Ok(Self {
            handle,
            worker: Some(worker),
            name: name.to_owned(),
        })
    }

    /// A cloneable handle to this queue.
    pub fn handle(&self) -> &QueueHandle<S> {
        &self.handle
    }

    /// The worker thread's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// See [`QueueHandle::is_current`].
    pub fn is_current(&self) -> bool {
        self.handle.is_current()
    }

    /// See [`QueueHandle::dispatch`].
    pub fn dispatch(&self, job: impl FnOnce(&mut S) + Send + 'static) -> Result<(), QueueError> {
        self.handle.dispatch(job)
    }

    /// See [`QueueHandle::dispatch_with`].
    pub fn dispatch_with(
        &self,
        state: &mut S,
        job: impl FnOnce(&mut S) + Send + 'static,
    ) -> Result<(), QueueError> {
        self.handle.dispatch_with(state, job)
    }

    /// See [`QueueHandle::sync`].
    pub fn sync<R: Send + 'static>(
        &self,
        job: impl FnOnce(&mut S) -> R + Send + 'static,
    ) -> Result<R, QueueError> {
        self.handle.sync(job)
    }

    /// See [`QueueHandle::schedule_after`].
    pub fn schedule_after(
        &self,
        delay: Duration,
        job: impl FnOnce(&mut S) + Send + 'static,
    ) -> TaskHandle {
        self.handle.schedule_after(delay, job)
    }
}

impl<S> Drop for WorkQueue<S> {
    fn drop(&mut self) {
        let _ = self.handle.sender.send(Message::Shutdown);
        if let Some(worker) = self.worker.take()
            && !self.handle.is_current()
            && worker.join().is_err()
        {
            warn!(queue = %self.name, "worker panicked");
        }
    }
}

fn run<S>(mut state: S, receiver: &Receiver<Message<S>>, shared: &Shared<S>) {
    let mut delayed: BTreeMap<(Instant, u64), (TaskHandle, Job<S>)> = BTreeMap::new();
    let mut seq = 0_u64;
    loop {
        let now = Instant::now();
        while let Some(entry) = delayed.first_entry()
            && entry.key().0 <= now
        {
            let (task, job) = entry.remove();
            if !task.is_cancelled() {
                run_job(&mut state, shared, job);
            }
        }

        let next = match delayed.first_key_value() {
            Some((&(deadline, _), _)) => match receiver.recv_deadline(deadline) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match receiver.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };
        match next {
            Message::Run(job) => run_job(&mut state, shared, job),
            Message::RunAt {
                deadline,
                task,
                job,
            } => {
                delayed.retain(|_, (pending, _)| !pending.is_cancelled());
                delayed.insert((deadline, seq), (task, job));
                seq = seq.wrapping_add(1);
            }
            Message::Shutdown => break,
        }
    }
    debug!(dropped = delayed.len(), "worker stopped");
}

fn run_job<S>(state: &mut S, shared: &Shared<S>, job: Job<S>) {
    job(state);
    loop {
        let next = shared.inline.lock().pop_front();
        let Some(next) = next else {
            break;
        };
        next(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_queue() -> WorkQueue<Vec<u32>> {
        WorkQueue::spawn("sightline.test", |_| Vec::new()).expect("spawn worker")
    }

    #[test]
    fn jobs_run_in_order_on_the_named_worker() {
        let queue = log_queue();
        for i in 0..10 {
            queue.dispatch(move |log| log.push(i)).expect("queue alive");
        }
        let log = queue.sync(|log| log.clone()).expect("queue alive");
        assert_eq!(log, (0..10).collect::<Vec<_>>(), "serial order");

        let name = queue
            .sync(|_| thread::current().name().map(str::to_owned))
            .expect("queue alive");
        assert_eq!(name.as_deref(), Some("sightline.test"));
        assert!(!queue.is_current(), "the test thread is not the worker");
        assert!(
            queue
                .sync({
                    let handle = queue.handle().clone();
                    move |_| handle.is_current()
                })
                .expect("queue alive"),
            "jobs run on the worker"
        );
    }

    #[test]
    fn dispatch_from_the_worker_runs_next() {
        let queue = log_queue();
        let handle = queue.handle().clone();
        queue
            .dispatch(move |log| {
                log.push(1);
                handle.dispatch(|log| log.push(3)).expect("queue alive");
                log.push(2);
            })
            .expect("queue alive");
        queue.dispatch(|log| log.push(4)).expect("queue alive");
        let log = queue.sync(|log| log.clone()).expect("queue alive");
        assert_eq!(log, [1, 2, 3, 4], "inline job runs after its parent, before queued work");
    }

    #[test]
    fn dispatch_with_state_on_the_worker_runs_immediately() {
        let queue = log_queue();
        let handle = queue.handle().clone();
        queue
            .dispatch(move |log| {
                log.push(1);
                handle
                    .dispatch_with(log, |log| log.push(2))
                    .expect("queue alive");
                log.push(3);
            })
            .expect("queue alive");
        let log = queue.sync(|log| log.clone()).expect("queue alive");
        assert_eq!(log, [1, 2, 3], "nested job runs in place");
    }

    #[test]
    fn dispatch_with_state_off_the_worker_enqueues() {
        let queue = log_queue();
        let mut local = vec![9];
        queue
            .dispatch_with(&mut local, |log| log.push(1))
            .expect("queue alive");
        let log = queue.sync(|log| log.clone()).expect("queue alive");
        assert_eq!(log, [1], "ran on the worker's state");
        assert_eq!(local, [9], "the caller's copy is untouched");
    }

    #[test]
    fn sync_on_the_worker_is_refused() {
        let queue = log_queue();
        let handle = queue.handle().clone();
        let inner = queue
            .sync(move |_| handle.sync(|_| ()))
            .expect("queue alive");
        assert!(matches!(inner, Err(QueueError::Reentrant)), "would deadlock");
    }

    #[test]
    fn delayed_jobs_can_be_cancelled() {
        let queue = log_queue();
        let _kept = queue.schedule_after(Duration::from_millis(5), |log| log.push(1));
        let cancelled = queue.schedule_after(Duration::from_millis(5), |log| log.push(2));
        cancelled.cancel();
        assert!(cancelled.is_cancelled());
        queue.dispatch(|log| log.push(0)).expect("queue alive");

        thread::sleep(Duration::from_millis(100));
        let log = queue.sync(|log| log.clone()).expect("queue alive");
        assert_eq!(log, [0, 1], "only the live delayed job runs, after immediate work");
    }

    #[test]
    fn handles_fail_after_shutdown() {
        let queue = log_queue();
        let handle = queue.handle().clone();
        drop(queue);
        assert!(matches!(handle.dispatch(|_| {}), Err(QueueError::Disconnected)));
        assert!(matches!(handle.sync(|_| ()), Err(QueueError::Disconnected)));
        assert!(
            handle
                .schedule_after(Duration::ZERO, |_| {})
                .is_cancelled(),
            "nothing left to run it"
        );
    }
}
