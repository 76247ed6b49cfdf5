// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::io;

/// Failures of the tracking queue and the main-thread channel.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The receiving side has shut down; the work was dropped.
    #[error("queue has shut down")]
    Disconnected,
    /// A blocking call was made from the worker thread it would wait on.
    #[error("blocking call on the tracking queue from its own worker")]
    Reentrant,
    /// The worker thread could not be started.
    #[error("failed to spawn the tracking worker")]
    Spawn(#[from] io::Error),
}
