// SPDX-License-Identifier: GPL-3.0-only

//! Timer service on top of a tokio runtime.

use std::time::Duration;

use storage_contracts::{TimerCallback, TimerHandle, TimerService};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Runs each timer as a task on `runtime`. Callbacks run on the blocking
/// pool, since they may wait on locks held across disk I/O.
#[derive(Debug, Clone)]
pub struct TokioTimerService {
    runtime: Handle,
}

impl TokioTimerService {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Timer service on the runtime of the calling task.
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

struct TokioTimerHandle {
    cancel_token: CancellationToken,
}

impl TimerHandle for TokioTimerHandle {
    fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

impl TimerService for TokioTimerService {
    fn schedule(
        &self,
        name: &str,
        delay: Duration,
        callback: TimerCallback,
    ) -> Box<dyn TimerHandle> {
        let cancel_token = CancellationToken::new();
        let task_cancel = cancel_token.clone();
        let name = name.to_string();

        self.runtime.spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {
                    trace!("Timer {} cancelled", name);
                }
                _ = tokio::time::sleep(delay) => {
                    debug!("Timer {} fired", name);
                    if let Err(e) = tokio::task::spawn_blocking(callback).await {
                        tracing::error!("Timer {} callback failed: {}", name, e);
                    }
                }
            }
        });

        Box::new(TokioTimerHandle { cancel_token })
    }
}
