//! Retry loop.
//!
//! Validates credentials once, then calls the provisioner at a fixed interval
//! until an instance is created. Capacity errors, other provider errors, and
//! even panics inside an attempt are all absorbed and retried; there is no
//! backoff and no attempt limit. Only a failed startup stops the loop early.
//!
//! Known limitations: a request that can never succeed (bad image id, wrong
//! permissions) is retried forever just like a transient one, and a remote
//! call that hangs stalls the loop until the HTTP client's own timeout fires.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::notify::NotificationSink;
use crate::provider::{AttemptResult, InstanceInfo, Provisioner};
use crate::state::StatusBoard;

/// How a loop run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The instance was created.
    Created(InstanceInfo),
    /// Startup failed; the board is in the error state.
    Failed(String),
    /// Shutdown was requested before success.
    Interrupted,
}

/// Drives provisioning attempts and publishes progress to a [`StatusBoard`].
pub struct RetryLoop {
    provisioner: Arc<dyn Provisioner>,
    notifier: Arc<dyn NotificationSink>,
    board: Arc<StatusBoard>,
    interval: Duration,
}

impl RetryLoop {
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        notifier: Arc<dyn NotificationSink>,
        board: Arc<StatusBoard>,
        interval: Duration,
    ) -> Self {
        Self {
            provisioner,
            notifier,
            board,
            interval,
        }
    }

    /// Run the loop on its own task.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<LoopOutcome> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Run until an instance is created, startup fails, or shutdown is
    /// signalled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> LoopOutcome {
        if !self.provisioner.validate_credentials().await {
            let message = "OCI credential validation failed".to_string();
            error!("{message}; retry loop will not start");
            self.board.fail(message.clone());
            self.notifier.notify_error(&message).await;
            return LoopOutcome::Failed(message);
        }

        self.board.start_running(Utc::now());
        info!("Retry loop started");

        if !self.notifier.notify_startup().await {
            warn!("Startup notification was not delivered");
        }

        loop {
            let Some(attempt) = self.board.begin_attempt(Utc::now()) else {
                // Only the loop moves the board forward, so this means
                // someone else ended it.
                let state = self.board.snapshot();
                warn!(status = %state.status, "Board left running state; stopping");
                return LoopOutcome::Interrupted;
            };
            info!(attempt, "Trying to create instance");

            match self.attempt_once().await {
                AttemptResult::Created(instance) => {
                    info!(
                        attempt,
                        instance_id = %instance.id,
                        public_ip = %instance.public_ip,
                        "Instance created"
                    );
                    self.board.record_success(instance.clone());
                    if !self.notifier.notify_success(&instance).await {
                        warn!("Success notification was not delivered");
                    }
                    return LoopOutcome::Created(instance);
                }
                AttemptResult::CapacityExhausted(message) => {
                    info!(
                        attempt,
                        error = %message,
                        retry_in_secs = self.interval.as_secs(),
                        "Out of capacity"
                    );
                    self.board.record_result(format!(
                        "Out of capacity. Retrying in {}s...",
                        self.interval.as_secs()
                    ));
                }
                AttemptResult::Failed(message) => {
                    warn!(attempt, error = %message, "Attempt failed");
                    self.board.record_result(format!("Error: {message}"));
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                // A dropped sender disables this arm; `false` never wakes it.
                Ok(_) = shutdown.wait_for(|stop| *stop) => {
                    info!("Retry loop shutting down");
                    return LoopOutcome::Interrupted;
                }
            }
        }
    }

    /// One attempt with errors and panics folded into
    /// [`AttemptResult::Failed`].
    async fn attempt_once(&self) -> AttemptResult {
        match AssertUnwindSafe(self.provisioner.attempt())
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(error = %e, "Unexpected error during attempt");
                AttemptResult::Failed(format!("Exception: {e}"))
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(panic = %reason, "Attempt panicked");
                AttemptResult::Failed(format!("Exception: {reason}"))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
