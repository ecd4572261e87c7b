use anyhow::{Context, Result};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{
    capture::CaptureSource,
    config::LoopTiming,
    error::CycleError,
    lock::LockOracle,
    upload::{Destination, UploadSink},
};

use super::identity::resolve_session_identity;
use super::state::{LoopOutcome, LoopState, RunWindow};

// Set to false to silence per-cycle logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Polls the lock state and, while unlocked, captures and uploads on a fixed cadence
/// until the run window expires.
#[derive(Clone)]
pub struct CaptureLoop {
    oracle: Arc<dyn LockOracle>,
    source: Arc<dyn CaptureSource>,
    sink: Arc<dyn UploadSink>,
    base_root: String,
    timing: LoopTiming,
    identity: Option<String>,
}

enum Wait {
    Elapsed,
    Cancelled,
}

impl CaptureLoop {
    pub fn new(
        oracle: Arc<dyn LockOracle>,
        source: Arc<dyn CaptureSource>,
        sink: Arc<dyn UploadSink>,
        base_root: impl Into<String>,
        timing: LoopTiming,
    ) -> Self {
        Self {
            oracle,
            source,
            sink,
            base_root: base_root.into(),
            timing,
            identity: None,
        }
    }

    /// Uses `user` instead of resolving the login name at start.
    pub fn with_identity(mut self, user: impl Into<String>) -> Self {
        self.identity = Some(user.into());
        self
    }

    /// Runs until the window expires (`Completed`) or `cancel` fires (`Cancelled`).
    ///
    /// Capture and upload failures are absorbed here. An error return means a worker
    /// died underneath the loop and the run should be restarted.
    pub async fn run(self, cancel: CancellationToken) -> Result<LoopOutcome> {
        let user = self
            .identity
            .clone()
            .unwrap_or_else(resolve_session_identity);
        let window = RunWindow::start(self.timing.run_window);
        let mut state = LoopState::default();
        log_info!("Starting screenshot upload for user: {user}");

        loop {
            if cancel.is_cancelled() {
                log_info!("Capture loop shutting down after {}s", window.elapsed().as_secs());
                return Ok(LoopOutcome::Cancelled);
            }

            let expired = window.expired();
            let locked = !expired && self.check_lock().await?;
            let next = state.next(expired, || locked);
            match (state, next) {
                (_, LoopState::Terminated) => {
                    log_info!(
                        "Run window of {}s completed. Stopping capture loop.",
                        self.timing.run_window.as_secs()
                    );
                    return Ok(LoopOutcome::Completed);
                }
                (LoopState::Active, LoopState::Suspended) => {
                    log_warn!("System is locked. Pausing screenshot capture...");
                }
                (LoopState::Suspended, LoopState::Active) => {
                    log_info!("System unlocked. Resuming screenshot capture...");
                }
                _ => {}
            }
            state = next;

            let delay = if state == LoopState::Suspended {
                self.timing.poll_interval
            } else {
                match self.run_cycle(&user).await? {
                    Ok(()) => self.timing.cycle_interval,
                    Err(err) => {
                        log_error!(
                            "{err}. Retrying in {} seconds...",
                            self.timing.backoff_interval.as_secs()
                        );
                        self.timing.backoff_interval
                    }
                }
            };

            if let Wait::Cancelled = self.wait(delay, &window, &cancel).await {
                log_info!("Capture loop shutting down after {}s", window.elapsed().as_secs());
                return Ok(LoopOutcome::Cancelled);
            }
        }
    }

    /// The oracle scans the process table, so it runs off the runtime thread too.
    async fn check_lock(&self) -> Result<bool> {
        let oracle = Arc::clone(&self.oracle);
        tokio::task::spawn_blocking(move || oracle.is_locked())
            .await
            .context("lock check worker join failed")
    }

    /// One capture-and-upload cycle. The outer `Result` carries worker failures,
    /// the inner one the recoverable cycle failures.
    async fn run_cycle(&self, user: &str) -> Result<Result<(), CycleError>> {
        log_info!("Attempting to capture screenshot...");
        let captured_at = Local::now().naive_local();

        let source = Arc::clone(&self.source);
        let jpeg = match tokio::task::spawn_blocking(move || source.capture())
            .await
            .context("screenshot capture worker join failed")?
        {
            Ok(jpeg) => jpeg,
            Err(err) => return Ok(Err(CycleError::Capture(err))),
        };
        log_info!("Screenshot captured successfully ({} bytes)", jpeg.len());

        let destination = Destination::at(&self.base_root, user, captured_at);
        let sink = Arc::clone(&self.sink);
        let uploaded = tokio::task::spawn_blocking(move || sink.upload(&destination, &jpeg))
            .await
            .context("upload worker join failed")?;

        Ok(uploaded.map_err(CycleError::Upload))
    }

    /// Sleeps for `delay`, cut short at window expiry so termination is never late.
    async fn wait(&self, delay: Duration, window: &RunWindow, cancel: &CancellationToken) -> Wait {
        let delay = delay.min(window.remaining());
        tokio::select! {
            _ = tokio::time::sleep(delay) => Wait::Elapsed,
            _ = cancel.cancelled() => Wait::Cancelled,
        }
    }
}
