use anyhow::Result;
use std::any::Any;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use super::state::LoopOutcome;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Keeps the capture loop running: restarts it after any crash, stops once a run
/// completes or shutdown is requested.
pub struct Supervisor {
    cooldown: Duration,
    cancel_token: CancellationToken,
}

impl Supervisor {
    pub fn new(cooldown: Duration, cancel_token: CancellationToken) -> Self {
        Self {
            cooldown,
            cancel_token,
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Runs `start_loop` as a task until it returns normally. Errors and panics are
    /// logged, followed by the cooldown and a fresh run.
    pub async fn run<F, Fut>(&self, mut start_loop: F) -> LoopOutcome
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<LoopOutcome>> + Send + 'static,
    {
        let mut attempt: u64 = 0;

        loop {
            if self.cancel_token.is_cancelled() {
                return LoopOutcome::Cancelled;
            }

            attempt += 1;
            let handle = tokio::spawn(start_loop(self.cancel_token.child_token()));

            let failure = match handle.await {
                Ok(Ok(LoopOutcome::Completed)) => {
                    log_info!("Capture loop completed after {attempt} run(s); not restarting");
                    return LoopOutcome::Completed;
                }
                Ok(Ok(LoopOutcome::Cancelled)) => return LoopOutcome::Cancelled,
                Ok(Err(err)) => format!("{err:#}"),
                Err(join_err) => describe_join_error(join_err),
            };

            log_error!(
                "CRITICAL: capture loop crashed: {failure}. Restarting in {} seconds...",
                self.cooldown.as_secs()
            );

            tokio::select! {
                _ = tokio::time::sleep(self.cooldown) => {}
                _ = self.cancel_token.cancelled() => return LoopOutcome::Cancelled,
            }
        }
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        format!("panicked: {}", panic_message(err.into_panic()))
    } else {
        "task was aborted".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::pin::Pin;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tokio::time::Instant;

    const COOLDOWN: Duration = Duration::from_secs(60);

    type LoopFuture = Pin<Box<dyn Future<Output = Result<LoopOutcome>> + Send>>;

    /// Loop stand-in that fails its first `crashes` runs, then completes.
    fn flaky(
        crashes: usize,
        panics: bool,
    ) -> (Arc<AtomicUsize>, impl FnMut(CancellationToken) -> LoopFuture) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let start = move |_token: CancellationToken| -> LoopFuture {
            let run = counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if run < crashes {
                    if panics {
                        panic!("capture loop blew up");
                    }
                    return Err(anyhow!("lock oracle thread died"));
                }
                Ok(LoopOutcome::Completed)
            })
        };
        (runs, start)
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_after_error_with_cooldown() {
        let supervisor = Supervisor::new(COOLDOWN, CancellationToken::new());
        let (runs, start) = flaky(1, false);
        let began = Instant::now();

        let outcome = supervisor.run(start).await;

        assert_eq!(outcome, LoopOutcome::Completed);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(began.elapsed() >= COOLDOWN);
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_after_panic() {
        let supervisor = Supervisor::new(COOLDOWN, CancellationToken::new());
        let (runs, start) = flaky(2, true);
        let began = Instant::now();

        let outcome = supervisor.run(start).await;

        assert_eq!(outcome, LoopOutcome::Completed);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(began.elapsed() >= COOLDOWN * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn clean_completion_is_not_restarted() {
        let supervisor = Supervisor::new(COOLDOWN, CancellationToken::new());
        let (runs, start) = flaky(0, false);
        let began = Instant::now();

        assert_eq!(supervisor.run(start).await, LoopOutcome::Completed);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(began.elapsed() < COOLDOWN);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_cooldown_stops_restarts() {
        let supervisor = Supervisor::new(COOLDOWN, CancellationToken::new());
        let (runs, start) = flaky(usize::MAX, false);

        let token = supervisor.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            token.cancel();
        });

        assert_eq!(supervisor.run(start).await, LoopOutcome::Cancelled);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_supervisor_never_starts_a_run() {
        let token = CancellationToken::new();
        token.cancel();
        let supervisor = Supervisor::new(COOLDOWN, token);
        let (runs, start) = flaky(0, false);

        assert_eq!(supervisor.run(start).await, LoopOutcome::Cancelled);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panic_payloads_are_readable() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7_u8)), "unknown panic payload");
    }
}
