use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use anyhow::{anyhow, Result};
use lockshot_lib::{
    capture::CaptureSource,
    config::LoopTiming,
    lock::LockOracle,
    sensing::{CaptureLoop, LoopOutcome, Supervisor},
    upload::{Destination, UploadSink},
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const COOLDOWN: Duration = Duration::from_secs(60);

struct Unlocked;

impl LockOracle for Unlocked {
    fn is_locked(&self) -> bool {
        false
    }
}

/// Locked for the first `locked_polls` polls.
struct LockedFor {
    locked_polls: usize,
    polls: AtomicUsize,
}

impl LockOracle for LockedFor {
    fn is_locked(&self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst) < self.locked_polls
    }
}

/// Panics on its first call, fails on its second, succeeds afterwards.
#[derive(Default)]
struct CrashOnce {
    calls: AtomicUsize,
    crashed: AtomicBool,
}

impl CaptureSource for CrashOnce {
    fn capture(&self) -> Result<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.crashed.swap(true, Ordering::SeqCst) {
            panic!("capture driver crashed");
        }
        if call == 1 {
            return Err(anyhow!("monitor went to sleep"));
        }
        Ok(vec![0xFF, 0xD8, 0xFF])
    }
}

#[derive(Default)]
struct Collecting {
    stored: Mutex<Vec<Destination>>,
}

impl UploadSink for Collecting {
    fn upload(&self, destination: &Destination, _bytes: &[u8]) -> Result<()> {
        self.stored.lock().unwrap().push(destination.clone());
        Ok(())
    }
}

fn timing(run_window_secs: u64) -> LoopTiming {
    LoopTiming {
        run_window: Duration::from_secs(run_window_secs),
        poll_interval: Duration::from_secs(10),
        cycle_interval: Duration::from_secs(10),
        backoff_interval: Duration::from_secs(30),
    }
}

#[tokio::test(start_paused = true)]
async fn crashed_loop_is_restarted_with_a_fresh_window() {
    let source = Arc::new(CrashOnce::default());
    let sink = Arc::new(Collecting::default());
    let capture_loop = CaptureLoop::new(
        Arc::new(Unlocked),
        source.clone(),
        sink.clone(),
        "/shots",
        timing(100),
    )
    .with_identity("carol");

    let supervisor = Supervisor::new(COOLDOWN, CancellationToken::new());
    let began = Instant::now();
    let outcome = supervisor
        .run(|token| capture_loop.clone().run(token))
        .await;

    assert_eq!(outcome, LoopOutcome::Completed);
    // Run 1 dies on its first capture. Run 2 starts after the cooldown with a new
    // window: fails at +0, backs off to +30, then captures every 10s through +90.
    assert_eq!(source.calls.load(Ordering::SeqCst), 1 + 8);
    let stored = sink.stored.lock().unwrap();
    assert_eq!(stored.len(), 7);
    assert!(stored.iter().all(|d| d.user == "carol"));
    assert!(began.elapsed() >= COOLDOWN + Duration::from_secs(100));
}

#[tokio::test(start_paused = true)]
async fn locked_session_completes_without_uploads() {
    let sink = Arc::new(Collecting::default());
    let oracle = Arc::new(LockedFor {
        locked_polls: usize::MAX,
        polls: AtomicUsize::new(0),
    });
    let capture_loop = CaptureLoop::new(
        oracle.clone(),
        Arc::new(CrashOnce::default()),
        sink.clone(),
        "/",
        timing(60),
    )
    .with_identity("dave");

    let outcome = Supervisor::new(COOLDOWN, CancellationToken::new())
        .run(|token| capture_loop.clone().run(token))
        .await;

    assert_eq!(outcome, LoopOutcome::Completed);
    assert!(sink.stored.lock().unwrap().is_empty());
    assert_eq!(oracle.polls.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn shutdown_request_stops_the_whole_stack() {
    let oracle = Arc::new(LockedFor {
        locked_polls: 3,
        polls: AtomicUsize::new(0),
    });
    let capture_loop = CaptureLoop::new(
        oracle,
        Arc::new(CrashOnce::default()),
        Arc::new(Collecting::default()),
        "/",
        timing(1_000),
    )
    .with_identity("erin");

    let supervisor = Supervisor::new(COOLDOWN, CancellationToken::new());
    let token = supervisor.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(500)).await;
        token.cancel();
    });

    let outcome = supervisor
        .run(|token| capture_loop.clone().run(token))
        .await;
    assert_eq!(outcome, LoopOutcome::Cancelled);
}
