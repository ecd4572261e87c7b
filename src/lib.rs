pub mod capture;
pub mod config;
pub mod error;
pub mod lock;
pub mod sensing;
pub mod upload;
mod utils;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use capture::ScreenCapture;
use config::{debug_logging_requested, resolve_config_path, Settings};
use lock::CompositeLockOracle;
use sensing::{CaptureLoop, LoopOutcome, Supervisor};
use upload::FtpUploadSink;
use utils::logging::init_file_logging;

/// How long an in-flight capture or upload may hold up shutdown after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Process entry point. Returns the exit status: 0 for completion or Ctrl-C,
/// 1 when startup fails.
pub fn run() -> i32 {
    run_with(&resolve_config_path(std::env::args().nth(1)))
}

/// Runs the agent with settings from `config_path`.
pub fn run_with(config_path: &Path) -> i32 {
    // Logging is not up yet, so startup faults before it go to stderr.
    let settings = match Settings::load(config_path).and_then(|settings| {
        settings.validate()?;
        Ok(settings)
    }) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("lockshot: {err:#}");
            return 1;
        }
    };

    if let Err(err) = init_file_logging(&settings.log_file_path(), debug_logging_requested()) {
        eprintln!("lockshot: {err:#}");
        return 1;
    }

    if !config_path.exists() {
        warn!(
            "No settings file at {}; using defaults and environment overrides",
            config_path.display()
        );
    }

    info!("Script started in background");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Fatal error in main: failed to start runtime: {err}");
            return 1;
        }
    };

    let code = runtime.block_on(supervise(settings));
    // A worker stuck in a blocking call must not keep the process alive.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    code
}

async fn supervise(settings: Settings) -> i32 {
    let supervisor = Supervisor::new(settings.restart_cooldown(), CancellationToken::new());

    let oracle = Arc::new(CompositeLockOracle::for_platform(&settings.lock));
    info!("Lock detection via: {}", oracle.probe_names().join(", "));
    let source = Arc::new(ScreenCapture::new(settings.jpeg_quality()));
    let sink = Arc::new(FtpUploadSink::new(
        settings.endpoint.clone(),
        settings.credentials.clone(),
        settings.transfer_timeout(),
    ));
    let capture_loop = CaptureLoop::new(
        oracle,
        source,
        sink,
        settings.base_root.clone(),
        settings.loop_timing(),
    );

    let interrupt_token = supervisor.cancel_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Script terminated by user");
                interrupt_token.cancel();
            }
            Err(err) => warn!("Failed to listen for Ctrl-C: {err}"),
        }
    });

    match drive(&supervisor, SHUTDOWN_GRACE, |token| {
        capture_loop.clone().run(token)
    })
    .await
    {
        LoopOutcome::Completed => info!("Run window completed. Stopping script."),
        LoopOutcome::Cancelled => info!("Shutdown complete"),
    }
    0
}

/// Runs the supervisor, but stops waiting for it `grace` after cancellation.
async fn drive<F, Fut>(supervisor: &Supervisor, grace: Duration, start_loop: F) -> LoopOutcome
where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = Result<LoopOutcome>> + Send + 'static,
{
    let cancel_token = supervisor.cancel_token();
    tokio::select! {
        outcome = supervisor.run(start_loop) => outcome,
        _ = async {
            cancel_token.cancelled().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                "Capture loop still busy {}s after shutdown was requested; exiting anyway",
                grace.as_secs()
            );
            LoopOutcome::Cancelled
        }
    }
}
