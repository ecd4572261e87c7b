use thiserror::Error;

/// Failure of a single capture/upload cycle. Recovered inside the capture loop.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("screenshot failed: {0:#}")]
    Capture(anyhow::Error),
    #[error("upload failed: {0:#}")]
    Upload(anyhow::Error),
}
