use anyhow::{Context, Result};

use super::Destination;

/// The directory and store operations the upload path needs from a remote session.
pub trait RemoteDirs {
    fn change_dir(&mut self, path: &str) -> Result<()>;
    fn make_dir(&mut self, path: &str) -> Result<()>;
    /// Stores `bytes` as `file_name` in the current directory.
    fn store(&mut self, file_name: &str, bytes: &[u8]) -> Result<()>;
}

/// Changes into each directory level, creating the ones that are missing.
///
/// A failed create is tolerated (the directory may already exist or have been made
/// concurrently); only failing to enter the directory afterwards is an error.
pub fn ensure_dirs<R: RemoteDirs + ?Sized>(remote: &mut R, destination: &Destination) -> Result<()> {
    for dir in destination.dir_levels() {
        if remote.change_dir(&dir).is_ok() {
            continue;
        }

        if let Err(err) = remote.make_dir(&dir) {
            log::debug!("Creating remote directory {dir} failed: {err:#}");
        }
        remote
            .change_dir(&dir)
            .with_context(|| format!("Failed to enter remote directory {dir}"))?;
    }
    Ok(())
}

pub fn store_at<R: RemoteDirs + ?Sized>(
    remote: &mut R,
    destination: &Destination,
    bytes: &[u8],
) -> Result<()> {
    ensure_dirs(remote, destination)?;
    remote
        .store(&destination.file_name, bytes)
        .with_context(|| format!("Failed to store {}", destination.remote_path()))
}
