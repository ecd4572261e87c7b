mod destination;
mod ftp;
mod remote;

pub use destination::Destination;
pub use ftp::FtpUploadSink;
pub use remote::{ensure_dirs, store_at, RemoteDirs};

use anyhow::Result;

/// Persists a snapshot to a remote, path-organized store.
pub trait UploadSink: Send + Sync {
    fn upload(&self, destination: &Destination, bytes: &[u8]) -> Result<()>;
}
