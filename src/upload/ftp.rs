use anyhow::{anyhow, Context, Result};
use std::io::Cursor;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use suppaftp::{types::FileType, FtpError, FtpStream};

use crate::config::{Credentials, Endpoint};

use super::{store_at, Destination, RemoteDirs, UploadSink};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Uploads each capture over a fresh FTP session.
pub struct FtpUploadSink {
    endpoint: Endpoint,
    credentials: Credentials,
    timeout: Duration,
}

impl FtpUploadSink {
    /// `timeout` bounds every connect, read and write on the control and data channels.
    pub fn new(endpoint: Endpoint, credentials: Credentials, timeout: Duration) -> Self {
        Self {
            endpoint,
            credentials,
            timeout,
        }
    }

    fn open(&self) -> Result<FtpSession> {
        let address = self.endpoint.address();
        log_info!("Connecting to FTP server {address}");

        let socket_addr = address
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve FTP server {address}"))?
            .next()
            .ok_or_else(|| anyhow!("FTP server {address} resolved to no addresses"))?;

        // Timeouts go on the socket before suppaftp reads the greeting.
        let control = bounded_stream(socket_addr, self.timeout)
            .with_context(|| format!("Failed to connect to FTP server {address}"))?;
        let timeout = self.timeout;
        let stream = FtpStream::connect_with_stream(control)
            .with_context(|| format!("FTP server {address} sent no usable greeting"))?
            .passive_stream_builder(move |data_addr| {
                bounded_stream(data_addr, timeout).map_err(FtpError::ConnectionError)
            });
        // From here on the session is closed on drop, including when login fails.
        let mut session = FtpSession { stream };
        session
            .stream
            .login(&self.credentials.user, &self.credentials.password)
            .context("FTP login rejected")?;
        session
            .stream
            .transfer_type(FileType::Binary)
            .context("Failed to switch FTP session to binary mode")?;
        log_info!("Connected to FTP server: {}", self.endpoint.host);
        Ok(session)
    }
}

/// Connects to `addr` with every blocking operation bounded by `timeout`.
fn bounded_stream(addr: SocketAddr, timeout: Duration) -> std::io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    Ok(stream)
}

impl UploadSink for FtpUploadSink {
    fn upload(&self, destination: &Destination, bytes: &[u8]) -> Result<()> {
        let mut session = self.open()?;
        store_at(&mut session, destination, bytes)?;
        log_info!("Uploaded screenshot: {}", destination.remote_path());
        Ok(())
    }
}

struct FtpSession {
    stream: FtpStream,
}

impl RemoteDirs for FtpSession {
    fn change_dir(&mut self, path: &str) -> Result<()> {
        self.stream
            .cwd(path)
            .with_context(|| format!("CWD {path} failed"))
    }

    fn make_dir(&mut self, path: &str) -> Result<()> {
        self.stream
            .mkdir(path)
            .with_context(|| format!("MKD {path} failed"))
    }

    fn store(&mut self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let mut reader = Cursor::new(bytes);
        self.stream
            .put_file(file_name, &mut reader)
            .with_context(|| format!("STOR {file_name} failed"))?;
        Ok(())
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        if let Err(err) = self.stream.quit() {
            log_warn!("Failed to close FTP session cleanly: {err}");
        }
    }
}
