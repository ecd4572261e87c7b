use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const CONFIG_ENV: &str = "LOCKSHOT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "lockshot.json";
pub const DEFAULT_LOG_FILE: &str = "screenshot_log.txt";

/// Seven months of thirty days.
const DEFAULT_RUN_WINDOW_SECS: u64 = 7 * 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 21,
        }
    }
}

impl Endpoint {
    /// `host:port`, with IPv6 literals bracketed so the result parses as a socket address.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LockSettings {
    /// Foreground window handles observed while the desktop is locked.
    pub locked_window_handles: Vec<isize>,
    pub lock_process_name: String,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            locked_window_handles: vec![0, 67370, 1901390],
            lock_process_name: "logonui.exe".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub endpoint: Endpoint,
    pub credentials: Credentials,
    pub base_root: String,
    pub run_window_secs: u64,
    pub poll_interval_secs: u64,
    pub cycle_interval_secs: u64,
    pub backoff_interval_secs: u64,
    pub restart_cooldown_secs: u64,
    /// Bounds the FTP connect and each control-channel read or write.
    pub transfer_timeout_secs: u64,
    pub jpeg_quality: u8,
    pub lock: LockSettings,
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            credentials: Credentials::default(),
            base_root: "/".into(),
            run_window_secs: DEFAULT_RUN_WINDOW_SECS,
            poll_interval_secs: 10,
            cycle_interval_secs: 10,
            backoff_interval_secs: 30,
            restart_cooldown_secs: 60,
            transfer_timeout_secs: 60,
            jpeg_quality: 50,
            lock: LockSettings::default(),
            log_file: None,
        }
    }
}

impl Settings {
    /// Reads settings from `path`, falling back to defaults when the file does not exist.
    /// Environment overrides are applied afterwards.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            Settings::default()
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("LOCKSHOT_FTP_HOST") {
            self.endpoint.host = host;
        }
        if let Ok(user) = env::var("LOCKSHOT_FTP_USER") {
            self.credentials.user = user;
        }
        if let Ok(password) = env::var("LOCKSHOT_FTP_PASSWORD") {
            self.credentials.password = password;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.host.trim().is_empty() {
            bail!("endpoint.host must be set (or LOCKSHOT_FTP_HOST)");
        }
        if self.run_window_secs == 0 {
            bail!("run_window_secs must be greater than zero");
        }
        for (name, value) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("cycle_interval_secs", self.cycle_interval_secs),
            ("backoff_interval_secs", self.backoff_interval_secs),
            ("restart_cooldown_secs", self.restart_cooldown_secs),
            ("transfer_timeout_secs", self.transfer_timeout_secs),
        ] {
            if value == 0 {
                bail!("{name} must be greater than zero");
            }
        }
        Ok(())
    }

    pub fn loop_timing(&self) -> LoopTiming {
        LoopTiming {
            run_window: Duration::from_secs(self.run_window_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            cycle_interval: Duration::from_secs(self.cycle_interval_secs),
            backoff_interval: Duration::from_secs(self.backoff_interval_secs),
        }
    }

    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_secs(self.restart_cooldown_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality.clamp(1, 100)
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| beside_executable(DEFAULT_LOG_FILE))
    }
}

/// Cadence of the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    pub run_window: Duration,
    pub poll_interval: Duration,
    pub cycle_interval: Duration,
    pub backoff_interval: Duration,
}

/// First CLI argument, then `LOCKSHOT_CONFIG`, then `lockshot.json` next to the binary.
pub fn resolve_config_path(cli_arg: Option<String>) -> PathBuf {
    cli_arg
        .map(PathBuf::from)
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| beside_executable(DEFAULT_CONFIG_FILE))
}

pub fn debug_logging_requested() -> bool {
    env::var("LOCKSHOT_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn beside_executable(file_name: &str) -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(file_name)))
        .unwrap_or_else(|| PathBuf::from(file_name))
}
