use anyhow::{anyhow, Result};
use std::sync::Mutex;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use super::LockProbe;

/// Scans the process table for the platform's lock-screen host.
pub struct ProcessProbe {
    system: Mutex<System>,
    needle: String,
}

impl ProcessProbe {
    pub fn new(process_name: &str) -> Self {
        Self {
            system: Mutex::new(System::new()),
            needle: process_name.to_lowercase(),
        }
    }
}

impl LockProbe for ProcessProbe {
    fn name(&self) -> &'static str {
        "process table"
    }

    fn probe(&self) -> Result<bool> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| anyhow!("process table state poisoned"))?;

        // Names are all we look at; skip cpu/memory/disk refreshes.
        system.refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::new());

        if system.processes().is_empty() {
            return Err(anyhow!("process table came back empty"));
        }

        Ok(system
            .processes()
            .values()
            .any(|process| matches_lock_process(&process.name().to_string_lossy(), &self.needle)))
    }
}

/// Case-insensitive substring match of a process name against the lock-screen host name.
pub fn matches_lock_process(process_name: &str, needle: &str) -> bool {
    !needle.is_empty() && process_name.to_lowercase().contains(&needle.to_lowercase())
}

/// Compares the foreground window handle against handles seen while the desktop is locked.
#[cfg_attr(not(windows), allow(dead_code))]
pub struct ForegroundWindowProbe {
    locked_handles: Vec<isize>,
}

impl ForegroundWindowProbe {
    /// `None` on platforms without a foreground window API.
    #[cfg(windows)]
    pub fn new(locked_handles: Vec<isize>) -> Option<Self> {
        Some(Self { locked_handles })
    }

    #[cfg(not(windows))]
    pub fn new(locked_handles: Vec<isize>) -> Option<Self> {
        let _ = locked_handles;
        None
    }

    #[cfg_attr(not(windows), allow(dead_code))]
    fn is_locked_handle(&self, handle: isize) -> bool {
        self.locked_handles.contains(&handle)
    }
}

impl LockProbe for ForegroundWindowProbe {
    fn name(&self) -> &'static str {
        "foreground window"
    }

    #[cfg(windows)]
    fn probe(&self) -> Result<bool> {
        use windows_sys::Win32::UI::WindowsAndMessaging::GetForegroundWindow;

        // SAFETY: GetForegroundWindow takes no arguments and only returns a handle value.
        let handle = unsafe { GetForegroundWindow() } as isize;
        log::debug!("Foreground window handle: {handle}");
        Ok(self.is_locked_handle(handle))
    }

    #[cfg(not(windows))]
    fn probe(&self) -> Result<bool> {
        Err(anyhow!("foreground window API unavailable on this platform"))
    }
}
