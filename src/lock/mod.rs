//! Lock-state detection.
//!
//! The oracle runs a list of probes in order and answers "locked" as soon as one
//! of them does. A probe that fails is logged and skipped, so the oracle itself
//! never fails: with every probe inconclusive the session counts as unlocked.

mod probes;

pub use probes::{matches_lock_process, ForegroundWindowProbe, ProcessProbe};

use anyhow::Result;

use crate::config::LockSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

/// Answers whether the interactive session is currently locked or unattended.
pub trait LockOracle: Send + Sync {
    fn is_locked(&self) -> bool;
}

/// One lock-detection sub-check.
pub trait LockProbe: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(true)` means the session is locked according to this probe.
    fn probe(&self) -> Result<bool>;
}

pub struct CompositeLockOracle {
    probes: Vec<Box<dyn LockProbe>>,
}

impl CompositeLockOracle {
    pub fn new(probes: Vec<Box<dyn LockProbe>>) -> Self {
        Self { probes }
    }

    /// Builds the probes available on this platform. Without a native window API
    /// only the process scan is used.
    pub fn for_platform(settings: &LockSettings) -> Self {
        let mut probes: Vec<Box<dyn LockProbe>> = Vec::new();

        match ForegroundWindowProbe::new(settings.locked_window_handles.clone()) {
            Some(probe) => probes.push(Box::new(probe)),
            None => log_warn!(
                "Foreground window API not available; lock detection relies on the process table only"
            ),
        }
        probes.push(Box::new(ProcessProbe::new(&settings.lock_process_name)));

        Self::new(probes)
    }

    pub fn probe_names(&self) -> Vec<&'static str> {
        self.probes.iter().map(|probe| probe.name()).collect()
    }
}

impl LockOracle for CompositeLockOracle {
    fn is_locked(&self) -> bool {
        for probe in &self.probes {
            match probe.probe() {
                Ok(true) => {
                    log_warn!("Locked detected via {}", probe.name());
                    return true;
                }
                Ok(false) => {}
                Err(err) => log_error!("Lock probe {} failed: {err:#}", probe.name()),
            }
        }

        log_debug!("System is active and unlocked");
        false
    }
}
