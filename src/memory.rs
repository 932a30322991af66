//! Memory governor for the mining pipeline.
//!
//! Tracks the process's resident memory as a percentage of total system
//! memory and gates chunked work on it:
//!
//! - above `cleanup_threshold_percent`: run registered best-effort cleanup
//!   hooks and continue;
//! - above `max_memory_percent`: run cleanup, re-probe, and fail with
//!   [`MinerError::MemoryLimitExceeded`] if usage is still over the ceiling.
//!
//! The OS reading comes through the [`MemoryProbe`] trait so tests can
//! inject synthetic usage; the default probe is backed by `sysinfo`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use sysinfo::System;

use crate::config::MemoryConfig;
use crate::error::MinerError;

/// Source of the resident-usage reading.
pub trait MemoryProbe: Send + Sync {
    /// Current resident usage of this process as a percentage of total
    /// system memory.
    fn usage_percent(&self) -> f64;
}

/// `sysinfo`-backed probe reading this process's RSS.
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn usage_percent(&self) -> f64 {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return 0.0;
        };
        let Ok(mut system) = self.system.lock() else {
            return 0.0;
        };
        system.refresh_memory();
        system.refresh_process(pid);
        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }
        let rss = system.process(pid).map(|p| p.memory()).unwrap_or(0);
        rss as f64 / total as f64 * 100.0
    }
}

type CleanupHook = Box<dyn Fn() + Send + Sync>;

/// Shared memory governor. One instance serves every concurrent resolution;
/// share behind an `Arc`.
pub struct MemoryGovernor {
    config: MemoryConfig,
    probe: Box<dyn MemoryProbe>,
    cleanup_hooks: Mutex<Vec<CleanupHook>>,
    cleanups_run: AtomicU64,
}

impl MemoryGovernor {
    /// Governor with the default `sysinfo` probe.
    pub fn new(config: MemoryConfig) -> Self {
        Self::with_probe(config, Box::new(SysinfoProbe::new()))
    }

    /// Governor with an injected probe (tests, simulations).
    pub fn with_probe(config: MemoryConfig, probe: Box<dyn MemoryProbe>) -> Self {
        Self {
            config,
            probe,
            cleanup_hooks: Mutex::new(Vec::new()),
            cleanups_run: AtomicU64::new(0),
        }
    }

    /// Register a best-effort cleanup hook, run when usage crosses the
    /// cleanup threshold (e.g. dropping cached intermediate buffers).
    pub fn register_cleanup<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if let Ok(mut hooks) = self.cleanup_hooks.lock() {
            hooks.push(Box::new(hook));
        }
    }

    /// Check resident usage against the configured thresholds. Called
    /// before each chunk of work; must pass before the chunk begins.
    pub fn check_memory(&self) -> Result<(), MinerError> {
        let usage = self.probe.usage_percent();

        if usage > self.config.max_memory_percent {
            // One cleanup pass gets a chance to bring usage back under the
            // ceiling before the operation is failed.
            self.run_cleanup();
            let usage = self.probe.usage_percent();
            if usage > self.config.max_memory_percent {
                return Err(MinerError::MemoryLimitExceeded {
                    usage_percent: usage,
                    limit_percent: self.config.max_memory_percent,
                });
            }
            return Ok(());
        }

        if usage > self.config.cleanup_threshold_percent {
            self.run_cleanup();
        }

        Ok(())
    }

    fn run_cleanup(&self) {
        self.cleanups_run.fetch_add(1, Ordering::Relaxed);
        if let Ok(hooks) = self.cleanup_hooks.lock() {
            for hook in hooks.iter() {
                hook();
            }
        }
    }

    /// How many cleanup passes have run.
    pub fn cleanups_run(&self) -> u64 {
        self.cleanups_run.load(Ordering::Relaxed)
    }

    /// Configured chunk size for batch operations.
    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }
}
