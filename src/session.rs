//! Per-run session settings.
//!
//! Everything that decides how one debugging session behaves, resolved from
//! the config file, environment and command line into a single value.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, MonitorConfig};
use crate::debugger::Debugger;
use crate::interrupt::Interrupt;
use crate::report::Summarizer;
use crate::signal::SignalMatch;

#[derive(Debug, Clone)]
pub struct Session {
    /// GDB executable
    pub debugger: PathBuf,
    /// Launch-mode time limit; `None` waits forever
    pub timeout: Option<Duration>,
    /// Watch the program without a time limit instead of a one-shot run
    pub long_running: bool,
    pub signal_match: SignalMatch,
    pub monitor: MonitorConfig,
    /// Suppress status messages
    pub quiet: bool,
    pub interrupt: Interrupt,
}

impl Session {
    pub fn from_config(config: &Config, interrupt: Interrupt) -> Self {
        Self {
            debugger: config.gdb.clone(),
            timeout: timeout_from_secs(config.timeout_secs),
            long_running: false,
            signal_match: config.signal_match(),
            monitor: config.monitor.clone(),
            quiet: false,
            interrupt,
        }
    }

    pub fn with_long_running(mut self, long_running: bool) -> Self {
        self.long_running = long_running;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = timeout_from_secs(secs);
        self
    }

    pub fn with_debugger(mut self, debugger: impl Into<PathBuf>) -> Self {
        self.debugger = debugger.into();
        self
    }

    pub fn with_strict_signals(mut self) -> Self {
        self.signal_match = SignalMatch::WordBoundary;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Debugger runner configured for this session
    pub fn runner(&self) -> Debugger {
        Debugger::new(&self.debugger, self.interrupt.clone())
            .with_poll_interval(Duration::from_millis(self.monitor.poll_interval_ms.max(1)))
    }

    pub fn summarizer(&self) -> Summarizer {
        Summarizer::new(self.signal_match)
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
