//! Long-running monitor mode.
//!
//! Launches the target under GDB with no time limit, so servers and other
//! programs that crash only after a while can be caught. While the program
//! runs, a short status line is printed every `heartbeat_secs`.

use colored::Colorize;
use std::time::Duration;

use crate::debugger::{DebuggerCommand, InvokeError};
use crate::session::Session;

/// Decides when the next "still running" line is due
#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Option<Duration>,
    next: Duration,
}

impl Heartbeat {
    /// A zero interval disables the heartbeat
    pub fn new(interval: Duration) -> Self {
        let interval = (!interval.is_zero()).then_some(interval);
        Self {
            interval,
            next: interval.unwrap_or_default(),
        }
    }

    /// Return a status message if one is due at `elapsed`
    pub fn due(&mut self, elapsed: Duration) -> Option<String> {
        let interval = self.interval?;
        if elapsed < self.next {
            return None;
        }
        while self.next <= elapsed {
            self.next += interval;
        }
        Some(format!(
            "Still running after {}... (Ctrl-C to stop)",
            format_elapsed(elapsed)
        ))
    }
}

/// Format a duration as `45s`, `3m 05s` or `2h 10m`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60),
    }
}

/// Run `target` under GDB until it crashes, exits, or the user interrupts
pub fn monitor(session: &Session, target: &str, args: &[String]) -> Result<String, InvokeError> {
    if !session.quiet {
        eprintln!(
            "{} {}",
            "Monitoring".cyan().bold(),
            format!("{target} (no time limit, Ctrl-C to stop)").dimmed()
        );
    }

    let mut heartbeat = Heartbeat::new(Duration::from_secs(session.monitor.heartbeat_secs));
    let quiet = session.quiet;
    let command = DebuggerCommand::launch(target, args);

    session.runner().run(&command, None, &mut |elapsed| {
        if let Some(message) = heartbeat.due(elapsed) {
            log::info!("{message}");
            if !quiet {
                eprintln!("{}", message.dimmed());
            }
        }
    })
}
