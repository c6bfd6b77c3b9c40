//! Fault signal vocabulary and exit-status detection.
//!
//! GDB reports a stopped inferior with lines such as
//! `Program received signal SIGSEGV, Segmentation fault.` and a finished one
//! with `[Inferior 1 (process 4242) exited with code 01]`. This module scans
//! raw GDB output for those markers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Fault signals the summarizer knows how to explain.
///
/// Variant order is the detection order: when several markers appear in the
/// same output, the first variant listed here wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FaultSignal {
    #[serde(rename = "SIGSEGV")]
    Segv,
    #[serde(rename = "SIGABRT")]
    Abort,
    #[serde(rename = "SIGFPE")]
    Fpe,
    #[serde(rename = "SIGILL")]
    Ill,
    #[serde(rename = "SIGBUS")]
    Bus,
    #[serde(rename = "SIGTRAP")]
    Trap,
    #[serde(rename = "SIGSYS")]
    Sys,
}

impl FaultSignal {
    /// Every signal, in detection order.
    pub const ALL: [FaultSignal; 7] = [
        FaultSignal::Segv,
        FaultSignal::Abort,
        FaultSignal::Fpe,
        FaultSignal::Ill,
        FaultSignal::Bus,
        FaultSignal::Trap,
        FaultSignal::Sys,
    ];

    /// Signals GDB is told to stop on (and not pass to the inferior).
    pub const HANDLED: [FaultSignal; 5] = [
        FaultSignal::Segv,
        FaultSignal::Abort,
        FaultSignal::Fpe,
        FaultSignal::Ill,
        FaultSignal::Bus,
    ];

    /// The name GDB prints for this signal
    pub fn marker(self) -> &'static str {
        match self {
            FaultSignal::Segv => "SIGSEGV",
            FaultSignal::Abort => "SIGABRT",
            FaultSignal::Fpe => "SIGFPE",
            FaultSignal::Ill => "SIGILL",
            FaultSignal::Bus => "SIGBUS",
            FaultSignal::Trap => "SIGTRAP",
            FaultSignal::Sys => "SIGSYS",
        }
    }

    /// Plain-language explanation shown as the report header
    pub fn explanation(self) -> &'static str {
        match self {
            FaultSignal::Segv => {
                "Segmentation fault (tried to access memory that doesn't belong to you)"
            }
            FaultSignal::Abort => "Abort signal (program decided to quit unexpectedly)",
            FaultSignal::Fpe => "Math error (division by zero or floating point issue)",
            FaultSignal::Ill => "Illegal instruction (CPU didn't understand your code)",
            FaultSignal::Bus => "Bus error (misaligned memory access)",
            FaultSignal::Trap => "Trace/breakpoint trap (debugger is watching)",
            FaultSignal::Sys => "Bad system call (wrong number to the system)",
        }
    }
}

impl fmt::Display for FaultSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// How signal markers are matched against debugger output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalMatch {
    /// Marker may appear anywhere, even inside a longer word or path
    #[default]
    Substring,
    /// Marker must not be surrounded by identifier characters
    WordBoundary,
}

/// Find the first fault signal mentioned in `text`.
pub fn detect_signal(text: &str, mode: SignalMatch) -> Option<FaultSignal> {
    FaultSignal::ALL
        .into_iter()
        .find(|signal| contains_marker(text, signal.marker(), mode))
}

fn contains_marker(text: &str, marker: &str, mode: SignalMatch) -> bool {
    match mode {
        SignalMatch::Substring => text.contains(marker),
        SignalMatch::WordBoundary => text.match_indices(marker).any(|(start, _)| {
            let before = text[..start].chars().next_back();
            let after = text[start + marker.len()..].chars().next();
            !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
        }),
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn exit_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"exited with code (\d+)").expect("valid exit code pattern"))
}

/// Extract the exit code from GDB's `exited with code N` marker.
///
/// The digits are read as written. A number too large for an `i64` still
/// counts as an exit marker and saturates to `i64::MAX`.
pub fn detect_exit_code(text: &str) -> Option<i64> {
    let digits = exit_code_regex().captures(text)?.get(1)?.as_str();
    Some(digits.parse().unwrap_or(i64::MAX))
}
