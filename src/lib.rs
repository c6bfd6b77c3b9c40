//! Crash Detective - friendly crash analysis on top of GDB
//!
//! This library provides the core functionality for the `crashdetective`
//! CLI tool: running a program under GDB, parsing the backtrace, and
//! explaining the crash in plain language.

pub mod cli;
pub mod config;
pub mod debugger;
pub mod interactive;
pub mod interrupt;
pub mod monitor;
pub mod output;
pub mod report;
pub mod session;
pub mod signal;
pub mod stack_trace;

// Re-export commonly used types
pub use cli::Cli;
pub use config::Config;
pub use debugger::{Debugger, DebuggerCommand, InvokeError};
pub use report::{summarize, CrashDetails, CrashReport, Diagnosis, Summarizer};
pub use session::Session;
pub use signal::{FaultSignal, SignalMatch};
pub use stack_trace::{FrameKind, StackFrame};
