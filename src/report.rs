//! Crash report summarization.
//!
//! [`summarize`] is a pure function from raw GDB output to a [`CrashReport`].
//! The report's `Display` implementation is the plain-text explanation; the
//! colored terminal rendering lives in [`crate::output`].

use serde::Serialize;
use std::fmt;

use crate::debugger::is_sentinel;
use crate::signal::{detect_exit_code, detect_signal, FaultSignal, SignalMatch};
use crate::stack_trace::{extract_frames, partition, StackFrame, UNHELPFUL_SYMBOL_PREFIXES};

/// Maximum number of frames shown between the start and the crash site
pub const MAX_CHAIN_MIDDLE: usize = 3;

pub const NOTHING_TO_ANALYZE: &str = "Hmm, no output to analyze. That's strange!";
pub const CLEAN_EXIT: &str = "Success! Program finished perfectly with code 0!";
pub const NO_CRASH: &str = "No crash detected! Program finished normally.";

/// Fixed generic debugging advice appended to every crash report
pub const QUICK_TIPS: [&str; 7] = [
    "Check for null pointers",
    "Verify array bounds",
    "Ensure memory is properly allocated",
    "Validate function inputs",
    "Avoid double frees or invalid frees",
    "Use tools like Valgrind for memory issues",
    "Don't hesitate to ask for help!",
];

/// Usual reasons for a crash inside a system library
pub const SYSTEM_LIBRARY_CAUSES: [&str; 3] = [
    "You passed invalid data to a system function",
    "Memory was corrupted before the system call",
    "You're using a library function incorrectly",
];

/// Outcome of analyzing one debugger run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CrashReport {
    /// The debugger produced no output at all
    NothingToAnalyze,
    /// The program exited with code 0
    CleanExit,
    /// The program exited with a non-zero code but did not crash
    ErrorExit { code: i64 },
    /// The debugger could not produce output; `message` says why
    DebuggerFailed { message: String },
    /// No fault signal and no exit marker
    NoCrash,
    /// A fault signal was caught
    Crash(CrashDetails),
}

/// Details of a caught fault
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrashDetails {
    pub signal: FaultSignal,
    /// Frames in the program's own code, innermost first
    pub user_frames: Vec<StackFrame>,
    /// Frames in runtime and system libraries, innermost first
    pub library_frames: Vec<StackFrame>,
}

impl CrashDetails {
    /// Innermost user frame: where the problem most likely is
    pub fn culprit(&self) -> Option<&StackFrame> {
        self.user_frames.first()
    }

    /// Simplified call chain, outermost first.
    ///
    /// Holds the outermost user frame, up to [`MAX_CHAIN_MIDDLE`] frames
    /// walking inward from it, and the innermost user frame. Each frame
    /// appears once.
    pub fn call_chain(&self) -> Vec<&StackFrame> {
        let frames = &self.user_frames;
        match frames.len() {
            0 => Vec::new(),
            1 => vec![&frames[0]],
            len => {
                let mut chain = vec![&frames[len - 1]];
                chain.extend(frames[1..len - 1].iter().rev().take(MAX_CHAIN_MIDDLE));
                chain.push(&frames[0]);
                chain
            }
        }
    }

    /// First library frame with a name worth pointing at
    pub fn notable_library_frame(&self) -> Option<&StackFrame> {
        self.library_frames.iter().find(|frame| {
            !UNHELPFUL_SYMBOL_PREFIXES
                .iter()
                .any(|prefix| frame.function.starts_with(prefix))
        })
    }

    /// What the report should say about this crash. Every renderer works
    /// from this, so plain and colored output agree.
    pub fn diagnosis(&self) -> Diagnosis<'_> {
        if let Some(culprit) = self.culprit() {
            let chain = self.call_chain();
            let last = chain.len() - 1;
            let steps = chain
                .into_iter()
                .enumerate()
                .map(|(i, frame)| ChainStep {
                    number: i + 1,
                    role: if i == last {
                        StepRole::Crash
                    } else if i == 0 {
                        StepRole::Start
                    } else {
                        StepRole::Middle
                    },
                    frame,
                })
                .collect();
            Diagnosis::UserCode {
                culprit,
                steps,
                system_call: self.library_frames.first(),
            }
        } else if !self.library_frames.is_empty() {
            Diagnosis::SystemLibrary {
                notable: self.notable_library_frame(),
            }
        } else {
            Diagnosis::NoFrames
        }
    }
}

/// The body of a crash report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis<'a> {
    /// The crash is traced back to the program's own code
    UserCode {
        culprit: &'a StackFrame,
        steps: Vec<ChainStep<'a>>,
        /// Innermost library frame, when user code called into a library
        system_call: Option<&'a StackFrame>,
    },
    /// Only library frames were found
    SystemLibrary { notable: Option<&'a StackFrame> },
    /// No frame had debug information
    NoFrames,
}

/// One line of the simplified call chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStep<'a> {
    pub number: usize,
    pub role: StepRole,
    pub frame: &'a StackFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRole {
    Start,
    Middle,
    Crash,
}

impl CrashReport {
    pub fn is_crash(&self) -> bool {
        matches!(self, CrashReport::Crash(_))
    }

    pub fn details(&self) -> Option<&CrashDetails> {
        match self {
            CrashReport::Crash(details) => Some(details),
            _ => None,
        }
    }

    /// One-line summary of the outcome
    pub fn headline(&self) -> String {
        match self {
            CrashReport::NothingToAnalyze => NOTHING_TO_ANALYZE.to_string(),
            CrashReport::CleanExit => CLEAN_EXIT.to_string(),
            CrashReport::ErrorExit { code } => error_exit_message(*code),
            CrashReport::DebuggerFailed { message } => message.clone(),
            CrashReport::NoCrash => NO_CRASH.to_string(),
            CrashReport::Crash(details) => details.signal.explanation().to_string(),
        }
    }
}

pub fn error_exit_message(code: i64) -> String {
    format!("Program exited with error code {code} (not a crash, but something went wrong)")
}

// ============================================================================
// Summarizer
// ============================================================================

/// Turns debugger output into a [`CrashReport`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Summarizer {
    signal_match: SignalMatch,
}

impl Summarizer {
    pub fn new(signal_match: SignalMatch) -> Self {
        Self { signal_match }
    }

    pub fn summarize(&self, output: &str) -> CrashReport {
        if output.is_empty() {
            return CrashReport::NothingToAnalyze;
        }
        if is_sentinel(output) {
            return CrashReport::DebuggerFailed {
                message: output.trim().to_string(),
            };
        }

        let Some(signal) = detect_signal(output, self.signal_match) else {
            return match detect_exit_code(output) {
                Some(0) => CrashReport::CleanExit,
                Some(code) => CrashReport::ErrorExit { code },
                None => CrashReport::NoCrash,
            };
        };

        let frames = extract_frames(output);
        let (user_frames, library_frames) = partition(&frames);
        log::debug!(
            "{signal}: {} user frame(s), {} library frame(s)",
            user_frames.len(),
            library_frames.len()
        );

        CrashReport::Crash(CrashDetails {
            signal,
            user_frames,
            library_frames,
        })
    }
}

/// Summarize debugger output with substring signal matching
pub fn summarize(output: &str) -> CrashReport {
    Summarizer::default().summarize(output)
}

// ============================================================================
// Plain Text Rendering
// ============================================================================

impl fmt::Display for CrashReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrashReport::Crash(details) => write!(f, "{details}"),
            other => writeln!(f, "{}", other.headline()),
        }
    }
}

impl fmt::Display for CrashDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.signal.explanation())?;
        writeln!(f)?;

        match self.diagnosis() {
            Diagnosis::UserCode {
                culprit,
                steps,
                system_call,
            } => {
                writeln!(f, "The problem is likely here:")?;
                writeln!(f, "  File:     {}", culprit.file.display())?;
                writeln!(f, "  Line:     {}", culprit.line)?;
                writeln!(f, "  Function: {}", culprit.signature())?;
                writeln!(f)?;

                writeln!(f, "What happened (simplified):")?;
                for step in steps {
                    let signature = step.frame.signature();
                    match step.role {
                        StepRole::Crash => writeln!(f, "  -> {signature} (crashed here)")?,
                        StepRole::Start => writeln!(f, "  1. {signature} (started here)")?,
                        StepRole::Middle => writeln!(f, "  {}. {signature}", step.number)?,
                    }
                }

                if let Some(system) = system_call {
                    writeln!(f)?;
                    writeln!(
                        f,
                        "Hint: Your code called a system function that caused the crash."
                    )?;
                    writeln!(f, "  The system was trying to: {}", system.signature())?;
                }
            }
            Diagnosis::SystemLibrary { notable } => {
                writeln!(f, "The crash happened in a system library")?;
                writeln!(f, "This usually means:")?;
                for cause in SYSTEM_LIBRARY_CAUSES {
                    writeln!(f, "  * {cause}")?;
                }
                if let Some(frame) = notable {
                    writeln!(f)?;
                    writeln!(
                        f,
                        "Look at this code: {} at {}",
                        frame.signature(),
                        frame.location()
                    )?;
                }
            }
            Diagnosis::NoFrames => {
                writeln!(f, "Couldn't find detailed crash information")?;
                writeln!(
                    f,
                    "Try this: rebuild with debug symbols, e.g. g++ -g your_code.cpp"
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Quick tips:")?;
        for tip in QUICK_TIPS {
            writeln!(f, "  * {tip}")?;
        }
        Ok(())
    }
}
