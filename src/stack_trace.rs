//! GDB backtrace parsing and user/library frame classification.
//!
//! This module turns the text of a GDB `bt` / `bt full` command into
//! [`StackFrame`]s and sorts them into the target's own code versus the C
//! runtime, the dynamic loader and other system libraries.
//!
//! Only frames that carry full debug information are extracted, i.e. lines
//! shaped like:
//!
//! ```text
//! #1  0x0000555555555160 in main () at /home/user/app.c:15
//! ```
//!
//! Library frames without symbols (`#3 0x... in __libc_start_main () from
//! /lib/libc.so.6`) have no `at file:line` suffix and are skipped.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Core Types
// ============================================================================

/// A single frame of a GDB backtrace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    /// Frame ordinal, 0 is the innermost (most recent) frame
    pub index: u32,
    /// Program counter for this frame, when GDB printed one
    pub address: Option<u64>,
    /// Function name, including a C++ parameter signature if present
    pub function: String,
    /// Argument values as printed by GDB, e.g. `()` or `(p=0x0, n=3)`
    pub arguments: String,
    /// Source file path
    pub file: PathBuf,
    /// Line number in the source file
    pub line: u32,
}

impl StackFrame {
    /// Create a frame with no address and an empty argument list
    pub fn new(
        index: u32,
        function: impl Into<String>,
        file: impl Into<PathBuf>,
        line: u32,
    ) -> Self {
        Self {
            index,
            address: None,
            function: function.into(),
            arguments: "()".to_string(),
            file: file.into(),
            line,
        }
    }

    /// Set the program counter
    pub fn with_address(mut self, address: u64) -> Self {
        self.address = Some(address);
        self
    }

    /// Set the argument values segment
    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = arguments.into();
        self
    }

    /// Function name followed by its argument values, the way GDB shows it
    pub fn signature(&self) -> String {
        format!("{} {}", self.function, self.arguments)
    }

    /// `file:line` location string
    pub fn location(&self) -> String {
        format!("{}:{}", self.file.display(), self.line)
    }

    /// Classify this frame as user or library code
    pub fn kind(&self) -> FrameKind {
        classify(self)
    }
}

/// Which side of the user/system boundary a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    User,
    Library,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::User => write!(f, "user"),
            FrameKind::Library => write!(f, "library"),
        }
    }
}

/// A frame together with its classification
#[derive(Debug, Clone, Copy)]
pub struct ClassifiedFrame<'a> {
    pub frame: &'a StackFrame,
    pub kind: FrameKind,
}

impl<'a> ClassifiedFrame<'a> {
    pub fn new(frame: &'a StackFrame) -> Self {
        Self {
            frame,
            kind: classify(frame),
        }
    }

    pub fn is_user_code(&self) -> bool {
        self.kind == FrameKind::User
    }
}

// ============================================================================
// Frame Line Tokenizer
// ============================================================================

/// Parse one GDB frame line.
///
/// Grammar (whitespace is any non-empty run of blanks):
///
/// ```text
/// '#' ordinal ws [ '0x' hex ws ] 'in' ws name [ '(' params ')' ] ws '(' args ')' ws 'at' ws file ':' line
/// ```
///
/// Returns `None` for anything else, including frames with no source
/// location.
pub fn parse_frame_line(line: &str) -> Option<StackFrame> {
    let rest = line.trim_start().strip_prefix('#')?;

    let (ordinal, rest) = take_digits(rest)?;
    let index = ordinal.parse().ok()?;
    let rest = skip_whitespace(rest)?;

    let (address, rest) = match rest.strip_prefix("0x") {
        Some(hex) => {
            let end = hex
                .find(|c: char| !c.is_ascii_hexdigit())
                .unwrap_or(hex.len());
            if end == 0 {
                return None;
            }
            let address = u64::from_str_radix(&hex[..end], 16).ok()?;
            (Some(address), skip_whitespace(&hex[end..])?)
        }
        None => (None, rest),
    };

    let rest = rest.strip_prefix("in")?;
    let rest = skip_whitespace(rest)?;

    let paren = rest.find('(')?;
    let raw_name = &rest[..paren];
    let name = raw_name.trim_end();
    if name.is_empty() {
        return None;
    }

    let (first_group, after_first) = take_group(&rest[paren..])?;
    let (function, arguments, rest) = match skip_whitespace(after_first).and_then(take_group) {
        // `name(params) (args)`: the first group was a parameter signature
        Some((args, rest)) if raw_name.len() == name.len() => {
            (format!("{name}{first_group}"), args, rest)
        }
        Some(_) => return None,
        // `name (args)`: no signature, the name must be followed by blanks
        None if raw_name.len() > name.len() => (name.to_string(), first_group, after_first),
        None => return None,
    };

    let rest = skip_whitespace(rest)?;
    let rest = rest.strip_prefix("at")?;
    let rest = skip_whitespace(rest)?;
    let (file, line) = split_location(rest)?;

    let mut frame = StackFrame::new(index, function, file, line).with_arguments(arguments);
    frame.address = address;
    Some(frame)
}

/// Split a leading run of ASCII digits off `s`
fn take_digits(s: &str) -> Option<(&str, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        None
    } else {
        Some(s.split_at(end))
    }
}

/// Require at least one whitespace character and skip all of them
fn skip_whitespace(s: &str) -> Option<&str> {
    let trimmed = s.trim_start();
    if trimmed.len() == s.len() {
        None
    } else {
        Some(trimmed)
    }
}

/// Take a `( ... )` group with no nested closing parenthesis
fn take_group(s: &str) -> Option<(&str, &str)> {
    if !s.starts_with('(') {
        return None;
    }
    let close = s.find(')')?;
    Some(s.split_at(close + 1))
}

/// Split `file:line[...]` at the first colon followed by digits
fn split_location(s: &str) -> Option<(&str, u32)> {
    for (pos, _) in s.match_indices(':') {
        if pos == 0 {
            continue;
        }
        if let Some((digits, _)) = take_digits(&s[pos + 1..]) {
            let line = digits.parse().ok()?;
            return Some((&s[..pos], line));
        }
    }
    None
}

/// Extract every parseable frame from raw debugger output.
///
/// Frames are returned innermost first. Extraction stops when an ordinal
/// fails to increase, which is where a second backtrace would begin.
pub fn extract_frames(text: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();

    for frame in text.lines().filter_map(parse_frame_line) {
        if let Some(last) = frames.last() {
            if frame.index <= last.index {
                break;
            }
        }
        frames.push(frame);
    }

    frames
}

// ============================================================================
// Classification
// ============================================================================

/// Path prefixes of system library installations
const SYSTEM_ROOTS: [&str; 2] = ["/usr", "/lib"];

/// Path fragments that belong to the C runtime, loader or tooling
const RUNTIME_PATH_FRAGMENTS: [&str; 9] = [
    "sysdeps",
    "malloc",
    "libc",
    "libstdc++",
    "libpthread",
    "ld-linux",
    "csu",
    "vg_preload",
    "linux-gnu",
];

/// Symbol prefixes of runtime internals
const INTERNAL_SYMBOL_PREFIXES: [&str; 4] = ["__GI_", "__libc_", "std::", "operator"];

/// Symbol prefixes too generic to point a user at
pub(crate) const UNHELPFUL_SYMBOL_PREFIXES: [&str; 3] = ["std::", "__GI_", "__libc_"];

fn is_shared_library_path(path: &str) -> bool {
    path.ends_with(".so") || path.contains(".so.")
}

/// Decide whether a frame is user code or library code
pub fn classify(frame: &StackFrame) -> FrameKind {
    let path = frame.file.to_string_lossy();
    let function = frame.function.as_str();

    let is_library = SYSTEM_ROOTS.iter().any(|root| path.starts_with(root))
        || RUNTIME_PATH_FRAGMENTS
            .iter()
            .any(|fragment| path.contains(fragment))
        || is_shared_library_path(&path)
        || INTERNAL_SYMBOL_PREFIXES
            .iter()
            .any(|prefix| function.starts_with(prefix));

    if is_library {
        FrameKind::Library
    } else {
        FrameKind::User
    }
}

/// Split frames into (user, library), preserving order in each bucket
pub fn partition(frames: &[StackFrame]) -> (Vec<StackFrame>, Vec<StackFrame>) {
    frames
        .iter()
        .cloned()
        .partition(|frame| classify(frame) == FrameKind::User)
}
