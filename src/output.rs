//! Terminal output formatting.

use colored::{ColoredString, Colorize};

use crate::debugger::DebuggerCommand;
use crate::report::{
    CrashDetails, CrashReport, Diagnosis, StepRole, QUICK_TIPS, SYSTEM_LIBRARY_CAUSES,
};
use crate::stack_trace::{ClassifiedFrame, StackFrame};

const FUNCTION_COLUMN: usize = 40;
const FILE_COLUMN: usize = 30;

fn width() -> usize {
    textwrap::termwidth().min(100)
}

/// "Error: ..." with an optional "Tip: ..." line
pub fn format_error(message: &str, tip: Option<&str>) -> String {
    let mut text = format!("{} {}", "Error:".red().bold(), message);
    if let Some(tip) = tip {
        text.push_str(&format!("\n{} {}", "Tip:".blue().bold(), tip.dimmed()));
    }
    text
}

/// Status line on stderr, e.g. "Running ./app under GDB"
pub fn print_status(verb: &str, detail: &str) {
    eprintln!("{} {}", verb.cyan().bold(), detail.dimmed());
}

fn headline_bullet(report: &CrashReport) -> ColoredString {
    match report {
        CrashReport::Crash(_) => "●".red(),
        CrashReport::CleanExit => "✓".green(),
        CrashReport::ErrorExit { .. } => "●".yellow(),
        CrashReport::NoCrash => "✓".green(),
        CrashReport::NothingToAnalyze => "?".yellow(),
        CrashReport::DebuggerFailed { .. } => "✗".red(),
    }
}

fn section(title: &str) {
    println!("{} {}", "▸".blue(), title.blue().bold());
}

/// Print a report with color
pub fn print_report(report: &CrashReport) {
    let headline = report.headline();
    println!();
    for (i, line) in textwrap::wrap(&headline, width().saturating_sub(2))
        .iter()
        .enumerate()
    {
        if i == 0 {
            println!("{} {}", headline_bullet(report), line.bold());
        } else {
            println!("  {}", line.bold());
        }
    }
    println!();

    if let CrashReport::Crash(details) = report {
        print_details(details);
    }
}

fn print_details(details: &CrashDetails) {
    match details.diagnosis() {
        Diagnosis::UserCode {
            culprit,
            steps,
            system_call,
        } => {
            section("The problem is likely here");
            println!("  {} {}", "File:    ".bold(), culprit.file.display().to_string().cyan());
            println!("  {} {}", "Line:    ".bold(), culprit.line.to_string().yellow());
            println!("  {} {}", "Function:".bold(), culprit.signature().bright_white());
            println!();

            section("What happened (simplified)");
            for step in steps {
                let signature = step.frame.signature();
                match step.role {
                    StepRole::Crash => println!(
                        "  {} {} {}",
                        "->".red().bold(),
                        signature.red(),
                        "(crashed here)".dimmed()
                    ),
                    StepRole::Start => println!("  1. {} {}", signature, "(started here)".dimmed()),
                    StepRole::Middle => println!("  {}. {}", step.number, signature),
                }
            }
            println!();

            if let Some(system) = system_call {
                println!(
                    "{} {}",
                    "Hint:".yellow().bold(),
                    "Your code called a system function that caused the crash."
                );
                println!("  The system was trying to: {}", system.signature().cyan());
                println!();
            }
        }
        Diagnosis::SystemLibrary { notable } => {
            section("The crash happened in a system library");
            println!("  This usually means:");
            for cause in SYSTEM_LIBRARY_CAUSES {
                println!("    * {cause}");
            }
            println!();
            if let Some(frame) = notable {
                println!(
                    "{} {} at {}",
                    "Look at this code:".yellow().bold(),
                    frame.signature(),
                    frame.location().cyan()
                );
                println!();
            }
        }
        Diagnosis::NoFrames => {
            println!(
                "{} {}",
                "?".yellow(),
                "Couldn't find detailed crash information".yellow().bold()
            );
            println!(
                "  {} rebuild with debug symbols, e.g. {}",
                "Try this:".blue().bold(),
                "g++ -g your_code.cpp".cyan()
            );
            println!();
        }
    }

    section("Quick tips");
    for tip in QUICK_TIPS {
        println!("  {} {}", "*".dimmed(), tip);
    }
    println!();
}

/// Print a report as pretty JSON
pub fn print_json(report: &CrashReport) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn truncate_start(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let keep: String = text.chars().skip(count - (max - 3)).collect();
    format!("...{keep}")
}

fn truncate_end(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep: String = text.chars().take(max - 3).collect();
    format!("{keep}...")
}

/// One uncolored table row; user frames are marked with `>`
pub fn frame_row(frame: &StackFrame) -> String {
    let classified = ClassifiedFrame::new(frame);
    let marker = if classified.is_user_code() { ">" } else { " " };
    format!(
        "  {} {:>4} {:40} {:30} {:>6} {}",
        marker,
        frame.index,
        truncate_end(&frame.function, FUNCTION_COLUMN - 2),
        truncate_start(&frame.file.display().to_string(), FILE_COLUMN - 2),
        frame.line,
        classified.kind
    )
}

/// Print every parsed frame, innermost first, with its classification
pub fn print_frames(details: &CrashDetails) {
    let mut frames: Vec<&StackFrame> = details
        .user_frames
        .iter()
        .chain(&details.library_frames)
        .collect();
    frames.sort_by_key(|frame| frame.index);

    section("Parsed Stack Trace");
    if frames.is_empty() {
        println!("  {}", "No frames parsed.".dimmed());
        println!();
        return;
    }

    println!(
        "  {} {:>4} {:40} {:30} {:>6} {}",
        " ",
        "#".dimmed(),
        "Function".dimmed(),
        "File".dimmed(),
        "Line".dimmed(),
        "Kind".dimmed()
    );
    println!("  {}", "─".repeat(92).dimmed());

    for frame in frames {
        let row = frame_row(frame);
        if ClassifiedFrame::new(frame).is_user_code() {
            println!("{}", row.green());
        } else {
            println!("{row}");
        }
    }
    println!();
}

pub fn print_debug_section(title: &str, body: &str, footer: Option<String>) {
    eprintln!("{}", format!("=== DEBUG: {title} ===").yellow().bold());
    if body.trim().is_empty() {
        eprintln!("{}", "| <empty>".dimmed());
    } else {
        for line in body.lines() {
            eprintln!("{}", format!("| {line}").bright_white());
        }
    }
    if let Some(footer) = footer {
        eprintln!("{}", footer.dimmed());
    }
    eprintln!();
}

/// Show the exact GDB command line on stderr
pub fn print_debug_command(program: &std::path::Path, command: &DebuggerCommand) {
    print_debug_section(
        "GDB Command",
        &format!("{} {command}", program.display()),
        Some(format!("({} mode)", command.mode())),
    );
}
