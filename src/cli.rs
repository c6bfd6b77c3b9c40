//! Command-line interface definitions for the `crashdetective` tool.

use clap::Parser;
use clap_complete::Shell;
use std::path::PathBuf;

/// Flag that switches to the long-running monitor, also honoured when it
/// appears among the target's arguments
pub const LONG_FLAG: &str = "--long";

/// Run a program under GDB and explain why it crashed
#[derive(Parser, Debug)]
#[command(
    name = "crashdetective",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CRASHDETECTIVE_GIT_SHA"), ")"),
    about,
    long_about = None
)]
#[command(
    after_help = "EXAMPLES:\n    crashdetective ./my_program arg1 arg2\n    crashdetective ./server --port 8080 --long\n    gdb -batch -ex run -ex bt ./app 2>&1 | crashdetective --from-file -"
)]
pub struct Cli {
    /// Program to debug, followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "TARGET")]
    pub target: Vec<String>,

    /// Watch a long-running program with no time limit
    #[arg(long)]
    pub long: bool,

    /// Start the interactive menu
    #[arg(long, short = 'i')]
    pub interactive: bool,

    /// Seconds to wait before stopping the program (0 = no limit)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// GDB executable to use
    #[arg(long, value_name = "PATH")]
    pub gdb: Option<PathBuf>,

    /// Only count signal names that stand alone (not inside other words)
    #[arg(long)]
    pub strict_signals: bool,

    /// Output the report as JSON
    #[arg(long, short = 'j')]
    pub json: bool,

    /// Show every parsed stack frame and its classification
    #[arg(long)]
    pub show_frames: bool,

    /// Show the GDB command line and its raw output
    #[arg(long, short = 'd')]
    pub debug: bool,

    /// Quiet mode - only show the report, no status messages
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Explain saved GDB output instead of running GDB ("-" reads stdin)
    #[arg(long, value_name = "PATH")]
    pub from_file: Option<PathBuf>,

    /// Generate shell completions
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<Shell>,

    /// Print the default configuration file and exit
    #[arg(long)]
    pub print_config: bool,
}

/// What a command line asks the tool to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Completions(Shell),
    PrintConfig,
    FromFile(PathBuf),
    Interactive,
    Run {
        target: String,
        args: Vec<String>,
        long_running: bool,
    },
    /// A bare PID was given; attaching from the command line isn't offered
    PidNotSupported(String),
    /// No target and no terminal to prompt on
    MissingTarget,
}

impl Cli {
    /// Decide what to do. `stdin_is_terminal` enables the menu when no
    /// target was given.
    pub fn request(&self, stdin_is_terminal: bool) -> Request {
        if let Some(shell) = self.completions {
            return Request::Completions(shell);
        }
        if self.print_config {
            return Request::PrintConfig;
        }
        if let Some(path) = &self.from_file {
            return Request::FromFile(path.clone());
        }
        if self.interactive {
            return Request::Interactive;
        }

        let (mut words, long_in_args) = strip_long_flag(&self.target);
        if words.is_empty() {
            return if stdin_is_terminal {
                Request::Interactive
            } else {
                Request::MissingTarget
            };
        }

        let target = words.remove(0);
        if is_pid(&target) {
            return Request::PidNotSupported(target);
        }

        Request::Run {
            target,
            args: words,
            long_running: self.long || long_in_args,
        }
    }
}

/// Remove every `--long` from `words`, reporting whether one was present
pub fn strip_long_flag(words: &[String]) -> (Vec<String>, bool) {
    let kept: Vec<String> = words
        .iter()
        .filter(|word| word.as_str() != LONG_FLAG)
        .cloned()
        .collect();
    let found = kept.len() != words.len();
    (kept, found)
}

/// A bare run of ASCII digits
pub fn is_pid(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(args: &[&str]) -> Request {
        let mut argv = vec!["crashdetective"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv).request(false)
    }

    #[test]
    fn test_cli_parses_target_and_args() {
        let cli = Cli::parse_from(["crashdetective", "./app", "-n", "3"]);
        assert_eq!(cli.target, vec!["./app", "-n", "3"]);
        assert!(!cli.long);
    }

    #[test]
    fn test_request_run() {
        assert_eq!(
            request(&["./app", "input.txt"]),
            Request::Run {
                target: "./app".to_string(),
                args: vec!["input.txt".to_string()],
                long_running: false,
            }
        );
    }

    #[test]
    fn test_long_flag_among_target_args_is_removed() {
        assert_eq!(
            request(&["./server", "--port", "8080", "--long"]),
            Request::Run {
                target: "./server".to_string(),
                args: vec!["--port".to_string(), "8080".to_string()],
                long_running: true,
            }
        );
    }

    #[test]
    fn test_long_flag_before_target() {
        let cli = Cli::parse_from(["crashdetective", "--long", "./server"]);
        assert!(cli.long);
        assert!(matches!(
            cli.request(false),
            Request::Run { long_running: true, .. }
        ));
    }

    #[test]
    fn test_numeric_first_argument_is_rejected() {
        assert_eq!(
            request(&["1234"]),
            Request::PidNotSupported("1234".to_string())
        );
    }

    #[test]
    fn test_numeric_later_argument_is_fine() {
        assert!(matches!(request(&["./app", "1234"]), Request::Run { .. }));
    }

    #[test]
    fn test_no_target_without_terminal() {
        assert_eq!(request(&[]), Request::MissingTarget);
        assert_eq!(request(&["--long"]), Request::MissingTarget);
    }

    #[test]
    fn test_no_target_with_terminal_is_interactive() {
        let cli = Cli::parse_from(["crashdetective"]);
        assert_eq!(cli.request(true), Request::Interactive);
    }

    #[test]
    fn test_interactive_flag() {
        assert_eq!(request(&["-i"]), Request::Interactive);
    }

    #[test]
    fn test_from_file() {
        assert_eq!(
            request(&["--from-file", "crash.log"]),
            Request::FromFile(PathBuf::from("crash.log"))
        );
    }

    #[test]
    fn test_completions_and_print_config() {
        assert_eq!(
            request(&["--completions", "bash"]),
            Request::Completions(Shell::Bash)
        );
        assert_eq!(request(&["--print-config"]), Request::PrintConfig);
    }

    #[test]
    fn test_cli_parses_options() {
        let cli = Cli::parse_from([
            "crashdetective",
            "--timeout",
            "5",
            "--gdb",
            "/opt/gdb",
            "--strict-signals",
            "-j",
            "-d",
            "-q",
            "--show-frames",
            "./app",
        ]);
        assert_eq!(cli.timeout, Some(5));
        assert_eq!(cli.gdb, Some(PathBuf::from("/opt/gdb")));
        assert!(cli.strict_signals);
        assert!(cli.json);
        assert!(cli.debug);
        assert!(cli.quiet);
        assert!(cli.show_frames);
        assert_eq!(cli.target, vec!["./app"]);
    }

    #[test]
    fn test_options_after_target_belong_to_target() {
        let cli = Cli::parse_from(["crashdetective", "./app", "--json"]);
        assert!(!cli.json);
        assert_eq!(cli.target, vec!["./app", "--json"]);
    }

    #[test]
    fn test_is_pid() {
        assert!(is_pid("42"));
        assert!(!is_pid(""));
        assert!(!is_pid("42a"));
        assert!(!is_pid("./42"));
    }

    #[test]
    fn test_strip_long_flag() {
        let words = vec!["a".to_string(), "--long".to_string(), "b".to_string()];
        let (kept, found) = strip_long_flag(&words);
        assert_eq!(kept, vec!["a", "b"]);
        assert!(found);
        assert!(!strip_long_flag(&kept).1);
    }
}
