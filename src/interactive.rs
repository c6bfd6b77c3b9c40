//! Interactive menu and input validation.
//!
//! The prompt loop is generic over its input and output so it can be driven
//! from tests; `main` hands it the terminal.

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Errors from validating user input. All of them lead to a re-prompt.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Please provide a path")]
    EmptyPath,

    #[error("File '{0}' doesn't exist")]
    Missing(String),

    #[error("File '{0}' isn't executable")]
    NotExecutable(String),

    #[error("Please provide a PID")]
    EmptyPid,

    #[error("Please enter a valid number")]
    InvalidPid,

    #[error("Process {0} doesn't exist or no permission")]
    NoSuchProcess(i32),
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Debug {
        binary: PathBuf,
        args: Vec<String>,
        long_running: bool,
    },
    Attach {
        pid: i32,
    },
    Exit,
}

/// Check that `input` names an existing executable file
pub fn validate_binary_path(input: &str) -> Result<PathBuf, InputError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(InputError::EmptyPath);
    }

    let path = Path::new(input);
    if !path.exists() {
        return Err(InputError::Missing(input.to_string()));
    }
    if !is_executable(path) {
        return Err(InputError::NotExecutable(input.to_string()));
    }
    Ok(path.to_path_buf())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Parse a PID typed by the user
pub fn parse_pid(input: &str) -> Result<i32, InputError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(InputError::EmptyPid);
    }
    match input.parse::<i32>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(InputError::InvalidPid),
    }
}

/// Check that `pid` is alive and we may signal it (`kill(pid, 0)`)
#[cfg(unix)]
pub fn probe_pid(pid: i32) -> Result<(), InputError> {
    // SAFETY: signal 0 performs the existence and permission checks only
    let rc = unsafe { libc::kill(pid, 0) };
    if rc == 0 {
        Ok(())
    } else {
        Err(InputError::NoSuchProcess(pid))
    }
}

#[cfg(not(unix))]
pub fn probe_pid(pid: i32) -> Result<(), InputError> {
    Err(InputError::NoSuchProcess(pid))
}

/// Split an argument line on whitespace
pub fn split_args(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Menu-driven prompt loop
pub struct Prompter<R, W> {
    input: R,
    output: W,
    probe: fn(i32) -> Result<(), InputError>,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the terminal. Stdout stays unlocked so the Ctrl-C handler
    /// can still print.
    pub fn stdio() -> Self {
        Prompter::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            probe: probe_pid,
        }
    }

    /// Replace the PID liveness probe
    pub fn with_probe(mut self, probe: fn(i32) -> Result<(), InputError>) -> Self {
        self.probe = probe;
        self
    }

    /// Print `question` and read one trimmed line; `None` at end of input
    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn complain(&mut self, message: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.output, "{} {}", "x".red().bold(), message)
    }

    /// Show the banner and menu, and collect a complete choice.
    ///
    /// End of input at any prompt is treated as [`Choice::Exit`].
    pub fn run(&mut self) -> io::Result<Choice> {
        writeln!(self.output)?;
        writeln!(self.output, "{}", "=".repeat(50))?;
        writeln!(self.output, "{}", "Welcome to Crash Detective!".bold())?;
        writeln!(self.output, "{}", "=".repeat(50))?;
        writeln!(self.output, "I'll help you find those pesky bugs!")?;
        writeln!(self.output)?;

        loop {
            let Some(choice) = self.ask(
                "Choose an option:\n  1) Debug a program\n  2) Attach to running program\n  3) Exit\nYour choice (1/2/3): ",
            )?
            else {
                return Ok(Choice::Exit);
            };

            match choice.as_str() {
                "1" => return self.debug_binary(),
                "2" => return self.attach_process(),
                "3" => return Ok(Choice::Exit),
                _ => self.complain("Please enter 1, 2, or 3")?,
            }
        }
    }

    fn debug_binary(&mut self) -> io::Result<Choice> {
        let binary = loop {
            let Some(line) = self.ask("\nEnter path to your program: ")? else {
                return Ok(Choice::Exit);
            };
            match validate_binary_path(&line) {
                Ok(path) => break path,
                Err(err) => self.complain(err)?,
            }
        };

        let Some(args) = self.ask("Enter arguments (press Enter for none): ")? else {
            return Ok(Choice::Exit);
        };
        let Some(long) = self.ask("Is this a long-running program? (y/N): ")? else {
            return Ok(Choice::Exit);
        };

        Ok(Choice::Debug {
            binary,
            args: split_args(&args),
            long_running: long.eq_ignore_ascii_case("y"),
        })
    }

    fn attach_process(&mut self) -> io::Result<Choice> {
        loop {
            let Some(line) = self.ask("\nEnter PID of the process: ")? else {
                return Ok(Choice::Exit);
            };
            match parse_pid(&line).and_then(|pid| (self.probe)(pid).map(|()| pid)) {
                Ok(pid) => return Ok(Choice::Attach { pid }),
                Err(err) => self.complain(err)?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run_with(input: &str) -> (Choice, String) {
        run_with_probe(input, |_| Ok(()))
    }

    fn run_with_probe(input: &str, probe: fn(i32) -> Result<(), InputError>) -> (Choice, String) {
        let mut output = Vec::new();
        let choice = Prompter::new(Cursor::new(input.as_bytes()), &mut output)
            .with_probe(probe)
            .run()
            .unwrap();
        (choice, String::from_utf8(output).unwrap())
    }

    #[cfg(unix)]
    fn executable_file() -> tempfile::NamedTempFile {
        use std::os::unix::fs::PermissionsExt;
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut perms = file.as_file().metadata().unwrap().permissions();
        perms.set_mode(0o755);
        file.as_file().set_permissions(perms).unwrap();
        file
    }

    #[test]
    fn test_validate_binary_path_empty() {
        assert_eq!(validate_binary_path("   "), Err(InputError::EmptyPath));
    }

    #[test]
    fn test_validate_binary_path_missing() {
        let err = validate_binary_path("/definitely/not/here").unwrap_err();
        assert_eq!(err, InputError::Missing("/definitely/not/here".to_string()));
        assert_eq!(err.to_string(), "File '/definitely/not/here' doesn't exist");
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_binary_path_not_executable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert!(matches!(
            validate_binary_path(path),
            Err(InputError::NotExecutable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_binary_path_directory_is_not_executable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        assert!(matches!(
            validate_binary_path(path),
            Err(InputError::NotExecutable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_binary_path_ok() {
        let file = executable_file();
        let path = file.path().to_str().unwrap();
        assert_eq!(validate_binary_path(path).unwrap(), file.path());
    }

    #[test]
    fn test_parse_pid() {
        assert_eq!(parse_pid(" 1234 "), Ok(1234));
        assert_eq!(parse_pid(""), Err(InputError::EmptyPid));
        assert_eq!(parse_pid("abc"), Err(InputError::InvalidPid));
        assert_eq!(parse_pid("-5"), Err(InputError::InvalidPid));
        assert_eq!(parse_pid("0"), Err(InputError::InvalidPid));
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_pid_self_is_alive() {
        assert_eq!(probe_pid(std::process::id() as i32), Ok(()));
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_pid_missing() {
        // Above the kernel's pid_max ceiling
        assert_eq!(probe_pid(i32::MAX), Err(InputError::NoSuchProcess(i32::MAX)));
    }

    #[test]
    fn test_split_args() {
        assert_eq!(split_args("  -n 3   --fast "), vec!["-n", "3", "--fast"]);
        assert!(split_args("").is_empty());
    }

    #[test]
    fn test_menu_exit() {
        let (choice, output) = run_with("3\n");
        assert_eq!(choice, Choice::Exit);
        assert!(output.contains("Welcome to Crash Detective!"));
    }

    #[test]
    fn test_menu_end_of_input_exits() {
        assert_eq!(run_with("").0, Choice::Exit);
        assert_eq!(run_with("2\n").0, Choice::Exit);
    }

    #[test]
    fn test_menu_rejects_unknown_option() {
        let (choice, output) = run_with("7\nx\n3\n");
        assert_eq!(choice, Choice::Exit);
        assert_eq!(output.matches("Please enter 1, 2, or 3").count(), 2);
    }

    #[test]
    fn test_attach_reprompts_until_valid_pid() {
        let (choice, output) = run_with("2\n\nabc\n4242\n");
        assert_eq!(choice, Choice::Attach { pid: 4242 });
        assert!(output.contains("Please provide a PID"));
        assert!(output.contains("Please enter a valid number"));
    }

    #[test]
    fn test_attach_reprompts_when_probe_fails() {
        fn only_seven(pid: i32) -> Result<(), InputError> {
            if pid == 7 {
                Ok(())
            } else {
                Err(InputError::NoSuchProcess(pid))
            }
        }
        let (choice, output) = run_with_probe("2\n99\n7\n", only_seven);
        assert_eq!(choice, Choice::Attach { pid: 7 });
        assert!(output.contains("Process 99 doesn't exist or no permission"));
    }

    #[cfg(unix)]
    #[test]
    fn test_debug_flow() {
        let file = executable_file();
        let path = file.path().to_str().unwrap().to_string();
        let input = format!("1\n/no/such/program\n{path}\n--size 3\ny\n");
        let (choice, output) = run_with(&input);

        assert!(output.contains("doesn't exist"));
        assert_eq!(
            choice,
            Choice::Debug {
                binary: PathBuf::from(&path),
                args: vec!["--size".to_string(), "3".to_string()],
                long_running: true,
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_debug_flow_defaults_to_short_run() {
        let file = executable_file();
        let path = file.path().to_str().unwrap().to_string();
        let (choice, _) = run_with(&format!("1\n{path}\n\n\n"));
        assert_eq!(
            choice,
            Choice::Debug {
                binary: PathBuf::from(&path),
                args: Vec::new(),
                long_running: false,
            }
        );
    }
}
