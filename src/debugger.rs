//! GDB invocation.
//!
//! Builds the batch-mode GDB command line for launching a program or
//! attaching to a PID, runs it once, and returns everything GDB printed.

use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::interrupt::Interrupt;
use crate::signal::FaultSignal;

/// Default wall-clock limit for launch mode
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pause between checks on the running debugger
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to keep reading GDB's pipes after GDB itself has exited
const READER_GRACE: Duration = Duration::from_secs(2);

/// Answer fed to GDB's stdin in case it asks for confirmation anyway
const CONFIRM_ANSWER: &[u8] = b"y\n";

pub const TIMED_OUT: &str = "Time's up! Program took too long and was stopped.";
pub const NOT_INSTALLED: &str =
    "Oops! GDB is not installed. Please install it with: sudo apt install gdb";
pub const LAUNCH_FAILED_PREFIX: &str = "Whoops! Failed to ";
pub const INTERRUPTED: &str = "Interrupted before the debugger finished.";

/// Errors from running the external debugger.
///
/// The `Display` text of each variant is the sentinel shown in place of
/// debugger output.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("{}", TIMED_OUT)]
    TimedOut,

    #[error("{}", NOT_INSTALLED)]
    NotInstalled,

    #[error("{}{} GDB: {source}", LAUNCH_FAILED_PREFIX, .mode.verb())]
    Launch {
        mode: Mode,
        #[source]
        source: io::Error,
    },

    #[error("{}", INTERRUPTED)]
    Interrupted,
}

impl InvokeError {
    /// Collapse the error into its sentinel text
    pub fn into_text(self) -> String {
        self.to_string()
    }

    /// A hint for the user, if there is one
    pub fn tip(&self) -> Option<&'static str> {
        match self {
            InvokeError::TimedOut => {
                Some("Use --timeout to allow more time, or --long to watch without a limit")
            }
            InvokeError::NotInstalled => Some("Point --gdb (or CRASHDETECTIVE_GDB) at a GDB binary"),
            InvokeError::Launch { mode: Mode::Attach, .. } => {
                Some("Attaching usually needs the same user or ptrace permission")
            }
            InvokeError::Launch { .. } | InvokeError::Interrupted => None,
        }
    }
}

/// Debugger output, or the sentinel text describing why there is none
pub fn output_or_sentinel(result: Result<String, InvokeError>) -> String {
    result.unwrap_or_else(InvokeError::into_text)
}

/// Whether `text` is one of the sentinels produced by [`InvokeError`]
pub fn is_sentinel(text: &str) -> bool {
    let text = text.trim();
    if text.contains('\n') {
        return false;
    }
    text == TIMED_OUT
        || text == NOT_INSTALLED
        || text == INTERRUPTED
        || (text.starts_with(LAUNCH_FAILED_PREFIX) && text.contains(" GDB: "))
}

/// How GDB gets hold of the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Launch,
    Attach,
}

impl Mode {
    fn verb(self) -> &'static str {
        match self {
            Mode::Launch => "run",
            Mode::Attach => "attach",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Launch => write!(f, "launch"),
            Mode::Attach => write!(f, "attach"),
        }
    }
}

// ============================================================================
// Command Line
// ============================================================================

/// GDB argument vector for one batch session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerCommand {
    mode: Mode,
    args: Vec<String>,
}

impl DebuggerCommand {
    /// Start `target` under GDB and print a full backtrace when it stops
    pub fn launch(target: &str, target_args: &[String]) -> Self {
        let mut args = Self::preamble();
        for command in ["run", "bt full", "quit"] {
            push_command(&mut args, command);
        }
        args.push("--args".to_string());
        args.push(target.to_string());
        args.extend(target_args.iter().cloned());

        Self {
            mode: Mode::Launch,
            args,
        }
    }

    /// Attach to `pid`, let it run, and print a full backtrace when it stops
    pub fn attach(pid: i32) -> Self {
        let mut args = Self::preamble();
        push_command(&mut args, &format!("attach {pid}"));
        for command in ["continue", "bt full", "quit"] {
            push_command(&mut args, command);
        }

        Self {
            mode: Mode::Attach,
            args,
        }
    }

    fn preamble() -> Vec<String> {
        let mut args = vec!["--quiet".to_string(), "--nx".to_string()];
        push_command(&mut args, "set pagination off");
        push_command(&mut args, "set confirm off");
        for signal in FaultSignal::HANDLED {
            push_command(&mut args, &format!("handle {} stop print nopass", signal.marker()));
        }
        args
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

fn push_command(args: &mut Vec<String>, command: &str) {
    args.push("-ex".to_string());
    args.push(command.to_string());
}

impl fmt::Display for DebuggerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.is_empty() || arg.contains(char::is_whitespace) {
                    format!("'{arg}'")
                } else {
                    arg.clone()
                }
            })
            .collect();
        write!(f, "{}", quoted.join(" "))
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Runs GDB sessions
#[derive(Debug, Clone)]
pub struct Debugger {
    program: PathBuf,
    poll_interval: Duration,
    interrupt: Interrupt,
}

impl Debugger {
    pub fn new(program: impl Into<PathBuf>, interrupt: Interrupt) -> Self {
        Self {
            program: program.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            interrupt,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Launch `target` under GDB, giving up after `timeout`
    pub fn launch(
        &self,
        target: &str,
        target_args: &[String],
        timeout: Option<Duration>,
    ) -> Result<String, InvokeError> {
        self.run(&DebuggerCommand::launch(target, target_args), timeout, &mut |_| {})
    }

    /// Attach GDB to `pid`; waits for as long as the process keeps running
    pub fn attach(&self, pid: i32) -> Result<String, InvokeError> {
        self.run(&DebuggerCommand::attach(pid), None, &mut |_| {})
    }

    /// Run one GDB session and return stdout followed by stderr.
    ///
    /// `on_tick` is called with the elapsed time after every poll while GDB
    /// is still running.
    pub fn run(
        &self,
        command: &DebuggerCommand,
        timeout: Option<Duration>,
        on_tick: &mut dyn FnMut(Duration),
    ) -> Result<String, InvokeError> {
        let mode = command.mode();
        log::debug!("{} {}", self.program.display(), command);

        let mut cmd = Command::new(&self.program);
        cmd.args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so a timeout can take down the inferior too
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                InvokeError::NotInstalled
            } else {
                InvokeError::Launch { mode, source }
            }
        })?;
        log::info!("started {} (pid {})", self.program.display(), child.id());

        if let Some(mut stdin) = child.stdin.take() {
            // GDB may already be gone; a broken pipe here is harmless
            let _ = stdin.write_all(CONFIRM_ANSWER);
        }
        let stdout = PipeReader::spawn(child.stdout.take());
        let stderr = PipeReader::spawn(child.stderr.take());

        let _active = self.interrupt.enter_child();
        let started = Instant::now();

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    log::info!("debugger finished with {status}");
                    break;
                }
                Ok(None) => {}
                Err(source) => {
                    kill_group(&mut child);
                    return Err(InvokeError::Launch { mode, source });
                }
            }

            if self.interrupt.is_requested() {
                log::warn!("stopping debugger after interrupt");
                kill_group(&mut child);
                return Err(InvokeError::Interrupted);
            }

            let elapsed = started.elapsed();
            if timeout.is_some_and(|limit| elapsed >= limit) {
                log::warn!("debugger still running after {:?}, killing it", elapsed);
                kill_group(&mut child);
                return Err(InvokeError::TimedOut);
            }

            on_tick(elapsed);
            thread::sleep(self.poll_interval);
        }

        let deadline = Instant::now() + READER_GRACE;
        let poll = self.poll_interval.min(READER_GRACE);
        let mut output = finish_reader(stdout, deadline, poll);
        output.push_str(&finish_reader(stderr, deadline, poll));
        Ok(output)
    }
}

/// Drains one of GDB's pipes on its own thread
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl PipeReader {
    fn spawn<R>(pipe: Option<R>) -> Option<Self>
    where
        R: Read + Send + 'static,
    {
        let mut pipe = pipe?;
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => lock_buffer(&sink).extend_from_slice(&chunk[..n]),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => {
                        log::debug!("reading debugger output failed: {err}");
                        break;
                    }
                }
            }
        });
        Some(Self { buf, handle })
    }

    /// Wait until the pipe closes or `deadline` passes, then take what was
    /// read. A background process of the target can keep the pipe open long
    /// after GDB is gone; its reader thread is left behind in that case.
    fn finish(self, deadline: Instant, poll_interval: Duration) -> String {
        while !self.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(poll_interval);
        }
        if self.handle.is_finished() {
            let _ = self.handle.join();
        } else {
            log::warn!("debugger output pipe still open after exit, not waiting for it");
        }
        let bytes = std::mem::take(&mut *lock_buffer(&self.buf));
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn lock_buffer(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(PoisonError::into_inner)
}

fn finish_reader(reader: Option<PipeReader>, deadline: Instant, poll: Duration) -> String {
    reader
        .map(|reader| reader.finish(deadline, poll))
        .unwrap_or_default()
}

/// Kill the debugger, everything in its process group, and reap it
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: kill(2) with a negative pid only signals that process group
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    if let Err(err) = child.wait() {
        log::debug!("reaping debugger failed: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex_commands(command: &DebuggerCommand) -> Vec<&str> {
        command
            .args()
            .windows(2)
            .filter(|pair| pair[0] == "-ex")
            .map(|pair| pair[1].as_str())
            .collect()
    }

    #[test]
    fn test_launch_command_layout() {
        let command = DebuggerCommand::launch("./app", &["--size".to_string(), "3".to_string()]);
        assert_eq!(command.mode(), Mode::Launch);

        let args = command.args();
        assert_eq!(&args[..2], &["--quiet", "--nx"]);
        assert_eq!(
            ex_commands(&command),
            vec![
                "set pagination off",
                "set confirm off",
                "handle SIGSEGV stop print nopass",
                "handle SIGABRT stop print nopass",
                "handle SIGFPE stop print nopass",
                "handle SIGILL stop print nopass",
                "handle SIGBUS stop print nopass",
                "run",
                "bt full",
                "quit",
            ]
        );
        assert_eq!(&args[args.len() - 4..], &["--args", "./app", "--size", "3"]);
    }

    #[test]
    fn test_attach_command_layout() {
        let command = DebuggerCommand::attach(4242);
        assert_eq!(command.mode(), Mode::Attach);
        let ex = ex_commands(&command);
        assert_eq!(&ex[..2], &["set pagination off", "set confirm off"]);
        assert_eq!(&ex[7..], &["attach 4242", "continue", "bt full", "quit"]);
        assert!(!command.args().contains(&"--args".to_string()));
    }

    #[test]
    fn test_command_display_quotes_spaces() {
        let command = DebuggerCommand::attach(7);
        let shown = command.to_string();
        assert!(shown.starts_with("--quiet --nx -ex 'set pagination off'"));
        assert!(shown.contains("-ex continue"));
    }

    #[test]
    fn test_sentinel_texts() {
        assert_eq!(
            InvokeError::TimedOut.into_text(),
            "Time's up! Program took too long and was stopped."
        );
        assert!(InvokeError::NotInstalled.into_text().contains("not installed"));

        let err = InvokeError::Launch {
            mode: Mode::Attach,
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "Whoops! Failed to attach GDB: denied");
        assert!(err.tip().is_some());
    }

    #[test]
    fn test_output_or_sentinel() {
        assert_eq!(output_or_sentinel(Ok("gdb text".to_string())), "gdb text");
        assert!(output_or_sentinel(Err(InvokeError::TimedOut)).starts_with("Time's up"));
    }

    #[test]
    fn test_is_sentinel() {
        let launch = InvokeError::Launch {
            mode: Mode::Launch,
            source: io::Error::new(io::ErrorKind::Other, "exec format error"),
        };
        for err in [
            InvokeError::TimedOut,
            InvokeError::NotInstalled,
            InvokeError::Interrupted,
            launch,
        ] {
            assert!(is_sentinel(&err.into_text()));
        }
        assert!(!is_sentinel("Starting program: /tmp/app"));
        assert!(!is_sentinel(&format!("{TIMED_OUT}\n#0  0x1 in f () at a.c:1")));
    }

    #[test]
    fn test_missing_debugger_is_not_installed() {
        let debugger = Debugger::new("/nonexistent/crashdetective-test-gdb", Interrupt::new());
        let result = debugger.launch("/bin/true", &[], Some(Duration::from_secs(1)));
        assert!(matches!(result, Err(InvokeError::NotInstalled)));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_collects_stdout_then_stderr() {
        // `sh -c <script> <args...>` stands in for GDB here
        let debugger = Debugger::new("/bin/sh", Interrupt::new())
            .with_poll_interval(Duration::from_millis(10));
        let command = DebuggerCommand {
            mode: Mode::Launch,
            args: vec![
                "-c".to_string(),
                "read answer; echo \"out $answer\"; echo err >&2".to_string(),
            ],
        };
        let output = debugger
            .run(&command, Some(Duration::from_secs(10)), &mut |_| {})
            .unwrap();
        assert_eq!(output, "out y\nerr\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_does_not_wait_for_background_children() {
        let debugger = Debugger::new("/bin/sh", Interrupt::new())
            .with_poll_interval(Duration::from_millis(10));
        let command = DebuggerCommand {
            mode: Mode::Launch,
            args: vec!["-c".to_string(), "sleep 20 & echo started".to_string()],
        };
        let started = Instant::now();
        let output = debugger
            .run(&command, Some(Duration::from_secs(10)), &mut |_| {})
            .unwrap();
        assert_eq!(output, "started\n");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_times_out_and_kills() {
        let debugger = Debugger::new("/bin/sh", Interrupt::new())
            .with_poll_interval(Duration::from_millis(10));
        let command = DebuggerCommand {
            mode: Mode::Launch,
            args: vec!["-c".to_string(), "sleep 30".to_string()],
        };
        let started = Instant::now();
        let result = debugger.run(&command, Some(Duration::from_millis(200)), &mut |_| {});
        assert!(matches!(result, Err(InvokeError::TimedOut)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_stops_on_interrupt() {
        let interrupt = Interrupt::new();
        let debugger = Debugger::new("/bin/sh", interrupt.clone())
            .with_poll_interval(Duration::from_millis(10));
        let command = DebuggerCommand {
            mode: Mode::Launch,
            args: vec!["-c".to_string(), "sleep 30".to_string()],
        };
        let mut ticks = 0;
        let result = debugger.run(&command, None, &mut |_| {
            ticks += 1;
            if ticks == 3 {
                interrupt.request();
            }
        });
        assert!(matches!(result, Err(InvokeError::Interrupted)));
        assert!(!interrupt.is_child_active());
    }
}
