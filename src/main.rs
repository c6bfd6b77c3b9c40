use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io::{self, IsTerminal, Read};
use std::path::Path;
use std::time::Instant;

use crashdetective::cli::{Cli, Request};
use crashdetective::config::{print_default_config, Config};
use crashdetective::debugger::{output_or_sentinel, DebuggerCommand, InvokeError};
use crashdetective::interactive::{Choice, Prompter};
use crashdetective::interrupt::{Interrupt, FAREWELL};
use crashdetective::monitor::monitor;
use crashdetective::output::{
    format_error, print_debug_command, print_debug_section, print_frames, print_json,
    print_report, print_status,
};
use crashdetective::session::Session;

/// What to run under the debugger
enum Job {
    Launch { target: String, args: Vec<String> },
    Monitor { target: String, args: Vec<String> },
    Attach { pid: i32 },
}

impl Job {
    fn new(target: String, args: Vec<String>, long_running: bool) -> Self {
        if long_running {
            Job::Monitor { target, args }
        } else {
            Job::Launch { target, args }
        }
    }

    fn command(&self) -> DebuggerCommand {
        match self {
            Job::Launch { target, args } | Job::Monitor { target, args } => {
                DebuggerCommand::launch(target, args)
            }
            Job::Attach { pid } => DebuggerCommand::attach(*pid),
        }
    }

    fn describe(&self) -> (&'static str, String) {
        match self {
            Job::Launch { target, .. } => ("Running", format!("{target} under GDB")),
            Job::Monitor { .. } => ("Starting", "long-running session".to_string()),
            Job::Attach { pid } => ("Attaching", format!("to process {pid}")),
        }
    }
}

fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "crashdetective", &mut io::stdout());
}

fn read_saved_output(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read GDB output from stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read GDB output from {}", path.display()))
}

fn build_session(cli: &Cli, interrupt: Interrupt) -> Session {
    let config = Config::load();
    let mut session = Session::from_config(&config, interrupt).with_quiet(cli.quiet);
    if let Some(secs) = cli.timeout {
        session = session.with_timeout_secs(secs);
    }
    if let Some(gdb) = &cli.gdb {
        session = session.with_debugger(gdb);
    }
    if cli.strict_signals {
        session = session.with_strict_signals();
    }
    session
}

fn print_summary(cli: &Cli, session: &Session, output: &str) -> Result<()> {
    let report = session.summarizer().summarize(output);
    if cli.json {
        print_json(&report).context("Failed to serialize report")?;
        return Ok(());
    }

    print_report(&report);
    if cli.show_frames {
        if let Some(details) = report.details() {
            print_frames(details);
        }
    }
    Ok(())
}

fn debug_job(cli: &Cli, session: &Session, job: Job) -> Result<()> {
    let command = job.command();
    if cli.debug {
        print_debug_command(&session.debugger, &command);
    }
    if !session.quiet && !matches!(job, Job::Monitor { .. }) {
        let (verb, detail) = job.describe();
        print_status(verb, &detail);
    }

    let started = Instant::now();
    let result = match &job {
        Job::Launch { target, args } => session.runner().launch(target, args, session.timeout),
        Job::Monitor { target, args } => monitor(session, target, args),
        Job::Attach { pid } => session.runner().attach(*pid),
    };
    log::info!("debugger finished after {:.1?}", started.elapsed());

    match result {
        Ok(output) => {
            if cli.debug {
                print_debug_section(
                    "Raw GDB Output",
                    &output,
                    Some(format!(
                        "({} chars, {} lines, {:.1?})",
                        output.len(),
                        output.lines().count(),
                        started.elapsed()
                    )),
                );
            }
            print_summary(cli, session, &output)
        }
        Err(InvokeError::Interrupted) => {
            println!("{FAREWELL}");
            Ok(())
        }
        Err(err) => {
            let tip = err.tip();
            print_summary(cli, session, &output_or_sentinel(Err(err)))?;
            if let (Some(tip), false) = (tip, cli.json) {
                eprintln!("{} {}", "Tip:".blue().bold(), tip.dimmed());
            }
            Ok(())
        }
    }
}

fn run_interactive(cli: &Cli, session: Session) -> Result<()> {
    let choice = Prompter::stdio()
        .run()
        .context("Failed to read from the terminal")?;

    match choice {
        Choice::Debug {
            binary,
            args,
            long_running,
        } => {
            let session = session.with_long_running(long_running);
            let target = binary.display().to_string();
            debug_job(cli, &session, Job::new(target, args, session.long_running))
        }
        Choice::Attach { pid } => debug_job(cli, &session, Job::Attach { pid }),
        Choice::Exit => {
            println!("{FAREWELL}");
            Ok(())
        }
    }
}

fn missing_target() -> Result<()> {
    bail!(format_error(
        "Please provide a binary to debug.",
        Some("Usage: crashdetective <program> [args...]  (or -i for the menu)"),
    ))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let request = cli.request(io::stdin().is_terminal());

    match request {
        Request::Completions(shell) => {
            print_completions(shell);
            return Ok(());
        }
        Request::PrintConfig => {
            print_default_config();
            return Ok(());
        }
        _ => {}
    }

    let interrupt = Interrupt::new();
    if let Err(err) = interrupt.install(|| {
        println!("\n{FAREWELL}");
        std::process::exit(0);
    }) {
        log::warn!("could not install Ctrl-C handler: {err}");
    }
    let session = build_session(&cli, interrupt);

    match request {
        Request::FromFile(path) => {
            let output = read_saved_output(&path)?;
            if cli.debug {
                print_debug_section(
                    "Saved GDB Output",
                    &output,
                    Some(format!("({})", display_source(&path))),
                );
            }
            print_summary(&cli, &session, &output)
        }
        Request::Interactive => run_interactive(&cli, session),
        Request::Run {
            target,
            args,
            long_running,
        } => {
            let session = session.with_long_running(long_running);
            debug_job(&cli, &session, Job::new(target, args, session.long_running))
        }
        Request::PidNotSupported(pid) => {
            println!("The PID feature will be added soon!");
            println!(
                "{} {}",
                "Tip:".blue().bold(),
                format!("run crashdetective -i and choose option 2 to attach to {pid}").dimmed()
            );
            Ok(())
        }
        Request::MissingTarget => missing_target(),
        Request::Completions(_) | Request::PrintConfig => Ok(()),
    }
}

fn display_source(path: &Path) -> String {
    if path == Path::new("-") {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}
