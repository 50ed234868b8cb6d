// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The `sdb` command line debugger
//!
//! Deploys one contract from the build directory, optionally calls it, and
//! lets the user step through its Solidity source from the terminal.

use std::{
    collections::{HashMap, VecDeque},
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender},
    thread,
};

use alloy_primitives::{Bytes, U256};
use clap::Parser;
use eyre::{eyre, Result};
use sdb_common::{
    env::{SDB_BUILD_DIR, SDB_CONFIG, SDB_PROJECT_ROOT},
    DebugCommand, LineBreakpoint, StackFrame,
};
use sdb_engine::{ChannelHost, DebugSession, DebugTarget, EngineConfig, HostEvent};
use tracing::{debug, info};

mod repl;

use repl::{ReplCommand, HELP};

const PROMPT: &str = "(sdb) ";

#[derive(Debug, Parser)]
#[command(name = "sdb")]
#[command(about = "Solidity Debugger - A source-level step debugger for Solidity contracts")]
#[command(version)]
pub struct Cli {
    /// Project directory that source paths are resolved against
    #[arg(long, env = SDB_PROJECT_ROOT, default_value = ".")]
    pub project_root: PathBuf,

    /// Directory holding compiled contract metadata, relative to the project root
    #[arg(long, env = SDB_BUILD_DIR)]
    pub build_dir: Option<PathBuf>,

    /// Configuration file (default: .sdb.toml in the project root)
    #[arg(long, env = SDB_CONFIG)]
    pub config: Option<PathBuf>,

    /// Hex calldata of a call made to the contract once it is deployed
    #[arg(long)]
    pub calldata: Option<Bytes>,

    /// Wei sent along with the deployment
    #[arg(long)]
    pub value: Option<U256>,

    /// Breakpoint as <file>:<line>, may be repeated
    #[arg(short, long = "break", value_name = "FILE:LINE")]
    pub breakpoints: Vec<LineBreakpoint>,

    /// Name of the contract to deploy and debug
    pub contract: String,
}

/// Everything the main loop reacts to.
#[derive(Debug)]
enum UiEvent {
    Host(HostEvent),
    Input(String),
    InputClosed,
}

fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    sdb_common::logging::init_logging("sdb", true)?;

    let config = load_config(&cli)?;
    let mut session = DebugSession::new(config);

    let artifact = session.loader().find_contract(&cli.contract).ok_or_else(|| {
        eyre!(
            "Contract `{}` not found in {}",
            cli.contract,
            session.loader().build_dir().display()
        )
    })?;
    info!(contract = %artifact.name, file = %artifact.file.display(), "Debugging contract");

    let mut target = DebugTarget::from_artifact(&artifact)?;
    if let Some(calldata) = cli.calldata.clone() {
        target = target.with_call(calldata);
    }
    if let Some(value) = cli.value {
        target = target.with_value(value);
    }

    for breakpoint in &cli.breakpoints {
        session.add_breakpoint(&breakpoint.path, breakpoint.line);
        println!("Breakpoint set at {breakpoint}");
    }

    let (tx, rx) = mpsc::channel();
    let (host, events) = ChannelHost::new();
    spawn_host_forwarder(events, tx.clone())?;
    spawn_input_reader(tx)?;

    session.start(host, target)?;
    run(&session, &rx);

    let outcome = session.join()?;
    debug!(terminated = outcome.terminated, "Session finished");
    Ok(())
}

/// Resolve the configuration from the config file and command line overrides.
fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?.with_project_root(&cli.project_root),
        None => EngineConfig::for_project(&cli.project_root)?,
    };
    Ok(match &cli.build_dir {
        Some(build_dir) => config.with_build_dir(build_dir),
        None => config,
    })
}

fn spawn_host_forwarder(events: Receiver<HostEvent>, tx: Sender<UiEvent>) -> io::Result<()> {
    thread::Builder::new().name("sdb-events".to_string()).spawn(move || {
        for event in events {
            if tx.send(UiEvent::Host(event)).is_err() {
                break;
            }
        }
    })?;
    Ok(())
}

fn spawn_input_reader(tx: Sender<UiEvent>) -> io::Result<()> {
    thread::Builder::new().name("sdb-input".to_string()).spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(UiEvent::Input(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(UiEvent::InputClosed);
    })?;
    Ok(())
}

/// Drive the session until the VM reports that it finished.
fn run(session: &DebugSession, rx: &Receiver<UiEvent>) {
    let mut sources = SourceCache::default();
    let mut driver = Driver::new(session);

    while let Ok(event) = rx.recv() {
        match event {
            UiEvent::Host(HostEvent::Suspended { line, frame }) => {
                sources.print_stop(line, frame.as_ref());
                driver.on_suspended();
                prompt();
            }
            UiEvent::Host(HostEvent::Console(message)) => println!("{message}"),
            UiEvent::Host(HostEvent::Finished(summary)) => {
                println!("{summary}");
                return;
            }
            UiEvent::Input(line) if line.trim().is_empty() => prompt(),
            UiEvent::Input(line) => match line.parse::<ReplCommand>() {
                Ok(ReplCommand::Quit) => driver.stop(),
                Ok(ReplCommand::Debug(command)) => {
                    driver.debug(command);
                    prompt();
                }
                Ok(command) => {
                    execute(session, command);
                    prompt();
                }
                Err(e) => {
                    println!("{e}");
                    prompt();
                }
            },
            UiEvent::InputClosed => {
                debug!("Input closed");
                driver.input_closed();
            }
        }
    }
}

/// Hands stepping commands to the VM one stop at a time.
///
/// Lines typed ahead of the VM are queued, so piped input such as `s\nc\n`
/// applies to consecutive stops. `p`/`pause` and `q`/`quit` bypass the queue.
struct Driver<'a> {
    session: &'a DebugSession,
    parked: bool,
    pending: VecDeque<DebugCommand>,
    input_closed: bool,
    stopping: bool,
}

impl<'a> Driver<'a> {
    fn new(session: &'a DebugSession) -> Self {
        Self { session, parked: false, pending: VecDeque::new(), input_closed: false, stopping: false }
    }

    fn debug(&mut self, command: DebugCommand) {
        if command == DebugCommand::Suspend {
            self.send(command);
        } else if self.parked {
            self.parked = false;
            self.send(command);
        } else {
            debug!(%command, queued = self.pending.len() + 1, "VM running, queueing command");
            self.pending.push_back(command);
        }
    }

    fn on_suspended(&mut self) {
        self.parked = true;
        if let Some(command) = self.pending.pop_front() {
            println!("> {command}");
            self.parked = false;
            self.send(command);
        } else if self.input_closed {
            self.stop();
        }
    }

    /// End of input stops the VM at its next stop. A VM that never stops
    /// again runs to completion.
    fn input_closed(&mut self) {
        self.input_closed = true;
        if self.parked && self.pending.is_empty() {
            self.stop();
        }
    }

    fn stop(&mut self) {
        if std::mem::replace(&mut self.stopping, true) {
            return;
        }
        self.pending.clear();
        self.send(DebugCommand::Stop);
    }

    fn send(&self, command: DebugCommand) {
        if let Err(e) = self.session.send_command(command) {
            debug!("Could not send {command}: {e}");
        }
    }
}

fn execute(session: &DebugSession, command: ReplCommand) {
    match command {
        ReplCommand::Break(bp) => {
            if session.add_breakpoint(&bp.path, bp.line) {
                println!("Breakpoint set at {bp}");
            } else {
                println!("Breakpoint already set at {bp}");
            }
        }
        ReplCommand::Delete(bp) => {
            if session.remove_breakpoint(&bp.path, bp.line) {
                println!("Breakpoint deleted at {bp}");
            } else {
                println!("No breakpoint at {bp}");
            }
        }
        ReplCommand::Skip(bp) => {
            session.skip_breakpoint(&bp.path, bp.line);
            println!("Skipping breakpoint at {bp}");
        }
        ReplCommand::Breakpoints => {
            let breakpoints = session.registry().get_all_breakpoints();
            if breakpoints.is_empty() {
                println!("No breakpoints");
            }
            for bp in breakpoints {
                println!("  {bp}");
            }
        }
        ReplCommand::Backtrace => {
            let frames = session.stack_frames();
            if frames.is_empty() {
                println!("No frames recorded");
            }
            for (index, frame) in frames.iter().rev().enumerate() {
                println!("#{index} {frame}");
            }
        }
        ReplCommand::State => println!("{}", session.state()),
        ReplCommand::Help => println!("{HELP}"),
        // Handled by the driver.
        ReplCommand::Debug(_) | ReplCommand::Quit => {}
    }
}

fn prompt() {
    print!("{PROMPT}");
    let _ = io::stdout().flush();
}

/// Source lines read on demand for printing stops.
#[derive(Debug, Default)]
struct SourceCache {
    files: HashMap<PathBuf, Vec<String>>,
}

impl SourceCache {
    fn line(&mut self, path: &Path, line: usize) -> Option<&str> {
        let lines = self.files.entry(path.to_path_buf()).or_insert_with(|| {
            fs::read_to_string(path)
                .map(|text| text.lines().map(str::to_string).collect())
                .unwrap_or_default()
        });
        lines.get(line.checked_sub(1)?).map(String::as_str)
    }

    fn print_stop(&mut self, line: usize, frame: Option<&StackFrame>) {
        let Some(frame) = frame else {
            println!("Stopped at line {line}");
            return;
        };
        println!("Stopped at {frame}");
        if let Some(text) = frame.file.as_deref().and_then(|file| self.line(file, line)) {
            println!("{line:>5} | {text}");
        }
        for value in frame.values.iter().filter(|value| value.name.starts_with("stack")) {
            println!("        {value}");
        }
    }
}
