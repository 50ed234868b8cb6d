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

//! Debug sessions
//!
//! A [`DebugSession`] owns everything one debugging run needs: the artifact
//! loader and its caches, the breakpoint registry, and the command channel.
//! [`DebugSession::start`] spawns the VM thread (`sdb-vm`), which deploys the
//! target's init code on an empty in-memory chain with the
//! [`SourceDebugInspector`] attached and, if requested, calls the deployed
//! contract once. Both transactions commit to the same database, so the call
//! sees the storage written by the constructor.
//!
//! The host thread keeps the session and talks to the VM thread only through
//! the command channel, the shared breakpoint registry and the controller
//! handle. Dropping the session stops the VM thread.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use alloy_primitives::{Address, Bytes, U256};
use eyre::{eyre, Result};
use revm::{
    context::{
        result::{ExecutionResult, Output},
        tx::TxEnvBuilder,
        TxEnv,
    },
    database::{CacheDB, EmptyDB},
    primitives::TxKind,
    state::AccountInfo,
    Context, DatabaseRef, InspectCommitEvm, MainBuilder, MainContext,
};
use sdb_common::{BreakpointRegistry, ControllerState, DebugCommand, StackFrame};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    artifact::{normalize_hex, ArtifactLoader, ContractArtifact},
    channel::{ChannelClosed, CommandChannel, CommandSender},
    config::EngineConfig,
    controller::{ControllerHandle, StepController},
    host::DebugHost,
    inspector::SourceDebugInspector,
};

/// Name of the thread running the VM.
pub const VM_THREAD_NAME: &str = "sdb-vm";

/// Errors surfaced by a debug session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The VM rejected or failed to execute a transaction.
    #[error("VM execution failed: {0}")]
    Vm(String),
    /// [`DebugSession::start`] was called twice.
    #[error("debug session already started")]
    AlreadyStarted,
    /// The session has not been started.
    #[error("debug session not started")]
    NotStarted,
    /// The VM thread could not be spawned.
    #[error("failed to spawn VM thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// The VM thread panicked.
    #[error("VM thread panicked")]
    Panicked,
}

/// What to execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugTarget {
    /// Creation code, including any ABI-encoded constructor arguments
    pub init_code: Bytes,
    /// Calldata for one call to the deployed contract
    pub calldata: Option<Bytes>,
    /// Wei sent with the deployment
    pub value: U256,
}

impl DebugTarget {
    /// Deploy `init_code` and do nothing else.
    pub fn new(init_code: impl Into<Bytes>) -> Self {
        Self { init_code: init_code.into(), ..Default::default() }
    }

    /// Deploy the creation bytecode of `artifact`.
    pub fn from_artifact(artifact: &ContractArtifact) -> Result<Self> {
        let hex = artifact
            .bytecode()
            .filter(|code| !code.trim().is_empty())
            .ok_or_else(|| eyre!("Contract {} has no creation bytecode", artifact.name))?;
        let init_code = hex::decode(normalize_hex(hex))
            .map_err(|e| eyre!("Invalid creation bytecode for {}: {e}", artifact.name))?;
        Ok(Self::new(init_code))
    }

    /// Call the deployed contract with `calldata` after deployment.
    pub fn with_call(mut self, calldata: impl Into<Bytes>) -> Self {
        self.calldata = Some(calldata.into());
        self
    }

    /// Send `value` wei with the deployment.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Results of a finished session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Result of the deployment
    pub deployment: ExecutionResult,
    /// Address the contract was deployed at
    pub address: Option<Address>,
    /// Result of the follow-up call, if one was made
    pub call: Option<ExecutionResult>,
    /// Whether the host stopped the session
    pub terminated: bool,
}

impl SessionOutcome {
    /// One-line description for the host.
    pub fn summary(&self) -> String {
        let mut summary = format!("deployment {}", describe(&self.deployment));
        if let Some(address) = self.address {
            summary.push_str(&format!(" at {address}"));
        }
        if let Some(call) = &self.call {
            summary.push_str(&format!(", call {}", describe(call)));
        }
        if self.terminated {
            summary.push_str(" (stopped by host)");
        }
        summary
    }
}

fn describe(result: &ExecutionResult) -> String {
    match result {
        ExecutionResult::Success { output, .. } => {
            format!("succeeded with 0x{}", hex::encode(output.data()))
        }
        ExecutionResult::Revert { output, .. } => format!("reverted with 0x{}", hex::encode(output)),
        ExecutionResult::Halt { reason, .. } => format!("halted: {reason:?}"),
    }
}

/// A debugging run over one [`DebugTarget`].
#[derive(Debug)]
pub struct DebugSession {
    config: EngineConfig,
    loader: Arc<ArtifactLoader>,
    registry: BreakpointRegistry,
    sender: CommandSender,
    channel: Option<CommandChannel>,
    handle: ControllerHandle,
    vm: Option<JoinHandle<Result<SessionOutcome, SessionError>>>,
}

impl DebugSession {
    /// Prepare a session. Nothing executes until [`Self::start`].
    pub fn new(config: EngineConfig) -> Self {
        let loader = Arc::new(ArtifactLoader::new(&config.project_root, &config.build_dir));
        let registry = BreakpointRegistry::new(config.normalizer());
        let (channel, sender) = CommandChannel::new();
        Self {
            config,
            loader,
            registry,
            sender,
            channel: Some(channel),
            handle: ControllerHandle::default(),
            vm: None,
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The artifact loader shared with the VM thread.
    pub fn loader(&self) -> &Arc<ArtifactLoader> {
        &self.loader
    }

    /// The breakpoint registry shared with the VM thread.
    pub fn registry(&self) -> &BreakpointRegistry {
        &self.registry
    }

    /// Spawn the VM thread executing `target`, reporting to `host`.
    pub fn start<H: DebugHost + 'static>(
        &mut self,
        host: H,
        target: DebugTarget,
    ) -> Result<(), SessionError> {
        let channel = self.channel.take().ok_or(SessionError::AlreadyStarted)?;
        let controller =
            StepController::new(Arc::clone(&self.loader), self.registry.clone(), channel, host)
                .with_max_frames(self.config.max_frames);
        self.handle = controller.handle();

        let config = self.config.clone();
        let vm = thread::Builder::new()
            .name(VM_THREAD_NAME.to_string())
            .spawn(move || run_vm(&config, controller, target))?;
        self.vm = Some(vm);

        info!(project_root = %self.config.project_root.display(), "Debug session started");
        Ok(())
    }

    /// Add a line breakpoint. Returns `false` if it already existed.
    pub fn add_breakpoint(&self, path: &str, line: usize) -> bool {
        self.registry.add_breakpoint(path, line)
    }

    /// Remove a line breakpoint. Returns `false` if it did not exist.
    pub fn remove_breakpoint(&self, path: &str, line: usize) -> bool {
        self.registry.remove_breakpoint(path, line)
    }

    /// Keep a breakpoint registered but ignore it.
    pub fn skip_breakpoint(&self, path: &str, line: usize) {
        self.registry.skip_breakpoint(path, line);
    }

    /// Send a command to the controller.
    pub fn send_command(&self, command: DebugCommand) -> Result<(), ChannelClosed> {
        self.sender.send(command)
    }

    /// Another sender for this session's command channel.
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    /// Frames recorded at every stop, oldest first.
    pub fn stack_frames(&self) -> Vec<StackFrame> {
        self.handle.stack_frames()
    }

    /// The frame of the most recent stop.
    pub fn top_frame(&self) -> Option<StackFrame> {
        self.handle.top_frame()
    }

    /// Current controller state.
    pub fn state(&self) -> ControllerState {
        self.handle.state()
    }

    /// Whether the VM thread has exited.
    pub fn is_finished(&self) -> bool {
        self.vm.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// Wait for the VM thread to exit.
    pub fn join(&mut self) -> Result<SessionOutcome, SessionError> {
        let vm = self.vm.take().ok_or(SessionError::NotStarted)?;
        vm.join().map_err(|_| SessionError::Panicked)?
    }

    /// Stop the session, releasing a parked VM thread, and wait for it to exit.
    pub fn stop(&mut self) -> Result<SessionOutcome, SessionError> {
        if self.send_command(DebugCommand::Stop).is_err() {
            debug!("VM thread already gone");
        }
        self.join()
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        if self.vm.is_some() {
            if let Err(e) = self.stop() {
                warn!("Debug session ended with an error: {e}");
            }
        }
    }
}

fn funded_caller() -> AccountInfo {
    AccountInfo { balance: U256::from(u128::MAX), ..Default::default() }
}

fn empty_db(config: &EngineConfig) -> CacheDB<EmptyDB> {
    let mut db = CacheDB::new(EmptyDB::default());
    db.insert_account_info(config.caller, funded_caller());
    db
}

/// Execute `tx` and commit its state changes to `db`.
fn transact_commit<H: DebugHost>(
    inspector: &mut SourceDebugInspector<H>,
    db: &mut CacheDB<EmptyDB>,
    tx: TxEnv,
) -> Result<ExecutionResult, SessionError> {
    let mut evm = Context::mainnet().with_db(db).build_mainnet_with_inspector(inspector);
    evm.inspect_tx_commit(tx).map_err(|e| SessionError::Vm(e.to_string()))
}

fn caller_nonce(db: &CacheDB<EmptyDB>, config: &EngineConfig) -> u64 {
    db.basic_ref(config.caller).ok().flatten().map_or(0, |info| info.nonce)
}

fn run_vm<H: DebugHost>(
    config: &EngineConfig,
    controller: StepController<H>,
    target: DebugTarget,
) -> Result<SessionOutcome, SessionError> {
    let mut inspector = SourceDebugInspector::new(controller);
    inspector
        .controller()
        .host()
        .console(&format!("Deploying {} bytes of init code", target.init_code.len()));

    let mut db = empty_db(config);
    let tx = TxEnvBuilder::new()
        .caller(config.caller)
        .nonce(caller_nonce(&db, config))
        .kind(TxKind::Create)
        .value(target.value)
        .data(target.init_code)
        .gas_limit(config.gas_limit)
        .build_fill();
    let deployment = transact_commit(&mut inspector, &mut db, tx)?;

    let address = match &deployment {
        ExecutionResult::Success { output: Output::Create(code, Some(address)), .. } => {
            info!(%address, size = code.len(), "Contract deployed");
            Some(*address)
        }
        other => {
            warn!("Deployment did not succeed: {}", describe(other));
            None
        }
    };

    let mut call = None;
    if let (Some(address), Some(calldata)) = (address, target.calldata) {
        if inspector.is_terminated() {
            debug!("Skipping follow-up call of a stopped session");
        } else {
            inspector.controller().host().console(&format!("Calling {address}"));
            let tx = TxEnvBuilder::new()
                .caller(config.caller)
                .nonce(caller_nonce(&db, config))
                .call(address)
                .data(calldata)
                .gas_limit(config.gas_limit)
                .build_fill();
            call = Some(transact_commit(&mut inspector, &mut db, tx)?);
        }
    }

    let outcome =
        SessionOutcome { deployment, address, call, terminated: inspector.is_terminated() };
    let summary = outcome.summary();
    info!("{summary}");
    inspector.into_controller().host().finished(&summary);
    Ok(outcome)
}
