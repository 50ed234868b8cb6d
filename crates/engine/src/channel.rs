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

//! Command channel between the host and the VM thread.
//!
//! An unbounded FIFO with a single consumer, the step controller running on
//! the VM thread. The controller itself pushes one [`DebugCommand::Execute`]
//! pulse per opcode; hosts push commands through cloned [`CommandSender`]s.
//! Every envelope remembers who sent it so that a parked controller can skip
//! its own stale pulses without reordering host commands.
//!
//! Dropping the last [`CommandSender`] enqueues [`DebugCommand::Stop`], which
//! guarantees a parked VM thread is released when the host goes away.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc::{self, Receiver, Sender},
    Arc,
};

use sdb_common::DebugCommand;
use thiserror::Error;
use tracing::trace;

/// Who enqueued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    /// The per-opcode pulse pushed by the controller itself.
    Harness,
    /// A host or user action.
    Host,
}

#[derive(Debug, Clone, Copy)]
struct Envelope {
    command: DebugCommand,
    origin: CommandOrigin,
}

/// The VM side is gone and can no longer receive commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("command channel closed")]
pub struct ChannelClosed;

/// Producer handle used by hosts.
#[derive(Debug)]
pub struct CommandSender {
    tx: Sender<Envelope>,
    live: Arc<AtomicUsize>,
}

impl CommandSender {
    /// Enqueue a command.
    pub fn send(&self, command: DebugCommand) -> Result<(), ChannelClosed> {
        trace!(%command, "Host command enqueued");
        self.tx.send(Envelope { command, origin: CommandOrigin::Host }).map_err(|_| ChannelClosed)
    }
}

impl Clone for CommandSender {
    fn clone(&self) -> Self {
        self.live.fetch_add(1, Ordering::SeqCst);
        Self { tx: self.tx.clone(), live: Arc::clone(&self.live) }
    }
}

impl Drop for CommandSender {
    fn drop(&mut self) {
        if self.live.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.tx.send(Envelope { command: DebugCommand::Stop, origin: CommandOrigin::Host });
        }
    }
}

/// Consumer side of the command channel, owned by the step controller.
#[derive(Debug)]
pub struct CommandChannel {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    live: Arc<AtomicUsize>,
}

impl CommandChannel {
    /// Create a channel together with its first host sender.
    pub fn new() -> (Self, CommandSender) {
        let (tx, rx) = mpsc::channel();
        let live = Arc::new(AtomicUsize::new(1));
        let sender = CommandSender { tx: tx.clone(), live: Arc::clone(&live) };
        (Self { tx, rx, live }, sender)
    }

    /// Another host sender for this channel.
    pub fn sender(&self) -> CommandSender {
        self.live.fetch_add(1, Ordering::SeqCst);
        CommandSender { tx: self.tx.clone(), live: Arc::clone(&self.live) }
    }

    /// Enqueue a command on behalf of the controller itself.
    pub fn push(&self, command: DebugCommand) {
        // The receiver lives in `self`, so this cannot fail.
        let _ = self.tx.send(Envelope { command, origin: CommandOrigin::Harness });
    }

    /// Block until the next command arrives.
    pub fn take(&self) -> (DebugCommand, CommandOrigin) {
        match self.rx.recv() {
            Ok(envelope) => (envelope.command, envelope.origin),
            Err(_) => (DebugCommand::Stop, CommandOrigin::Host),
        }
    }

    /// Block until a host command arrives, discarding queued controller pulses.
    pub fn take_from_host(&self) -> DebugCommand {
        loop {
            match self.take() {
                (command, CommandOrigin::Host) => return command,
                (command, CommandOrigin::Harness) => {
                    trace!(%command, "Discarding stale pulse while suspended");
                }
            }
        }
    }

    /// The next command, if one is already queued.
    pub fn try_take(&self) -> Option<(DebugCommand, CommandOrigin)> {
        self.rx.try_recv().ok().map(|envelope| (envelope.command, envelope.origin))
    }

    /// Number of live host senders.
    pub fn live_senders(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}
