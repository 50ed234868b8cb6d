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

//! Host-facing notifications.
//!
//! The controller runs on the VM thread and reports back through a
//! [`DebugHost`]. Hosts that live on another thread can use [`ChannelHost`],
//! which turns every notification into a [`HostEvent`].

use std::sync::mpsc::{self, Receiver, Sender};

use sdb_common::StackFrame;
use tracing::trace;

/// Receiver of controller notifications.
///
/// Methods are called on the VM thread, so implementations must not block for long.
pub trait DebugHost: Send {
    /// The VM stopped at `line`.
    ///
    /// # Arguments
    /// * `line` - 1-based source line, or 0 when no source is available
    /// * `frame` - The frame recorded for this stop, if any
    fn suspended(&self, line: usize, frame: Option<&StackFrame>);

    /// A line of console output produced by the session.
    fn console(&self, message: &str);

    /// The VM finished executing. `summary` describes the outcome.
    fn finished(&self, _summary: &str) {}
}

/// A notification forwarded by [`ChannelHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// See [`DebugHost::suspended`]
    Suspended {
        /// Line the VM stopped at
        line: usize,
        /// Frame recorded for the stop
        frame: Option<StackFrame>,
    },
    /// See [`DebugHost::console`]
    Console(String),
    /// See [`DebugHost::finished`]
    Finished(String),
}

/// A [`DebugHost`] that forwards notifications over an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: Sender<HostEvent>,
}

impl ChannelHost {
    /// Create a host together with the receiving end of its events.
    pub fn new() -> (Self, Receiver<HostEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: HostEvent) {
        if self.tx.send(event).is_err() {
            trace!("Host event receiver dropped");
        }
    }
}

impl DebugHost for ChannelHost {
    fn suspended(&self, line: usize, frame: Option<&StackFrame>) {
        self.forward(HostEvent::Suspended { line, frame: frame.cloned() });
    }

    fn console(&self, message: &str) {
        self.forward(HostEvent::Console(message.to_string()));
    }

    fn finished(&self, summary: &str) {
        self.forward(HostEvent::Finished(summary.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_host_forwards_in_order() {
        let (host, events) = ChannelHost::new();
        host.console("deploying");
        host.suspended(7, None);
        host.finished("success");

        assert_eq!(events.recv().unwrap(), HostEvent::Console("deploying".into()));
        assert_eq!(events.recv().unwrap(), HostEvent::Suspended { line: 7, frame: None });
        assert_eq!(events.recv().unwrap(), HostEvent::Finished("success".into()));
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (host, events) = ChannelHost::new();
        drop(events);
        host.console("nobody listens");
    }
}
