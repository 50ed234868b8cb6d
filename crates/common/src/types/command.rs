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

use std::{fmt::Display, str::FromStr};

use eyre::{bail, Error, Result};
use serde::{Deserialize, Serialize};

/// A command delivered to the step controller through the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebugCommand {
    /// Keep running. The tracing harness sends one per opcode.
    Execute,
    /// Stop at the current line and wait for the next command.
    Suspend,
    /// Stop at the next line, entering callees.
    StepInto,
    /// Stop at the next line without entering callees reached through a jump.
    StepOver,
    /// Leave the current internal function.
    StepOut,
    /// Run until the next breakpoint.
    Resume,
    /// Terminate the session and release a parked VM thread.
    Stop,
}

impl DebugCommand {
    /// All commands, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Execute,
        Self::Suspend,
        Self::StepInto,
        Self::StepOver,
        Self::StepOut,
        Self::Resume,
        Self::Stop,
    ];

    /// Stable wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Suspend => "suspend",
            Self::StepInto => "stepInto",
            Self::StepOver => "stepOver",
            Self::StepOut => "stepOut",
            Self::Resume => "resume",
            Self::Stop => "stop",
        }
    }

    /// Whether this command is one of the three stepping commands.
    pub fn is_step(&self) -> bool {
        matches!(self, Self::StepInto | Self::StepOver | Self::StepOut)
    }
}

impl Display for DebugCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DebugCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match Self::ALL.iter().find(|cmd| cmd.as_str().eq_ignore_ascii_case(trimmed)) {
            Some(cmd) => Ok(*cmd),
            None => bail!("Unknown debugger command: {s}"),
        }
    }
}

/// Observable state of the step controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerState {
    /// The VM is executing and the controller only observes.
    #[default]
    Running,
    /// The controller is processing a command for the current opcode.
    AwaitingCommand,
    /// The VM thread is parked at a source line.
    Suspended,
}

impl Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::AwaitingCommand => write!(f, "awaiting command"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_round_trip_names() {
        for cmd in DebugCommand::ALL {
            assert_eq!(cmd.as_str().parse::<DebugCommand>().unwrap(), cmd);
        }
        assert_eq!("STEPOVER".parse::<DebugCommand>().unwrap(), DebugCommand::StepOver);
        assert_eq!(" resume ".parse::<DebugCommand>().unwrap(), DebugCommand::Resume);
    }

    #[test]
    fn test_unknown_command() {
        assert!("jump".parse::<DebugCommand>().is_err());
        assert!("".parse::<DebugCommand>().is_err());
    }

    #[test]
    fn test_is_step() {
        assert!(DebugCommand::StepInto.is_step());
        assert!(DebugCommand::StepOut.is_step());
        assert!(!DebugCommand::Execute.is_step());
        assert!(!DebugCommand::Stop.is_step());
    }
}
