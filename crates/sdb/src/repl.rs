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

//! Line-oriented command input for the interactive session

use std::{fmt::Display, str::FromStr};

use eyre::{bail, Error, Result};
use sdb_common::{DebugCommand, LineBreakpoint};

/// Help text printed by `help`.
pub const HELP: &str = "\
Commands:
  s, step            step into the next line
  n, next            step over the next line
  o, out             step out of the current function
  c, continue        run until the next breakpoint
  p, pause           stop at the next opcode
  b <file>:<line>    add a breakpoint
  d <file>:<line>    delete a breakpoint
  skip <file>:<line> ignore a breakpoint without deleting it
  info               list breakpoints
  bt                 show recorded frames
  state              show the controller state
  h, help            show this help
  q, quit            stop the session";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Forward a command to the controller
    Debug(DebugCommand),
    /// Add a breakpoint
    Break(LineBreakpoint),
    /// Delete a breakpoint
    Delete(LineBreakpoint),
    /// Skip a breakpoint
    Skip(LineBreakpoint),
    /// List breakpoints
    Breakpoints,
    /// Print the recorded frames
    Backtrace,
    /// Print the controller state
    State,
    /// Print the help text
    Help,
    /// Stop the session and exit
    Quit,
}

impl FromStr for ReplCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let Some(word) = words.next() else {
            bail!("Empty command");
        };
        let argument = words.next();
        if words.next().is_some() {
            bail!("Too many arguments: {s}");
        }

        let breakpoint = || -> Result<LineBreakpoint> {
            match argument {
                Some(arg) => arg.parse(),
                None => bail!("`{word}` expects <file>:<line>"),
            }
        };

        let command = match word {
            "s" | "step" => Self::Debug(DebugCommand::StepInto),
            "n" | "next" => Self::Debug(DebugCommand::StepOver),
            "o" | "out" => Self::Debug(DebugCommand::StepOut),
            "c" | "continue" => Self::Debug(DebugCommand::Resume),
            "p" | "pause" => Self::Debug(DebugCommand::Suspend),
            "b" | "break" => Self::Break(breakpoint()?),
            "d" | "delete" => Self::Delete(breakpoint()?),
            "skip" => Self::Skip(breakpoint()?),
            "info" => Self::Breakpoints,
            "bt" | "backtrace" => Self::Backtrace,
            "state" => Self::State,
            "h" | "help" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            other => match other.parse::<DebugCommand>() {
                Ok(DebugCommand::Execute) => bail!("`execute` is sent by the VM, not the user"),
                Ok(DebugCommand::Stop) => Self::Quit,
                Ok(command) => Self::Debug(command),
                Err(_) => bail!("Unknown command `{other}`, type `help` for a list"),
            },
        };

        if argument.is_some()
            && !matches!(command, Self::Break(_) | Self::Delete(_) | Self::Skip(_))
        {
            bail!("`{word}` takes no arguments");
        }
        Ok(command)
    }
}

impl Display for ReplCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug(command) => write!(f, "{command}"),
            Self::Break(bp) => write!(f, "break {bp}"),
            Self::Delete(bp) => write!(f, "delete {bp}"),
            Self::Skip(bp) => write!(f, "skip {bp}"),
            Self::Breakpoints => write!(f, "info"),
            Self::Backtrace => write!(f, "backtrace"),
            Self::State => write!(f, "state"),
            Self::Help => write!(f, "help"),
            Self::Quit => write!(f, "quit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_long_forms() {
        assert_eq!("s".parse::<ReplCommand>().unwrap(), ReplCommand::Debug(DebugCommand::StepInto));
        assert_eq!(
            " next ".parse::<ReplCommand>().unwrap(),
            ReplCommand::Debug(DebugCommand::StepOver)
        );
        assert_eq!("o".parse::<ReplCommand>().unwrap(), ReplCommand::Debug(DebugCommand::StepOut));
        assert_eq!(
            "continue".parse::<ReplCommand>().unwrap(),
            ReplCommand::Debug(DebugCommand::Resume)
        );
        assert_eq!("q".parse::<ReplCommand>().unwrap(), ReplCommand::Quit);
    }

    #[test]
    fn test_wire_names_are_accepted() {
        assert_eq!(
            "stepInto".parse::<ReplCommand>().unwrap(),
            ReplCommand::Debug(DebugCommand::StepInto)
        );
        assert_eq!("stop".parse::<ReplCommand>().unwrap(), ReplCommand::Quit);
        assert!("execute".parse::<ReplCommand>().is_err());
    }

    #[test]
    fn test_breakpoint_arguments() {
        assert_eq!(
            "b Token.sol:12".parse::<ReplCommand>().unwrap(),
            ReplCommand::Break(LineBreakpoint::new("Token.sol", 12))
        );
        assert_eq!(
            "skip Token:3".parse::<ReplCommand>().unwrap(),
            ReplCommand::Skip(LineBreakpoint::new("Token", 3))
        );
        assert!("b".parse::<ReplCommand>().is_err());
        assert!("d Token.sol".parse::<ReplCommand>().is_err());
        assert!("b Token.sol:0".parse::<ReplCommand>().is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("".parse::<ReplCommand>().is_err());
        assert!("jump".parse::<ReplCommand>().is_err());
        assert!("s now".parse::<ReplCommand>().is_err());
        assert!("b A:1 B:2".parse::<ReplCommand>().is_err());
    }
}
