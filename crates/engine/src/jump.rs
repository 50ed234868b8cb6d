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

//! Jump-skip bookkeeping.
//!
//! While active, the controller ignores every opcode until it has observed a
//! fixed number of `JUMPDEST`s. Stepping over an internal call skips both the
//! callee's entry and the return site; stepping out skips only the return site.

use tracing::trace;

/// `JUMPDEST`s to ignore after stepping over a jump: the callee entry and the return site.
pub const STEP_OVER_JUMPDESTS: usize = 2;

/// `JUMPDEST`s to ignore after leaving a function: the return site.
pub const STEP_OUT_JUMPDESTS: usize = 1;

/// Which stepping command started a skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipKind {
    /// Skip the callee entry and the return site.
    StepOver,
    /// Skip to the return site.
    StepOut,
}

/// Tracks whether the controller is currently skipping jump destinations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JumpSkipManager {
    active: bool,
    remaining: usize,
}

impl JumpSkipManager {
    /// An inactive manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start skipping for a step over. Has no effect while already active.
    pub fn activate_step_over(&mut self) {
        if !self.active {
            self.active = true;
            self.remaining = STEP_OVER_JUMPDESTS;
            trace!(remaining = self.remaining, "Jump skip activated for step over");
        }
    }

    /// Start skipping for a step out, replacing any skip in progress.
    pub fn activate_step_out(&mut self) {
        self.active = true;
        self.remaining = STEP_OUT_JUMPDESTS;
        trace!(remaining = self.remaining, "Jump skip activated for step out");
    }

    /// Start skipping for `kind`.
    pub fn activate(&mut self, kind: SkipKind) {
        match kind {
            SkipKind::StepOver => self.activate_step_over(),
            SkipKind::StepOut => self.activate_step_out(),
        }
    }

    /// Stop skipping.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.remaining = 0;
    }

    /// Record a `JUMPDEST`, deactivating once the count is exhausted.
    pub fn observe_jumpdest(&mut self) {
        if !self.active {
            return;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            trace!("Jump skip finished");
            self.deactivate();
        }
    }

    /// Whether jump destinations are currently being skipped.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// `JUMPDEST`s still to be observed.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_over_needs_two_jumpdests() {
        let mut manager = JumpSkipManager::new();
        manager.activate_step_over();
        assert!(manager.is_active());
        assert_eq!(manager.remaining(), STEP_OVER_JUMPDESTS);

        manager.observe_jumpdest();
        assert!(manager.is_active());
        manager.observe_jumpdest();
        assert!(!manager.is_active());
        assert_eq!(manager.remaining(), 0);
    }

    #[test]
    fn test_step_out_needs_one_jumpdest() {
        let mut manager = JumpSkipManager::new();
        manager.activate_step_out();
        manager.observe_jumpdest();
        assert!(!manager.is_active());
    }

    #[test]
    fn test_step_over_does_not_reset_active_skip() {
        let mut manager = JumpSkipManager::new();
        manager.activate_step_over();
        manager.observe_jumpdest();
        manager.activate_step_over();
        assert_eq!(manager.remaining(), 1);
    }

    #[test]
    fn test_step_out_overrides() {
        let mut manager = JumpSkipManager::new();
        manager.activate_step_over();
        manager.activate_step_out();
        assert_eq!(manager.remaining(), STEP_OUT_JUMPDESTS);
    }

    #[test]
    fn test_activate_by_kind() {
        let mut manager = JumpSkipManager::new();
        manager.activate(SkipKind::StepOver);
        assert_eq!(manager.remaining(), STEP_OVER_JUMPDESTS);
        manager.activate(SkipKind::StepOut);
        assert_eq!(manager.remaining(), STEP_OUT_JUMPDESTS);
    }

    #[test]
    fn test_inactive_ignores_jumpdests() {
        let mut manager = JumpSkipManager::new();
        manager.observe_jumpdest();
        assert!(!manager.is_active());
        assert_eq!(manager, JumpSkipManager::default());

        manager.activate_step_over();
        manager.deactivate();
        assert!(!manager.is_active());
    }
}
