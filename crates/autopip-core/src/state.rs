//! Authoritative controller state and its transition handlers.
//!
//! The runtime owns exactly one [`ControllerState`] and mutates it only
//! through the methods below, at handler boundaries. Host requests and
//! timers live in the runtime; this module decides and records.
//!
//! Session credit: `pip_originated_while_inactive` decides whether a
//! session is torn down automatically when the tab becomes visible again.
//! Sessions started by a user gesture in the foreground, or mirrored from
//! another tab while this tab was visible, are never auto-exited.

use serde::{Deserialize, Serialize};

/// Conceptual orchestration phase, derived from the flags plus whatever
/// the runtime has in flight.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipPhase {
    #[default]
    Inactive,
    PendingEnter,
    Active,
    PendingExit,
}

/// Host request currently being awaited by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InFlight {
    Enter,
    Exit,
}

/// How a successful enter request is credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnterCredit {
    /// Requested because the tab went hidden: always self-initiated while hidden.
    HiddenTab,
    /// Requested on an explicit activation (click, media session): credited
    /// by the tab visibility at completion time.
    Activation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    /// Last visibility notification received.
    pub tab_active: bool,
    /// Set by a successful enter or an observed "entered" notification.
    pub pip_believed_active: bool,
    /// Current session was opened by this system while the tab was hidden.
    pub pip_originated_while_inactive: bool,
    /// Consecutive failed enter requests in the current decision cycle.
    pub attempt_count: u32,
}

impl ControllerState {
    pub fn new(tab_active: bool) -> Self {
        Self {
            tab_active,
            ..Self::default()
        }
    }

    /// Mirror a visibility notification.
    pub fn on_visibility(&mut self, visible: bool) {
        self.tab_active = visible;
    }

    /// A settled hidden transition or an explicit activation starts a new
    /// decision cycle with a fresh attempt budget.
    pub fn begin_cycle(&mut self) {
        self.attempt_count = 0;
    }

    /// Whether the enable path may issue a request at all.
    ///
    /// Idempotent: never true while a session is believed active.
    pub fn may_attempt_enter(&self, max_attempts: u32) -> bool {
        !self.pip_believed_active && self.attempt_count < max_attempts
    }

    /// Whether a visible tab should tear down the current session.
    pub fn should_auto_exit(&self) -> bool {
        self.pip_believed_active && self.pip_originated_while_inactive
    }

    pub fn on_enter_succeeded(&mut self, credit: EnterCredit) {
        self.pip_believed_active = true;
        self.pip_originated_while_inactive = match credit {
            EnterCredit::HiddenTab => true,
            EnterCredit::Activation => !self.tab_active,
        };
        self.attempt_count = 0;
    }

    /// Record a rejected enter request. `failures` is the running total of
    /// consecutive rejections in this cycle; saturates at the budget.
    pub fn on_enter_rejected(&mut self, failures: u32, max_attempts: u32) {
        self.attempt_count = failures.min(max_attempts);
    }

    /// Externally observed "entered" notification, from any initiator.
    pub fn on_pip_entered(&mut self) {
        self.pip_believed_active = true;
        self.pip_originated_while_inactive = !self.tab_active;
        self.attempt_count = 0;
    }

    /// Externally observed "exited" notification.
    pub fn on_pip_exited(&mut self) {
        self.clear_session();
    }

    /// Explicit exit succeeded, or the host reported no session to exit.
    pub fn on_exit_completed(&mut self) {
        self.clear_session();
    }

    fn clear_session(&mut self) {
        self.pip_believed_active = false;
        self.pip_originated_while_inactive = false;
        self.attempt_count = 0;
    }

    pub fn phase(&self, in_flight: Option<InFlight>) -> PipPhase {
        match in_flight {
            Some(InFlight::Enter) => PipPhase::PendingEnter,
            Some(InFlight::Exit) => PipPhase::PendingExit,
            None if self.pip_believed_active => PipPhase::Active,
            None => PipPhase::Inactive,
        }
    }
}
