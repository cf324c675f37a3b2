//! Conversational turn lifecycle
//!
//! A turn is one user-utterance-to-response exchange. Turns are created and
//! mutated only on the consuming thread; at most one turn is in flight at
//! any instant, enforced by the [`TurnCoordinator`].

mod coordinator;

pub use coordinator::{Outcome, TurnCoordinator};

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::{Duration, Instant};

/// Opaque, monotonically increasing turn identifier.
///
/// Late worker events are matched against the current turn's id; a mismatch
/// renders them inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(u64);

impl TurnId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// Lifecycle state of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Created, LLM call not yet dispatched
    AwaitingInput,
    /// LLM call outstanding
    InFlight,
    /// Reply received and rendered
    Completed,
    /// Superseded by newer input or dismissed by the user
    Cancelled,
    /// Worker failure or deadline expiry
    Failed,
}

impl TurnState {
    /// Terminal states are absorbing: no further transition is ever applied.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TurnState::Completed | TurnState::Cancelled | TurnState::Failed
        )
    }
}

/// Why a turn ended in [`TurnState::Failed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The coordinator's deadline elapsed before any worker event arrived
    Timeout,
    /// The recognizer or LLM call reported an error
    Worker(String),
}

/// One conversational exchange, tracked from submission to its single
/// terminal transition.
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: TurnId,
    pub user_text: String,
    pub started_at: DateTime<Utc>,
    state: TurnState,
    deadline: Instant,
    deadline_fired: bool,
}

impl Turn {
    pub(crate) fn new(id: TurnId, user_text: String, timeout: Duration, now: Instant) -> Self {
        Self {
            id,
            user_text,
            started_at: Utc::now(),
            state: TurnState::AwaitingInput,
            deadline: now + timeout,
            deadline_fired: false,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub(crate) fn begin_flight(&mut self) {
        debug_assert_eq!(self.state, TurnState::AwaitingInput);
        self.state = TurnState::InFlight;
    }

    /// Apply a terminal transition. Returns false (and changes nothing) if
    /// the turn is already terminal, so a turn can only ever end once.
    pub(crate) fn finish(&mut self, terminal: TurnState) -> bool {
        debug_assert!(terminal.is_terminal());
        if self.state.is_terminal() {
            return false;
        }
        self.state = terminal;
        true
    }

    /// One-shot deadline check; true the first time `now` passes the
    /// deadline of an in-flight turn.
    pub(crate) fn try_fire_deadline(&mut self, now: Instant) -> bool {
        if self.state == TurnState::InFlight && !self.deadline_fired && now >= self.deadline {
            self.deadline_fired = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn() -> Turn {
        Turn::new(
            TurnId::new(1),
            "hello".into(),
            Duration::from_millis(100),
            Instant::now(),
        )
    }

    #[test]
    fn test_terminal_transition_applies_once() {
        let mut t = turn();
        t.begin_flight();
        assert!(t.finish(TurnState::Completed));
        assert!(!t.finish(TurnState::Failed));
        assert_eq!(t.state(), TurnState::Completed);
    }

    #[test]
    fn test_deadline_fires_once() {
        let mut t = turn();
        t.begin_flight();
        let late = Instant::now() + Duration::from_secs(1);
        assert!(t.try_fire_deadline(late));
        assert!(!t.try_fire_deadline(late));
    }

    #[test]
    fn test_deadline_does_not_fire_early() {
        let mut t = turn();
        t.begin_flight();
        assert!(!t.try_fire_deadline(Instant::now()));
    }

    #[test]
    fn test_deadline_ignored_after_terminal() {
        let mut t = turn();
        t.begin_flight();
        t.finish(TurnState::Cancelled);
        assert!(!t.try_fire_deadline(Instant::now() + Duration::from_secs(1)));
    }
}
