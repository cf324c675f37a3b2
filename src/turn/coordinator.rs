//! Turn coordinator state machine
//!
//! Owns the "is a turn currently in flight" question. Submissions dispatch
//! exactly one LLM call through the worker channel; the deadline timer lives
//! here, on the consuming thread, and late or mismatched worker events are
//! discarded by turn-id comparison.

use super::{FailureCause, Turn, TurnId, TurnState};
use crate::bridge::{BridgeEvent, BridgeSender, EventPayload};
use crate::config::Config;
use crate::llm::{ChatMessage, CompletionOptions, CompletionRequest};
use crossbeam_channel::Sender;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Retired turns kept around for diagnostics and tests
const RETIRED_KEPT: usize = 16;

/// What the consuming thread should do after a drained event has been run
/// through the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The in-flight turn completed; render and record the reply
    Reply {
        turn: TurnId,
        user_text: String,
        text: String,
    },
    /// The in-flight turn failed; render and record a fallback
    Fallback {
        turn: TurnId,
        user_text: String,
        cause: FailureCause,
    },
    /// Push-to-talk produced a transcript; treat it as user input
    Speech(String),
    /// Push-to-talk failed; show the detail as a notice
    SpeechError(String),
    /// A new configuration snapshot is live; re-apply derived settings
    ConfigApplied,
    /// The bridge evicted events under pressure
    Dropped { count: usize },
}

pub struct TurnCoordinator {
    next_id: u64,
    /// The single turn pointer: `Some` only while a turn is awaiting input
    /// or in flight. This is what makes two concurrent `InFlight` turns
    /// unrepresentable.
    current: Option<Turn>,
    retired: VecDeque<Turn>,
    requests: Sender<CompletionRequest>,
    bridge: BridgeSender,
}

impl TurnCoordinator {
    pub fn new(requests: Sender<CompletionRequest>, bridge: BridgeSender) -> Self {
        Self {
            next_id: 0,
            current: None,
            retired: VecDeque::with_capacity(RETIRED_KEPT),
            requests,
            bridge,
        }
    }

    /// Start a new turn for `user_text`, cancelling any turn still in
    /// flight first. Never blocks and never fails: if the worker channel is
    /// gone the turn fails through the normal event path.
    ///
    /// `config` is the snapshot captured for this turn; a reload while the
    /// call is outstanding does not affect it.
    pub fn submit(
        &mut self,
        user_text: String,
        messages: Vec<ChatMessage>,
        config: &Config,
        now: Instant,
    ) -> TurnId {
        self.cancel_current("superseded by new input");

        self.next_id += 1;
        let id = TurnId::new(self.next_id);
        let mut turn = Turn::new(id, user_text, config.net.answer_timeout(), now);

        let request = CompletionRequest {
            turn: id,
            messages,
            options: CompletionOptions::from_config(config),
        };
        turn.begin_flight();
        if self.requests.send(request).is_err() {
            warn!(%id, "completion worker unavailable");
            self.bridge
                .send(BridgeEvent::llm_failed(id, "completion worker unavailable"));
        }

        info!(%id, "turn dispatched");
        self.current = Some(turn);
        id
    }

    /// Cancel the current turn, if any. A normal transition, not an error:
    /// its late result (if one ever arrives) is discarded by id mismatch.
    pub fn cancel_current(&mut self, reason: &str) -> Option<TurnId> {
        let mut turn = self.current.take()?;
        if turn.finish(TurnState::Cancelled) {
            debug!(id = %turn.id, reason, "turn cancelled");
        }
        let id = turn.id;
        self.retire(turn);
        Some(id)
    }

    /// Id of the turn currently in flight, if any
    pub fn in_flight(&self) -> Option<TurnId> {
        self.current
            .as_ref()
            .filter(|t| t.state() == TurnState::InFlight)
            .map(|t| t.id)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight().is_some()
    }

    /// Deadline check, driven by the consuming thread's loop. When the
    /// in-flight turn's deadline has elapsed the coordinator synthesizes the
    /// timeout event itself; the (possibly still blocked) worker plays no
    /// part in it.
    pub fn tick(&mut self, now: Instant) {
        if let Some(turn) = self.current.as_mut() {
            if turn.try_fire_deadline(now) {
                debug!(id = %turn.id, "deadline elapsed, synthesizing timeout");
                self.bridge.send(BridgeEvent::llm_timeout(turn.id));
            }
        }
    }

    /// Run one drained event through the state machine. Returns what the
    /// consuming thread should render/record, or `None` for stale events.
    pub fn handle_event(&mut self, event: BridgeEvent) -> Option<Outcome> {
        match event.payload {
            EventPayload::SpeechResult(text) => Some(Outcome::Speech(text)),
            EventPayload::SpeechFailed(detail) => Some(Outcome::SpeechError(detail)),
            EventPayload::ConfigReloaded => Some(Outcome::ConfigApplied),
            EventPayload::QueueOverflow { dropped } => Some(Outcome::Dropped { count: dropped }),
            EventPayload::LlmResult(text) => {
                let turn = self.take_matching(event.turn)?;
                Some(Outcome::Reply {
                    turn: turn.id,
                    user_text: turn.user_text,
                    text,
                })
            }
            EventPayload::LlmFailed(detail) => {
                let turn = self.take_matching_failed(event.turn)?;
                Some(Outcome::Fallback {
                    turn: turn.id,
                    user_text: turn.user_text,
                    cause: FailureCause::Worker(detail),
                })
            }
            EventPayload::LlmTimeout => {
                let turn = self.take_matching_failed(event.turn)?;
                Some(Outcome::Fallback {
                    turn: turn.id,
                    user_text: turn.user_text,
                    cause: FailureCause::Timeout,
                })
            }
        }
    }

    /// Recently retired turns, newest first
    pub fn recently_retired(&self) -> impl Iterator<Item = &Turn> {
        self.retired.iter()
    }

    fn take_matching(&mut self, id: Option<TurnId>) -> Option<Turn> {
        self.take_current_if(id, TurnState::Completed)
    }

    fn take_matching_failed(&mut self, id: Option<TurnId>) -> Option<Turn> {
        self.take_current_if(id, TurnState::Failed)
    }

    /// Match an event's turn id against the current pointer, apply the
    /// terminal transition and retire the turn. Mismatches (late events for
    /// cancelled or finished turns) are logged and ignored.
    fn take_current_if(&mut self, id: Option<TurnId>, terminal: TurnState) -> Option<Turn> {
        let id = id?;
        match self.current.as_ref() {
            Some(turn) if turn.id == id && turn.state() == TurnState::InFlight => {}
            _ => {
                debug!(%id, "stale turn event ignored");
                return None;
            }
        }
        let mut turn = self.current.take()?;
        turn.finish(terminal);
        let snapshot = turn.clone();
        self.retire(turn);
        Some(snapshot)
    }

    fn retire(&mut self, turn: Turn) {
        if self.retired.len() >= RETIRED_KEPT {
            self.retired.pop_back();
        }
        self.retired.push_front(turn);
    }
}
