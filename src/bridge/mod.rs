//! Cross-thread event bridge
//!
//! Workers (speech recognition, LLM completion, future sensors) run on their
//! own threads and report outcomes as immutable [`BridgeEvent`]s. The bridge
//! queues them and hands them to the single consuming thread in arrival
//! order; all domain effects happen there, never on a worker thread.

use crate::turn::TurnId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Default queue capacity guard. Producers outpacing the consumer beyond
/// this start evicting the oldest droppable events.
pub const DEFAULT_CAPACITY: usize = 256;

/// Payload of an event crossing from a worker thread to the consuming thread
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Push-to-talk recognition produced a transcript
    SpeechResult(String),

    /// Push-to-talk recognition failed (user-facing detail)
    SpeechFailed(String),

    /// The LLM call for a turn produced a reply
    LlmResult(String),

    /// The LLM call for a turn failed (detail for logs)
    LlmFailed(String),

    /// The coordinator's deadline elapsed before a reply arrived
    LlmTimeout,

    /// A new configuration snapshot has been published
    ConfigReloaded,

    /// Diagnostic: the capacity guard evicted `dropped` events
    QueueOverflow { dropped: usize },
}

/// An immutable notification of a worker outcome.
///
/// Ownership transfers fully to the bridge at send time; the producer keeps
/// no reference.
#[derive(Debug, Clone)]
pub struct BridgeEvent {
    /// Correlation token for turn-scoped events
    pub turn: Option<TurnId>,
    /// When the producer constructed the event
    pub at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl BridgeEvent {
    fn new(turn: Option<TurnId>, payload: EventPayload) -> Self {
        Self {
            turn,
            at: Utc::now(),
            payload,
        }
    }

    pub fn speech_result(text: impl Into<String>) -> Self {
        Self::new(None, EventPayload::SpeechResult(text.into()))
    }

    pub fn speech_failed(detail: impl Into<String>) -> Self {
        Self::new(None, EventPayload::SpeechFailed(detail.into()))
    }

    pub fn llm_result(turn: TurnId, text: impl Into<String>) -> Self {
        Self::new(Some(turn), EventPayload::LlmResult(text.into()))
    }

    pub fn llm_failed(turn: TurnId, detail: impl Into<String>) -> Self {
        Self::new(Some(turn), EventPayload::LlmFailed(detail.into()))
    }

    pub fn llm_timeout(turn: TurnId) -> Self {
        Self::new(Some(turn), EventPayload::LlmTimeout)
    }

    pub fn config_reloaded() -> Self {
        Self::new(None, EventPayload::ConfigReloaded)
    }

    fn queue_overflow(dropped: usize) -> Self {
        Self::new(None, EventPayload::QueueOverflow { dropped })
    }

    /// Whether this event carries a turn's terminal outcome. Terminal events
    /// are the last to be evicted under overflow: losing one would strand a
    /// turn in flight until its deadline.
    pub fn is_turn_terminal(&self) -> bool {
        self.turn.is_some()
            && matches!(
                self.payload,
                EventPayload::LlmResult(_) | EventPayload::LlmFailed(_) | EventPayload::LlmTimeout
            )
    }
}

struct Shared {
    queue: Mutex<VecDeque<BridgeEvent>>,
    capacity: usize,
    shut_down: AtomicBool,
}

/// Consumer half of the bridge. Not cloneable: exactly one thread owns the
/// drain side, and only that thread may apply domain effects.
pub struct EventBridge {
    shared: Arc<Shared>,
}

/// Producer half of the bridge. Cheap to clone, sendable to any worker.
#[derive(Clone)]
pub struct BridgeSender {
    shared: Arc<Shared>,
}

impl EventBridge {
    /// Create a bridge with the given capacity guard, returning the consumer
    /// half and a producer handle.
    pub fn new(capacity: usize) -> (Self, BridgeSender) {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
            shut_down: AtomicBool::new(false),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            BridgeSender { shared },
        )
    }

    /// Take all queued events in strict arrival order.
    ///
    /// Must be called from the consuming thread's event loop; the returned
    /// batch is the only path by which worker outcomes reach domain state.
    pub fn drain(&self) -> Vec<BridgeEvent> {
        let mut queue = self.shared.queue.lock();
        queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.lock().is_empty()
    }

    /// Terminal, one-way transition: subsequent sends become silent no-ops.
    pub fn shutdown(&self) {
        self.shared.shut_down.store(true, Ordering::SeqCst);
        debug!("event bridge shut down");
    }
}

impl BridgeSender {
    /// Enqueue an event. Callable from any thread; never blocks the caller
    /// beyond the bounded enqueue itself. After shutdown this is a no-op.
    pub fn send(&self, event: BridgeEvent) {
        if self.shared.shut_down.load(Ordering::SeqCst) {
            debug!(?event.payload, "bridge shut down, event discarded");
            return;
        }

        let mut queue = self.shared.queue.lock();
        let mut dropped_now = 0;
        while queue.len() >= self.shared.capacity {
            Self::evict_one(&mut queue);
            dropped_now += 1;
        }
        if dropped_now > 0 {
            match queue.back_mut() {
                Some(BridgeEvent {
                    payload: EventPayload::QueueOverflow { dropped },
                    ..
                }) => *dropped += dropped_now,
                _ => queue.push_back(BridgeEvent::queue_overflow(dropped_now)),
            }
        }
        queue.push_back(event);
    }

    /// Drop the oldest event that is neither a turn terminal nor an overflow
    /// diagnostic; if every queued event is undroppable, drop the oldest
    /// outright.
    fn evict_one(queue: &mut VecDeque<BridgeEvent>) {
        let victim = queue.iter().position(|e| {
            !e.is_turn_terminal() && !matches!(e.payload, EventPayload::QueueOverflow { .. })
        });
        match victim {
            Some(idx) => {
                queue.remove(idx);
            }
            None => {
                queue.pop_front();
            }
        }
    }
}
