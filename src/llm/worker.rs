//! Completion worker thread
//!
//! Receives one request per submitted turn and posts exactly one outcome
//! event back through the bridge. Requests are processed sequentially; a
//! backlog is collapsed to the newest request, since the turns behind the
//! older ones are already cancelled at the coordinator.

use super::{ChatMessage, CompletionOptions, LlmClient};
use crate::bridge::{BridgeEvent, BridgeSender};
use crate::turn::TurnId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// One dispatched LLM call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub turn: TurnId,
    pub messages: Vec<ChatMessage>,
    pub options: CompletionOptions,
}

pub struct LlmWorker {
    handle: Option<JoinHandle<()>>,
}

impl LlmWorker {
    /// Spawn the worker thread. Returns the worker and the request sender
    /// handed to the coordinator. The worker exits when the sender side is
    /// dropped.
    pub fn spawn(client: Arc<dyn LlmClient>, bridge: BridgeSender) -> (Self, Sender<CompletionRequest>) {
        let (tx, rx) = unbounded();
        let handle = thread::spawn(move || run(client, rx, bridge));
        (
            Self {
                handle: Some(handle),
            },
            tx,
        )
    }

    /// Wait for the worker to exit (after all request senders are dropped)
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(client: Arc<dyn LlmClient>, rx: Receiver<CompletionRequest>, bridge: BridgeSender) {
    info!("completion worker started");
    while let Ok(mut request) = rx.recv() {
        // Latest-wins: skip requests whose turns a newer submit has already
        // superseded. Their results would be discarded by id mismatch anyway.
        while let Ok(newer) = rx.try_recv() {
            debug!(stale = %request.turn, "skipping superseded completion request");
            request = newer;
        }

        let turn = request.turn;
        match client.complete(&request.messages, &request.options) {
            Ok(text) => {
                debug!(%turn, chars = text.chars().count(), "completion succeeded");
                bridge.send(BridgeEvent::llm_result(turn, text));
            }
            Err(e) => {
                warn!(%turn, error = %e, "completion failed");
                bridge.send(BridgeEvent::llm_failed(turn, e.to_string()));
            }
        }
    }
    info!("completion worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{EventBridge, EventPayload};
    use crate::{MochaError, Result};
    use std::time::Duration;

    struct EchoClient;

    impl LlmClient for EchoClient {
        fn complete(&self, messages: &[ChatMessage], _: &CompletionOptions) -> Result<String> {
            Ok(format!("echo: {}", messages.last().unwrap().content))
        }
    }

    struct FailingClient;

    impl LlmClient for FailingClient {
        fn complete(&self, _: &[ChatMessage], _: &CompletionOptions) -> Result<String> {
            Err(MochaError::Inference("connection refused".into()))
        }
    }

    fn options() -> CompletionOptions {
        CompletionOptions::from_config(&crate::config::Config::default())
    }

    fn wait_for_events(bridge: &EventBridge, count: usize) -> Vec<BridgeEvent> {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while events.len() < count && std::time::Instant::now() < deadline {
            events.extend(bridge.drain());
            thread::sleep(Duration::from_millis(5));
        }
        events
    }

    #[test]
    fn test_success_posts_result_with_turn_id() {
        let (bridge, bridge_tx) = EventBridge::new(64);
        let (worker, tx) = LlmWorker::spawn(Arc::new(EchoClient), bridge_tx);

        let turn = TurnId::new(7);
        tx.send(CompletionRequest {
            turn,
            messages: vec![ChatMessage::user("やあ")],
            options: options(),
        })
        .unwrap();

        let events = wait_for_events(&bridge, 1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].turn, Some(turn));
        assert_eq!(
            events[0].payload,
            EventPayload::LlmResult("echo: やあ".into())
        );

        drop(tx);
        worker.join();
    }

    #[test]
    fn test_failure_posts_failed_event() {
        let (bridge, bridge_tx) = EventBridge::new(64);
        let (worker, tx) = LlmWorker::spawn(Arc::new(FailingClient), bridge_tx);

        tx.send(CompletionRequest {
            turn: TurnId::new(1),
            messages: vec![ChatMessage::user("hi")],
            options: options(),
        })
        .unwrap();

        let events = wait_for_events(&bridge, 1);
        assert!(matches!(events[0].payload, EventPayload::LlmFailed(_)));

        drop(tx);
        worker.join();
    }

    #[test]
    fn test_backlog_collapses_to_newest() {
        let (bridge, bridge_tx) = EventBridge::new(64);

        // Queue several requests before the worker starts, so they form a
        // backlog; only the newest should be answered.
        let (tx, rx) = unbounded();
        for i in 1..=3 {
            tx.send(CompletionRequest {
                turn: TurnId::new(i),
                messages: vec![ChatMessage::user(format!("m{i}"))],
                options: options(),
            })
            .unwrap();
        }
        drop(tx);

        run(Arc::new(EchoClient), rx, bridge_tx);

        let events = bridge.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].turn, Some(TurnId::new(3)));
    }
}
