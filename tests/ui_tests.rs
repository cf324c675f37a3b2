//! UI automation tests using egui_kittest and AccessKit
//!
//! These drive the input bar through the accessibility tree: typing into
//! the text field and clicking send must create a turn on the coordinator.

use crossbeam_channel::Receiver;
use egui_kittest::kittest::Queryable;
use egui_kittest::Harness;
use mocha::bridge::EventBridge;
use mocha::config::{Config, ConfigHandle};
use mocha::llm::CompletionRequest;
use mocha::memory::MemoryStore;
use mocha::turn::TurnCoordinator;
use mocha::ui::components::InputBar;
use mocha::ui::{AppState, Theme};
use std::path::PathBuf;

/// Application state wrapper for testing
struct TestApp {
    state: AppState,
    theme: Theme,
    requests: Receiver<CompletionRequest>,
}

impl TestApp {
    fn new() -> Self {
        let mut config = Config::default();
        config.talk.enabled = false;
        let handle = ConfigHandle::new(config.clone());
        let memory = MemoryStore::in_memory(&config);
        let (bridge, bridge_tx) = EventBridge::new(64);
        let (request_tx, requests) = crossbeam_channel::unbounded();
        let coordinator = TurnCoordinator::new(request_tx, bridge_tx.clone());
        let state = AppState::new(
            handle,
            PathBuf::from("unused.json"),
            memory,
            coordinator,
            bridge,
            bridge_tx,
            None,
        );
        Self {
            state,
            theme: Theme::light(),
            requests,
        }
    }
}

fn harness(app: TestApp) -> Harness<'static, TestApp> {
    Harness::builder()
        .with_size(egui::Vec2::new(400.0, 500.0))
        .build_state(
            |ctx, app: &mut TestApp| {
                egui::CentralPanel::default().show(ctx, |ui| {
                    InputBar::show(ui, &mut app.state, &app.theme);
                });
            },
            app,
        )
}

/// Test that the message input field exists and is accessible
#[test]
fn test_message_input_exists() {
    let mut harness = harness(TestApp::new());
    harness.run();

    let _input = harness.get_by_label("Message input");
}

/// Test that the send button exists and is accessible
#[test]
fn test_send_button_exists() {
    let mut harness = harness(TestApp::new());
    harness.run();

    let _button = harness.get_by_label("Send message");
}

/// Test that typing text into the input field works
#[test]
fn test_type_text_into_input() {
    let mut harness = harness(TestApp::new());
    harness.run();

    harness.get_by_label("Message input").focus();
    harness.run();

    harness.get_by_label("Message input").type_text("こんにちは");
    harness.run();

    assert_eq!(harness.state().state.input_text, "こんにちは");
}

/// Test that clicking send dispatches a turn and clears the input
#[test]
fn test_send_dispatches_turn() {
    let mut harness = harness(TestApp::new());
    harness.run();

    harness.get_by_label("Message input").focus();
    harness.run();

    harness.get_by_label("Message input").type_text("テストの質問");
    harness.run();

    harness.get_by_label("Send message").click();
    harness.run();

    let app = harness.state();
    assert!(app.state.input_text.is_empty(), "input clears after sending");
    assert!(app.state.is_busy(), "a turn is now in flight");

    let request = app.requests.try_recv().expect("one completion dispatched");
    assert_eq!(request.messages.last().unwrap().content, "テストの質問");
}
