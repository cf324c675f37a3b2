//! Application state — the consuming thread's half of the system
//!
//! `AppState` owns every piece of mutable domain state: the memory store,
//! the turn coordinator, the drain side of the event bridge and the bubble
//! currently on screen. `poll` is the heartbeat the egui update loop calls
//! each frame: it runs the coordinator's deadline check, drains the bridge
//! and applies the resulting outcomes. Workers never touch any of this.

use crate::bridge::{BridgeEvent, BridgeSender, EventBridge};
use crate::config::{self, Config, ConfigHandle};
use crate::llm;
use crate::memory::{ChatRole, MemoryStore};
use crate::safety;
use crate::speech::SpeechRecognizer;
use crate::text;
use crate::turn::{FailureCause, Outcome, TurnCoordinator};
use crate::Result;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The message currently shown in the mascot's speech bubble
#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub text: String,
    pub role: ChatRole,
    pub expires_at: Instant,
}

/// JSON draft edited by the settings panel
pub struct SettingsDraft {
    pub value: serde_json::Value,
    pub selected_tab: usize,
    pub error: Option<String>,
}

pub struct AppState {
    pub config: ConfigHandle,
    pub config_path: PathBuf,
    pub memory: MemoryStore,
    pub coordinator: TurnCoordinator,
    bridge: EventBridge,
    pub bridge_tx: BridgeSender,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,

    pub input_text: String,
    pub bubble: Option<Bubble>,
    pub last_error: Option<String>,
    pub settings: Option<SettingsDraft>,

    /// A recognition worker is outstanding
    pub voice_pending: bool,
    next_auto_talk: Option<Instant>,

    #[cfg(feature = "audio-io")]
    capture: Option<crate::speech::PushToTalk>,
    #[cfg(feature = "audio-io")]
    mic_held: bool,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ConfigHandle,
        config_path: PathBuf,
        memory: MemoryStore,
        coordinator: TurnCoordinator,
        bridge: EventBridge,
        bridge_tx: BridgeSender,
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
    ) -> Self {
        let mut state = Self {
            config,
            config_path,
            memory,
            coordinator,
            bridge,
            bridge_tx,
            recognizer,
            input_text: String::new(),
            bubble: None,
            last_error: None,
            settings: None,
            voice_pending: false,
            next_auto_talk: None,
            #[cfg(feature = "audio-io")]
            capture: crate::speech::PushToTalk::new()
                .map_err(|e| warn!(error = %e, "microphone unavailable"))
                .ok(),
            #[cfg(feature = "audio-io")]
            mic_held: false,
        };
        let snapshot = state.config.snapshot();
        state.reschedule_auto_talk(Instant::now(), &snapshot);
        state
    }

    /// A turn or a recognition is outstanding
    pub fn is_busy(&self) -> bool {
        self.coordinator.is_busy() || self.voice_pending
    }

    /// One iteration of the consuming thread's loop: deadline check, drain,
    /// apply, housekeeping.
    pub fn poll(&mut self, now: Instant) {
        self.coordinator.tick(now);
        for event in self.bridge.drain() {
            if let Some(outcome) = self.coordinator.handle_event(event) {
                self.apply(outcome, now);
            }
        }
        if let Some(bubble) = &self.bubble {
            if now >= bubble.expires_at {
                self.bubble = None;
            }
        }
        self.maybe_auto_talk(now);
    }

    /// Submit whatever is in the input box
    pub fn submit_input(&mut self) {
        let text = std::mem::take(&mut self.input_text);
        self.submit_text(text, Instant::now());
    }

    /// Start a turn for `text`: safety gate, prompt assembly, dispatch.
    pub fn submit_text(&mut self, text: String, now: Instant) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        let snapshot = self.config.snapshot();

        if let Some(reason) = safety::check_text_allowed(&snapshot, &text) {
            self.show_bubble(reason, ChatRole::System, now);
            return;
        }
        if !snapshot.llm.enabled {
            self.show_bubble(
                "LLMが無効になっているよ。設定で llm.enabled を true にしてね。".to_string(),
                ChatRole::System,
                now,
            );
            return;
        }

        self.memory.increment_counter("ask_count");
        let messages = llm::build_messages(&snapshot, &self.memory, &text);
        let id = self.coordinator.submit(text, messages, &snapshot, now);
        debug!(%id, "user input submitted");

        // Thinking indicator until the turn resolves or the bubble expires.
        self.bubble = Some(Bubble {
            text: "…".to_string(),
            role: ChatRole::Assistant,
            expires_at: now + snapshot.net.answer_timeout(),
        });
    }

    /// Dismiss the in-flight turn, if any. A normal action, not an error.
    pub fn cancel_turn(&mut self) {
        if self.coordinator.cancel_current("dismissed by user").is_some() {
            self.bubble = None;
        }
    }

    pub fn clear_conversation(&mut self) {
        self.memory.clear_conversation();
    }

    pub fn open_settings(&mut self) {
        match serde_json::to_value(&*self.config.snapshot()) {
            Ok(value) => {
                self.settings = Some(SettingsDraft {
                    value,
                    selected_tab: 0,
                    error: None,
                });
            }
            Err(e) => warn!(error = %e, "cannot build settings draft"),
        }
    }

    /// Save path for the settings panel: validate the draft, write the
    /// file, then publish through the one reload path. A failure at any
    /// step leaves the live snapshot untouched.
    pub fn save_settings(&mut self, draft: &serde_json::Value) -> Result<()> {
        let config: Config = serde_json::from_value(draft.clone())
            .map_err(|e| crate::MochaError::Config(format!("invalid settings: {e}")))?;
        config.validate()?;
        config::save_to(&self.config_path, &config)?;
        self.config.reload_from(&self.config_path)?;
        self.bridge_tx.send(BridgeEvent::config_reloaded());
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.bridge.shutdown();
        self.memory.flush();
        info!("app state shut down");
    }

    fn apply(&mut self, outcome: Outcome, now: Instant) {
        match outcome {
            Outcome::Reply {
                turn,
                user_text,
                text: reply,
            } => {
                let snapshot = self.config.snapshot();
                let reply = text::truncate_chars(reply.trim(), snapshot.net.answer_max_chars);
                let display = text::sanitize_reply(&reply);
                let display = if display.is_empty() {
                    snapshot.talk.unknown_reply.clone()
                } else {
                    display
                };
                debug!(%turn, "reply rendered");
                self.memory.record_exchange(&user_text, &reply);
                self.show_bubble(display, ChatRole::Assistant, now);
            }
            Outcome::Fallback {
                turn,
                user_text,
                cause,
            } => {
                let notice = match &cause {
                    FailureCause::Timeout => {
                        "返事が間に合わなかったみたい。もう一度話しかけてね。"
                    }
                    FailureCause::Worker(_) => {
                        "いまLLMに接続できないみたい。推論サーバーが起動しているか確認してね。"
                    }
                };
                warn!(%turn, ?cause, "turn failed");
                self.memory.record_failure(&user_text, notice);
                self.show_bubble(notice.to_string(), ChatRole::System, now);
            }
            Outcome::Speech(transcript) => {
                self.voice_pending = false;
                self.submit_text(transcript, now);
            }
            Outcome::SpeechError(detail) => {
                self.voice_pending = false;
                self.show_bubble(detail, ChatRole::System, now);
            }
            Outcome::ConfigApplied => {
                let snapshot = self.config.snapshot();
                self.memory.apply_config(&snapshot);
                self.reschedule_auto_talk(now, &snapshot);
                info!("configuration applied");
            }
            Outcome::Dropped { count } => {
                warn!(count, "event queue overflowed");
                self.last_error = Some(format!("内部イベントを{count}件取りこぼしました。"));
            }
        }
    }

    /// Show a message in the speech bubble; display time scales with length
    /// like the chat bubble it imitates.
    fn show_bubble(&mut self, text: String, role: ChatRole, now: Instant) {
        let snapshot = self.config.snapshot();
        let talk = &snapshot.talk;
        let chars = text.chars().count() as u64;
        let msec = (talk.bubble_time_base_ms + chars * talk.bubble_time_per_char_ms)
            .min(talk.bubble_time_max_ms);
        self.bubble = Some(Bubble {
            text,
            role,
            expires_at: now + Duration::from_millis(msec),
        });
    }

    fn reschedule_auto_talk(&mut self, now: Instant, config: &Config) {
        if !config.talk.enabled || config.talk.messages.is_empty() {
            self.next_auto_talk = None;
            return;
        }
        let min = config.talk.auto_talk_min_sec.min(config.talk.auto_talk_max_sec);
        let max = config.talk.auto_talk_max_sec.max(min);
        let delay = rand::rng().random_range(min..=max);
        self.next_auto_talk = Some(now + Duration::from_secs_f64(delay));
    }

    /// Idle chatter: a random line from the pool, suppressed while anything
    /// else is going on.
    fn maybe_auto_talk(&mut self, now: Instant) {
        let Some(due) = self.next_auto_talk else {
            return;
        };
        if now < due {
            return;
        }
        let snapshot = self.config.snapshot();
        if !self.is_busy() && self.bubble.is_none() {
            if let Some(message) = snapshot.talk.messages.choose(&mut rand::rng()) {
                self.show_bubble(message.clone(), ChatRole::Assistant, now);
            }
        }
        self.reschedule_auto_talk(now, &snapshot);
    }

    /// Whether push-to-talk can work in this build and environment
    #[cfg(feature = "audio-io")]
    pub fn voice_available(&self) -> bool {
        self.recognizer.is_some() && self.capture.is_some()
    }

    #[cfg(not(feature = "audio-io"))]
    pub fn voice_available(&self) -> bool {
        false
    }

    /// Track the mic button's held state across frames; edges start and
    /// stop the capture.
    #[cfg(feature = "audio-io")]
    pub fn set_mic_held(&mut self, held: bool) {
        if held == self.mic_held {
            return;
        }
        self.mic_held = held;
        let now = Instant::now();
        if held {
            self.begin_voice_capture(now);
        } else {
            self.finish_voice_capture(now);
        }
    }

    #[cfg(feature = "audio-io")]
    fn begin_voice_capture(&mut self, now: Instant) {
        let Some(capture) = self.capture.as_mut() else {
            self.show_bubble(
                "音声入力が利用できません。マイクの接続を確認してね。".to_string(),
                ChatRole::System,
                now,
            );
            return;
        };
        match capture.start() {
            Ok(()) => self.show_bubble(
                "録音中…（ボタンを離すと送信）".to_string(),
                ChatRole::System,
                now,
            ),
            Err(e) => self.show_bubble(e.user_message(), ChatRole::System, now),
        }
    }

    #[cfg(feature = "audio-io")]
    fn finish_voice_capture(&mut self, now: Instant) {
        let clip = self.capture.as_mut().and_then(|c| c.stop());
        let Some(clip) = clip else {
            self.show_bubble("音声が取得できませんでした。".to_string(), ChatRole::System, now);
            return;
        };
        let Some(recognizer) = self.recognizer.clone() else {
            self.show_bubble(
                "音声認識が無効になっています。設定を確認してね。".to_string(),
                ChatRole::System,
                now,
            );
            return;
        };
        self.voice_pending = true;
        self.show_bubble("認識中…".to_string(), ChatRole::System, now);
        // Detached: its only output is the bridge event.
        let _ = crate::speech::spawn_recognition(recognizer, clip, self.bridge_tx.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::EventBridge;
    use crate::llm::CompletionRequest;
    use crossbeam_channel::{unbounded, Receiver};

    fn state_with(config: Config) -> (AppState, Receiver<CompletionRequest>) {
        let handle = ConfigHandle::new(config.clone());
        let memory = MemoryStore::in_memory(&config);
        let (bridge, bridge_tx) = EventBridge::new(64);
        let (request_tx, request_rx) = unbounded();
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
        (state, request_rx)
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.talk.enabled = false;
        config
    }

    #[test]
    fn test_completed_turn_records_user_then_assistant() {
        let (mut state, requests) = state_with(quiet_config());
        let now = Instant::now();

        state.submit_text("こんにちは".into(), now);
        let request = requests.try_recv().unwrap();

        state.bridge_tx.send(BridgeEvent::llm_result(request.turn, "こんにちは！"));
        state.poll(now);

        let entries = state.memory.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, ChatRole::User);
        assert_eq!(entries[0].text, "こんにちは");
        assert_eq!(entries[1].role, ChatRole::Assistant);
        assert_eq!(entries[1].text, "こんにちは！");
        assert!(!state.is_busy());
        assert_eq!(state.bubble.as_ref().unwrap().text, "こんにちは！");
    }

    #[test]
    fn test_superseded_turn_leaves_no_trace() {
        let (mut state, requests) = state_with(quiet_config());
        let now = Instant::now();

        state.submit_text("first".into(), now);
        let first = requests.try_recv().unwrap().turn;

        state.submit_text("second".into(), now);
        let second = requests.try_recv().unwrap().turn;
        assert_ne!(first, second);

        // The cancelled turn's late result is inert.
        state.bridge_tx.send(BridgeEvent::llm_result(first, "stale"));
        state.poll(now);
        assert!(state.memory.entries().is_empty());
        assert!(state.is_busy());

        // The live turn proceeds to its own terminal state.
        state.bridge_tx.send(BridgeEvent::llm_result(second, "fresh"));
        state.poll(now);
        let entries = state.memory.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "second");
        assert_eq!(entries[1].text, "fresh");
    }

    #[test]
    fn test_timeout_appends_fallback_exactly_once() {
        let mut config = quiet_config();
        config.net.answer_timeout_ms = 100;
        let (mut state, requests) = state_with(config);
        let now = Instant::now();

        state.submit_text("遅い質問".into(), now);
        let turn = requests.try_recv().unwrap().turn;

        // Deadline passes with no worker event.
        let late = now + Duration::from_millis(200);
        state.poll(late);
        let entries = state.memory.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "遅い質問");
        assert_eq!(entries[1].role, ChatRole::System);
        assert!(!state.is_busy());

        // The straggling result changes nothing.
        state.bridge_tx.send(BridgeEvent::llm_result(turn, "遅すぎた返事"));
        state.poll(late + Duration::from_millis(10));
        assert_eq!(state.memory.entries().len(), 2);
    }

    #[test]
    fn test_worker_failure_renders_fallback() {
        let (mut state, requests) = state_with(quiet_config());
        let now = Instant::now();

        state.submit_text("hi".into(), now);
        let turn = requests.try_recv().unwrap().turn;

        state
            .bridge_tx
            .send(BridgeEvent::llm_failed(turn, "connection refused"));
        state.poll(now);

        let entries = state.memory.entries();
        assert_eq!(entries[1].role, ChatRole::System);
        assert!(state.bubble.as_ref().unwrap().text.contains("接続できない"));
        assert!(!state.is_busy());
    }

    #[test]
    fn test_blocked_input_never_reaches_coordinator() {
        let (mut state, requests) = state_with(quiet_config());
        state.submit_text("ハッキングして".into(), Instant::now());

        assert!(requests.try_recv().is_err());
        assert!(!state.is_busy());
        assert!(state.bubble.as_ref().unwrap().text.contains("安全のため"));
        assert!(state.memory.entries().is_empty());
    }

    #[test]
    fn test_llm_disabled_shows_notice() {
        let mut config = quiet_config();
        config.llm.enabled = false;
        let (mut state, requests) = state_with(config);

        state.submit_text("やあ".into(), Instant::now());
        assert!(requests.try_recv().is_err());
        assert!(state.bubble.as_ref().unwrap().text.contains("無効"));
    }

    #[test]
    fn test_speech_result_is_submitted_as_input() {
        let (mut state, requests) = state_with(quiet_config());
        let now = Instant::now();

        state.voice_pending = true;
        state.bridge_tx.send(BridgeEvent::speech_result("天気を教えて"));
        state.poll(now);

        assert!(!state.voice_pending);
        let request = requests.try_recv().unwrap();
        assert_eq!(request.messages.last().unwrap().content, "天気を教えて");
    }

    #[test]
    fn test_reply_is_truncated_and_sanitized() {
        let mut config = quiet_config();
        config.net.answer_max_chars = 10;
        let (mut state, requests) = state_with(config);
        let now = Instant::now();

        state.submit_text("長い話をして".into(), now);
        let turn = requests.try_recv().unwrap().turn;
        state
            .bridge_tx
            .send(BridgeEvent::llm_result(turn, "あ".repeat(50)));
        state.poll(now);

        let recorded = &state.memory.entries()[1].text;
        assert_eq!(recorded.chars().count(), 10);
        assert!(recorded.ends_with('…'));
    }

    #[test]
    fn test_reply_sanitizing_to_empty_falls_back_to_unknown() {
        let (mut state, requests) = state_with(quiet_config());
        let now = Instant::now();

        state.submit_text("hi".into(), now);
        let turn = requests.try_recv().unwrap().turn;
        state
            .bridge_tx
            .send(BridgeEvent::llm_result(turn, "```internal only```"));
        state.poll(now);

        let expected = Config::default().talk.unknown_reply;
        assert_eq!(state.bubble.as_ref().unwrap().text, expected);
    }

    #[test]
    fn test_bubble_expires() {
        let (mut state, _requests) = state_with(quiet_config());
        let now = Instant::now();

        state.bridge_tx.send(BridgeEvent::speech_failed("だめでした"));
        state.poll(now);
        assert!(state.bubble.is_some());

        state.poll(now + Duration::from_secs(60));
        assert!(state.bubble.is_none());
    }

    #[test]
    fn test_auto_talk_fires_from_pool() {
        let mut config = Config::default();
        config.talk.auto_talk_min_sec = 0.01;
        config.talk.auto_talk_max_sec = 0.01;
        config.talk.messages = vec!["にゃーん".into()];
        let (mut state, _requests) = state_with(config);

        state.poll(Instant::now() + Duration::from_secs(1));
        assert_eq!(state.bubble.as_ref().unwrap().text, "にゃーん");
    }

    #[test]
    fn test_auto_talk_suppressed_while_busy() {
        let mut config = Config::default();
        config.talk.auto_talk_min_sec = 0.01;
        config.talk.auto_talk_max_sec = 0.01;
        let (mut state, _requests) = state_with(config);

        let now = Instant::now();
        state.submit_text("質問".into(), now);
        let thinking = state.bubble.clone();
        state.poll(now + Duration::from_millis(50));
        // Still the thinking indicator, not idle chatter.
        assert_eq!(state.bubble, thinking);
    }

    #[test]
    fn test_queue_overflow_surfaces_diagnostic() {
        let config = quiet_config();
        let handle = ConfigHandle::new(config.clone());
        let memory = MemoryStore::in_memory(&config);
        let (bridge, bridge_tx) = EventBridge::new(2);
        let (request_tx, _request_rx) = unbounded();
        let coordinator = TurnCoordinator::new(request_tx, bridge_tx.clone());
        let mut state = AppState::new(
            handle,
            PathBuf::from("unused.json"),
            memory,
            coordinator,
            bridge,
            bridge_tx,
            None,
        );

        for i in 0..10 {
            state.bridge_tx.send(BridgeEvent::speech_failed(format!("n{i}")));
        }
        state.poll(Instant::now());
        assert!(state.last_error.as_ref().unwrap().contains("取りこぼし"));
    }

    #[test]
    fn test_save_settings_rejects_invalid_draft() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mocha.json");
        let config = quiet_config();
        config::save_to(&path, &config).unwrap();

        let (mut state, _requests) = state_with(config.clone());
        state.config_path = path;

        let mut draft = serde_json::to_value(&config).unwrap();
        crate::config::schema::set_value(
            &mut draft,
            "memory.max_history",
            serde_json::Value::from(0),
        );
        assert!(state.save_settings(&draft).is_err());
        // The live snapshot is untouched.
        assert_eq!(*state.config.snapshot(), config);
    }

    #[test]
    fn test_save_settings_publishes_and_reapplies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mocha.json");
        let config = quiet_config();
        config::save_to(&path, &config).unwrap();

        let (mut state, _requests) = state_with(config.clone());
        state.config_path = path;

        let mut draft = serde_json::to_value(&config).unwrap();
        crate::config::schema::set_value(
            &mut draft,
            "mascot.name",
            serde_json::Value::String("ラテ".into()),
        );
        state.save_settings(&draft).unwrap();
        assert_eq!(state.config.snapshot().mascot.name, "ラテ");

        // The reload event flows through the bridge like any other.
        state.poll(Instant::now());
    }
}
