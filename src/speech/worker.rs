//! One-shot recognition worker
//!
//! Runs the blocking recognizer call off the consuming thread and reports
//! the outcome as a bridge event.

use super::{AudioClip, SpeechRecognizer};
use crate::bridge::{BridgeEvent, BridgeSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

pub fn spawn_recognition(
    recognizer: Arc<dyn SpeechRecognizer>,
    clip: AudioClip,
    bridge: BridgeSender,
) -> JoinHandle<()> {
    thread::spawn(move || {
        debug!(seconds = clip.duration_seconds(), "recognizing captured clip");
        match recognizer.recognize(&clip) {
            Ok(text) if !text.trim().is_empty() => {
                bridge.send(BridgeEvent::speech_result(text.trim()));
            }
            Ok(_) => {
                bridge.send(BridgeEvent::speech_failed("音声が聞き取れませんでした。"));
            }
            Err(e) => {
                warn!(error = %e, "recognition failed");
                bridge.send(BridgeEvent::speech_failed(e.user_message()));
            }
        }
    })
}
