//! Push-to-talk speech input
//!
//! Capture runs while the talk button is held; releasing it hands the clip
//! to a one-shot recognition worker, which posts the transcript (or a
//! failure) into the event bridge.

#[cfg(feature = "audio-io")]
mod capture;
mod recognizer;
mod worker;

#[cfg(feature = "audio-io")]
pub use capture::PushToTalk;
pub use recognizer::{AudioClip, HttpRecognizer, SpeechRecognizer};
pub use worker::spawn_recognition;
