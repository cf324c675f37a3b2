//! Conversation memory
//!
//! The memory store owns the conversation history, the long-term summary,
//! the user profile and a few counters. It is mutated exclusively by the
//! consuming thread; saves are snapshots handed to a background writer and
//! are best-effort by design.

mod persist;

pub use persist::PersistWriter;

use crate::config::Config;
use crate::text;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: Uuid,
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatEntry {
    pub fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileData {
    pub name: String,
}

/// The persisted memory document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryDoc {
    pub conversation: Vec<ChatEntry>,
    pub summary: String,
    pub profile: ProfileData,
    pub counters: BTreeMap<String, u64>,
}

/// Consuming-thread owner of conversation state.
pub struct MemoryStore {
    doc: MemoryDoc,
    max_history: usize,
    max_summary_chars: usize,
    summarize_enabled: bool,
    mascot_name: String,
    writer: Option<PersistWriter>,
}

impl MemoryStore {
    /// Load the memory file (or start fresh if missing/corrupt) and spawn
    /// the background writer for it.
    pub fn load(path: &Path, config: &Config) -> Self {
        let doc = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "memory file corrupt, starting fresh");
                    MemoryDoc::default()
                }
            },
            Err(_) => MemoryDoc::default(),
        };

        let mut store = Self {
            doc,
            max_history: config.memory.max_history,
            max_summary_chars: config.learning.max_summary_chars,
            summarize_enabled: config.learning.summarize_enabled,
            mascot_name: config.mascot.name.clone(),
            writer: Some(PersistWriter::spawn(path.to_path_buf())),
        };
        store.apply_config(config);
        store
    }

    /// Store without a persistence writer (tests, headless use)
    pub fn in_memory(config: &Config) -> Self {
        Self {
            doc: MemoryDoc::default(),
            max_history: config.memory.max_history,
            max_summary_chars: config.learning.max_summary_chars,
            summarize_enabled: config.learning.summarize_enabled,
            mascot_name: config.mascot.name.clone(),
            writer: None,
        }
    }

    /// Re-derive settings after a configuration swap
    pub fn apply_config(&mut self, config: &Config) {
        self.max_history = config.memory.max_history;
        self.max_summary_chars = config.learning.max_summary_chars;
        self.summarize_enabled = config.learning.summarize_enabled;
        self.mascot_name = config.mascot.name.clone();
        let name = config.profile.user_name.trim();
        if !name.is_empty() {
            self.doc.profile.name = name.to_string();
        }
        self.evict();
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.doc.conversation
    }

    /// Up to `limit` most recent entries, oldest first
    pub fn recent(&self, limit: usize) -> &[ChatEntry] {
        let len = self.doc.conversation.len();
        &self.doc.conversation[len.saturating_sub(limit)..]
    }

    /// Record a completed exchange: the user utterance, then the reply.
    pub fn record_exchange(&mut self, user_text: &str, reply: &str) {
        self.doc
            .conversation
            .push(ChatEntry::new(ChatRole::User, user_text));
        self.doc
            .conversation
            .push(ChatEntry::new(ChatRole::Assistant, reply));
        self.evict();
        if self.summarize_enabled {
            self.append_to_summary(user_text, reply);
        }
        self.schedule_save();
    }

    /// Record a failed turn: the user utterance, then a system fallback.
    pub fn record_failure(&mut self, user_text: &str, notice: &str) {
        self.doc
            .conversation
            .push(ChatEntry::new(ChatRole::User, user_text));
        self.doc
            .conversation
            .push(ChatEntry::new(ChatRole::System, notice));
        self.evict();
        self.schedule_save();
    }

    pub fn clear_conversation(&mut self) {
        self.doc.conversation.clear();
        self.schedule_save();
    }

    pub fn summary(&self) -> &str {
        &self.doc.summary
    }

    pub fn set_summary(&mut self, summary: &str) {
        self.doc.summary = text::truncate_chars(summary.trim(), self.max_summary_chars);
        self.schedule_save();
    }

    pub fn user_name(&self) -> Option<&str> {
        let name = self.doc.profile.name.trim();
        (!name.is_empty()).then_some(name)
    }

    pub fn set_user_name(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.doc.profile.name = name.to_string();
        self.schedule_save();
    }

    pub fn increment_counter(&mut self, key: &str) {
        *self.doc.counters.entry(key.to_string()).or_insert(0) += 1;
        self.schedule_save();
    }

    pub fn counter(&self, key: &str) -> u64 {
        self.doc.counters.get(key).copied().unwrap_or(0)
    }

    /// Plain-append summary update, used in place of an LLM summarizer.
    fn append_to_summary(&mut self, user_text: &str, reply: &str) {
        let addition = format!("・ユーザー: {user_text}\n・{}: {reply}", self.mascot_name);
        let combined = if self.doc.summary.is_empty() {
            addition
        } else {
            format!("{}\n{addition}", self.doc.summary)
        };
        self.doc.summary = text::truncate_chars(&combined, self.max_summary_chars);
    }

    fn evict(&mut self) {
        let len = self.doc.conversation.len();
        if len > self.max_history {
            self.doc.conversation.drain(..len - self.max_history);
        }
    }

    /// Fire-and-forget snapshot to the background writer. Persistence
    /// failures are logged there; nothing here blocks or fails.
    fn schedule_save(&self) {
        if let Some(writer) = &self.writer {
            writer.queue(self.doc.clone());
        }
    }

    /// Shutdown path: queue a final snapshot and wait for the writer to
    /// drain. Best-effort, like every other save.
    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.queue(self.doc.clone());
            writer.finish();
        }
    }
}
