//! Configuration document and published snapshots
//!
//! The configuration is a structured JSON file with declared defaults. At
//! runtime it lives behind [`ConfigHandle`] as an immutable `Arc<Config>`
//! snapshot: any thread may read a snapshot lock-free, and only the
//! validate-then-swap reload path publishes a new one. A failed reload
//! leaves the previous snapshot untouched.

pub mod schema;

use crate::{MochaError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "MOCHA_CONFIG";

/// Default config file location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/mocha.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub mascot: MascotSection,
    pub profile: ProfileSection,
    pub talk: TalkSection,
    pub llm: LlmSection,
    pub speech: SpeechSection,
    pub net: NetSection,
    pub memory: MemorySection,
    pub safety: SafetySection,
    pub learning: LearningSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MascotSection {
    /// Display name of the companion
    pub name: String,
}

impl Default for MascotSection {
    fn default() -> Self {
        Self {
            name: "モカ".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProfileSection {
    /// User's name, mirrored into memory when set
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TalkSection {
    pub enabled: bool,
    /// Idle chatter interval bounds, seconds
    pub auto_talk_min_sec: f64,
    pub auto_talk_max_sec: f64,
    /// Idle chatter message pool
    pub messages: Vec<String>,
    /// Shown when a reply sanitizes down to nothing
    pub unknown_reply: String,
    /// Bubble display time: base + per-character, capped
    pub bubble_time_base_ms: u64,
    pub bubble_time_per_char_ms: u64,
    pub bubble_time_max_ms: u64,
}

impl Default for TalkSection {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_talk_min_sec: 30.0,
            auto_talk_max_sec: 120.0,
            messages: vec![
                "にゃーん".to_string(),
                "おつかれさま".to_string(),
                "今日もがんばってるね".to_string(),
                "少し休憩しよ？".to_string(),
            ],
            unknown_reply: "ごめん、今はわからないよ。".to_string(),
            bubble_time_base_ms: 2000,
            bubble_time_per_char_ms: 30,
            bubble_time_max_ms: 15000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub enabled: bool,
    /// OpenAI-compatible endpoint, e.g. LM Studio
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// History entries included in the prompt (user/assistant pairs)
    pub context_turns: usize,
    pub system_prompt: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:1234/v1".to_string(),
            api_key: String::new(),
            model: "gpt-oss-20b".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            context_turns: 10,
            system_prompt: "あなたはデスクトップの猫アシスタント『モカ』です。常に日本語で、簡潔かつ親切に答えてください。"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSection {
    pub enabled: bool,
    /// OpenAI-compatible transcription endpoint
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub language: String,
    pub timeout_ms: u64,
}

impl Default for SpeechSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:1234/v1".to_string(),
            api_key: String::new(),
            model: "whisper-1".to_string(),
            language: "ja".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl SpeechSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetSection {
    /// Reply length cap, characters
    pub answer_max_chars: usize,
    /// Hard deadline for one LLM call
    pub answer_timeout_ms: u64,
}

impl Default for NetSection {
    fn default() -> Self {
        Self {
            answer_max_chars: 220,
            answer_timeout_ms: 45_000,
        }
    }
}

impl NetSection {
    pub fn answer_timeout(&self) -> Duration {
        Duration::from_millis(self.answer_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub path: String,
    /// Conversation entries kept; oldest evicted first
    pub max_history: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            path: "data/memory.json".to_string(),
            max_history: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetySection {
    pub banned_keywords: Vec<String>,
}

impl Default for SafetySection {
    fn default() -> Self {
        Self {
            banned_keywords: vec![
                "違法".to_string(),
                "ハッキング".to_string(),
                "個人情報".to_string(),
                "テロ".to_string(),
                "暴力".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningSection {
    pub summarize_enabled: bool,
    pub max_summary_chars: usize,
}

impl Default for LearningSection {
    fn default() -> Self {
        Self {
            summarize_enabled: true,
            max_summary_chars: 800,
        }
    }
}

impl Config {
    /// Check the invariants a usable configuration must hold. Parsing
    /// catches type errors; this catches values that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.llm.base_url.trim().is_empty() || !self.llm.base_url.starts_with("http") {
            return Err(MochaError::Config(format!(
                "llm.base_url must be an http(s) URL, got {:?}",
                self.llm.base_url
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(MochaError::Config("llm.max_tokens must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(MochaError::Config(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.context_turns == 0 {
            return Err(MochaError::Config(
                "llm.context_turns must be at least 1".into(),
            ));
        }
        if self.speech.enabled
            && (self.speech.base_url.trim().is_empty() || !self.speech.base_url.starts_with("http"))
        {
            return Err(MochaError::Config(format!(
                "speech.base_url must be an http(s) URL, got {:?}",
                self.speech.base_url
            )));
        }
        if self.net.answer_timeout_ms < 100 {
            return Err(MochaError::Config(
                "net.answer_timeout_ms must be at least 100".into(),
            ));
        }
        if self.memory.max_history == 0 {
            return Err(MochaError::Config(
                "memory.max_history must be at least 1".into(),
            ));
        }
        if self.memory.path.trim().is_empty() {
            return Err(MochaError::Config("memory.path must not be empty".into()));
        }
        if self.talk.auto_talk_min_sec <= 0.0
            || self.talk.auto_talk_max_sec < self.talk.auto_talk_min_sec
        {
            return Err(MochaError::Config(
                "talk.auto_talk_min_sec/max_sec must be positive and ordered".into(),
            ));
        }
        if self.learning.max_summary_chars == 0 {
            return Err(MochaError::Config(
                "learning.max_summary_chars must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Config file location: `MOCHA_CONFIG` if set, else the default path
pub fn resolve_path() -> PathBuf {
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

/// Parse and validate the config file at `path`
pub fn read_from(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| MochaError::Config(format!("cannot read {}: {e}", path.display())))?;
    let config: Config = serde_json::from_str(&raw)
        .map_err(|e| MochaError::Config(format!("cannot parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Write `config` to `path` (pretty JSON, via a temp file then rename)
pub fn save_to(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MochaError::Config(format!("cannot create {}: {e}", parent.display())))?;
        }
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| MochaError::Config(format!("cannot serialize config: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .map_err(|e| MochaError::Config(format!("cannot write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| MochaError::Config(format!("cannot rename into {}: {e}", path.display())))?;
    Ok(())
}

/// Startup load: read the file, or initialize it with defaults if missing
pub fn load_or_init(path: &Path) -> Result<Config> {
    if path.exists() {
        return read_from(path);
    }
    warn!(path = %path.display(), "config file missing, writing defaults");
    let config = Config::default();
    save_to(path, &config)?;
    Ok(config)
}

/// Shared pointer to the published configuration snapshot.
///
/// Snapshots are immutable once published, so readers never lock beyond the
/// pointer load. Reloads run only on the consuming thread and replace the
/// whole snapshot, never merging field-by-field.
#[derive(Clone)]
pub struct ConfigHandle {
    published: Arc<RwLock<Arc<Config>>>,
}

impl ConfigHandle {
    pub fn new(config: Config) -> Self {
        Self {
            published: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Current snapshot; cheap (one Arc clone)
    pub fn snapshot(&self) -> Arc<Config> {
        Arc::clone(&self.published.read())
    }

    /// Parse, validate and atomically publish the config at `path`. On any
    /// failure the previously published snapshot stays exactly as it was.
    pub fn reload_from(&self, path: &Path) -> Result<Arc<Config>> {
        let fresh = read_from(path)?;
        let snapshot = Arc::new(fresh);
        *self.published.write() = Arc::clone(&snapshot);
        info!(path = %path.display(), "configuration reloaded");
        Ok(snapshot)
    }
}
