pub mod bridge;
pub mod config;
pub mod llm;
pub mod memory;
pub mod safety;
pub mod speech;
pub mod text;
pub mod turn;
pub mod ui;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum MochaError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MochaError {
    fn from(e: std::io::Error) -> Self {
        MochaError::Io(e.to_string())
    }
}

impl MochaError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Hardware/device errors may require user intervention
            MochaError::AudioDevice(_) => false,
            // These are typically transient errors
            MochaError::Transcription(_) => true,
            MochaError::Inference(_) => true,
            MochaError::Config(_) => false,
            // Persistence is best-effort; the next save may succeed
            MochaError::Persistence(_) => true,
            MochaError::Channel(_) => false,
            MochaError::Io(_) => false,
        }
    }

    /// Get a user-friendly description (shown in the mascot's speech bubble)
    pub fn user_message(&self) -> String {
        match self {
            MochaError::AudioDevice(_) => {
                "音声入力が利用できません。マイクの接続を確認してね。".to_string()
            }
            MochaError::Transcription(_) => {
                "音声認識に失敗しました。もう一度試してね。".to_string()
            }
            MochaError::Inference(_) => {
                "いまLLMに接続できないみたい。推論サーバーが起動しているか確認してね。".to_string()
            }
            MochaError::Config(_) => "設定エラーです。設定内容を確認してね。".to_string(),
            MochaError::Persistence(_) => "記憶の保存に失敗しました。".to_string(),
            MochaError::Channel(_) => {
                "内部通信エラーが発生しました。アプリを再起動してね。".to_string()
            }
            MochaError::Io(_) => "ファイル操作に失敗しました。".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MochaError>;
