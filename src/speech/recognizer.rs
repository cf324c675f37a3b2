//! Speech recognizer interface and HTTP implementation

use crate::config::Config;
use crate::{MochaError, Result};
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};

/// A captured mono clip
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// The recognition seam: one blocking call, one transcript or error back.
pub trait SpeechRecognizer: Send + Sync {
    fn recognize(&self, clip: &AudioClip) -> Result<String>;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Recognizer against an OpenAI-compatible `/audio/transcriptions`
/// endpoint. Owns a small tokio runtime like the completion client; worker
/// threads only.
pub struct HttpRecognizer {
    base_url: String,
    api_key: String,
    model: String,
    language: String,
    timeout: Duration,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpRecognizer {
    pub fn from_config(config: &Config) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| MochaError::Transcription(format!("runtime creation failed: {e}")))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| MochaError::Transcription(format!("http client creation failed: {e}")))?;
        Ok(Self {
            base_url: config.speech.base_url.trim_end_matches('/').to_string(),
            api_key: config.speech.api_key.clone(),
            model: config.speech.model.clone(),
            language: config.speech.language.clone(),
            timeout: config.speech.timeout(),
            http,
            runtime,
        })
    }
}

impl SpeechRecognizer for HttpRecognizer {
    fn recognize(&self, clip: &AudioClip) -> Result<String> {
        if clip.is_empty() {
            return Err(MochaError::Transcription("empty audio clip".into()));
        }

        let wav = encode_wav(clip)?;
        let url = format!("{}/audio/transcriptions", self.base_url);
        debug!(%url, seconds = clip.duration_seconds(), "requesting transcription");

        self.runtime.block_on(async {
            let part = reqwest::multipart::Part::bytes(wav)
                .file_name("clip.wav")
                .mime_str("audio/wav")
                .map_err(|e| MochaError::Transcription(format!("multipart error: {e}")))?;
            let mut form = reqwest::multipart::Form::new()
                .text("model", self.model.clone())
                .part("file", part);
            if !self.language.is_empty() {
                form = form.text("language", self.language.clone());
            }

            let mut request = self.http.post(&url).timeout(self.timeout).multipart(form);
            if !self.api_key.is_empty() {
                request = request.bearer_auth(&self.api_key);
            }

            let response = request
                .send()
                .await
                .map_err(|e| MochaError::Transcription(format!("request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let preview: String = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(500)
                    .collect();
                warn!(%status, %preview, "transcription returned non-success");
                return Err(MochaError::Transcription(format!(
                    "endpoint returned {status}"
                )));
            }

            let parsed: TranscriptionResponse = response
                .json()
                .await
                .map_err(|e| MochaError::Transcription(format!("malformed response: {e}")))?;
            Ok(parsed.text.trim().to_string())
        })
    }
}

/// Encode a clip as 16-bit mono WAV in memory
fn encode_wav(clip: &AudioClip) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| MochaError::Transcription(format!("wav encode error: {e}")))?;
        for &sample in &clip.samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(value)
                .map_err(|e| MochaError::Transcription(format!("wav encode error: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| MochaError::Transcription(format!("wav encode error: {e}")))?;
    }
    Ok(cursor.into_inner())
}
