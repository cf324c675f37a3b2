//! Push-to-talk microphone capture
//!
//! Records from the default input device while the talk gesture is held.
//! Samples are mixed down to mono and accumulated; releasing the gesture
//! takes the whole clip for recognition.

use super::AudioClip;
use crate::{MochaError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Cap the accumulated clip at 60 seconds of audio
const MAX_CAPTURE_SECONDS: usize = 60;

pub struct PushToTalk {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    buffer: Arc<Mutex<Vec<f32>>>,
}

impl PushToTalk {
    /// Open the default input device
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| MochaError::AudioDevice("No input device available".into()))?;

        info!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let config = device
            .default_input_config()
            .map_err(|e| MochaError::AudioDevice(format!("Failed to get input config: {e}")))?
            .into();

        Ok(Self {
            device,
            config,
            stream: None,
            buffer: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Start accumulating; clears anything captured before.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            warn!("already capturing");
            return Ok(());
        }

        let channels = self.config.channels as usize;
        let max_samples = self.config.sample_rate.0 as usize * MAX_CAPTURE_SECONDS;
        let buffer = Arc::clone(&self.buffer);
        buffer.lock().clear();

        let err_fn = |err| {
            error!("Audio input stream error: {err}");
        };

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mut buffer = buffer.lock();
                    if buffer.len() >= max_samples {
                        return;
                    }
                    if channels == 1 {
                        buffer.extend_from_slice(data);
                    } else {
                        // Average all channels to create mono
                        buffer.extend(
                            data.chunks(channels)
                                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                        );
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| MochaError::AudioDevice(format!("Failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| MochaError::AudioDevice(format!("Failed to start input stream: {e}")))?;

        self.stream = Some(stream);
        info!("push-to-talk capture started");
        Ok(())
    }

    /// Stop capturing and take the clip. `None` if nothing was recorded.
    pub fn stop(&mut self) -> Option<AudioClip> {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            info!("push-to-talk capture stopped");
        }
        let samples = std::mem::take(&mut *self.buffer.lock());
        if samples.is_empty() {
            return None;
        }
        Some(AudioClip::new(samples, self.sample_rate()))
    }
}

impl Drop for PushToTalk {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
