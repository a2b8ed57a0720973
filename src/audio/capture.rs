//! Fixed-length microphone recording via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle and streams
//! [`AudioChunk`]s over an mpsc channel while its [`StreamHandle`] lives.
//! [`CpalRecorder`] builds on it to implement [`AudioRecorder`]: capture for
//! a fixed duration, downmix, resample to 16 kHz, write a PCM16 WAV.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::resample::{resample_to_16k, stereo_to_mono, TARGET_RATE};
use super::wav::write_pcm16_wav;
use super::AudioError;

// ---------------------------------------------------------------------------
// AudioChunk / StreamHandle
// ---------------------------------------------------------------------------

/// One buffer of interleaved `f32` samples from the cpal callback.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Keeps the cpal stream alive; dropping it stops capture.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Default input device plus its preferred stream configuration.
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_rate: u32,
    channels: u16,
}

impl AudioCapture {
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;

        Ok(Self {
            device,
            config: supported.into(),
            sample_rate,
            channels,
        })
    }

    /// Start streaming into `tx`.  Send errors (receiver gone) are ignored so
    /// the audio thread never panics.
    pub fn start(&self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamHandle, CaptureError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                });
            },
            |err: cpal::StreamError| {
                log::error!("audio: cpal stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// AudioRecorder trait
// ---------------------------------------------------------------------------

/// Records a fixed-length clip to a mono 16 kHz PCM16 WAV file.
#[async_trait]
pub trait AudioRecorder: Send + Sync {
    async fn record(&self, duration: Duration, dest: &Path) -> Result<(), AudioError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioRecorder>) {}
};

/// [`AudioRecorder`] on the default cpal input device.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalRecorder;

impl CpalRecorder {
    /// Blocking capture; runs on the blocking pool because `cpal::Stream` is
    /// not `Send` on every platform.
    fn capture_blocking(duration: Duration) -> Result<(Vec<f32>, u32), AudioError> {
        let capture = AudioCapture::new()?;
        let (tx, rx) = mpsc::channel();
        let handle = capture.start(tx)?;
        std::thread::sleep(duration);
        drop(handle);

        let channels = capture.channels();
        let interleaved: Vec<f32> = rx.try_iter().flat_map(|c| c.samples).collect();
        Ok((stereo_to_mono(&interleaved, channels), capture.sample_rate()))
    }
}

#[async_trait]
impl AudioRecorder for CpalRecorder {
    async fn record(&self, duration: Duration, dest: &Path) -> Result<(), AudioError> {
        let dest: PathBuf = dest.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let (mono, rate) = Self::capture_blocking(duration)?;
            if mono.is_empty() {
                return Err(AudioError::Empty);
            }
            let samples = resample_to_16k(&mono, rate)?;
            log::debug!(
                "audio: captured {} samples @ {rate} Hz → {} @ 16 kHz",
                mono.len(),
                samples.len()
            );
            write_pcm16_wav(&dest, &samples, TARGET_RATE)
        })
        .await
        .map_err(|e| AudioError::Task(e.to_string()))?
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::MockRecorder;


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
