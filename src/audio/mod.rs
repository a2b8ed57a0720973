//! Audio in and out: fixed-length recording, resampling, WAV files and
//! playback.
//!
//! # Pipeline
//!
//! ```text
//! record:  cpal callback → AudioChunk (mpsc) → stereo_to_mono
//!          → resample_to_16k (rubato) → write_pcm16_wav
//! play:    synthesized WAV → aplay [-D device]
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::time::Duration;
//! use roverseer::audio::{AudioRecorder, CpalRecorder};
//!
//! #[tokio::main]
//! async fn main() {
//!     CpalRecorder
//!         .record(Duration::from_secs(10), Path::new("/tmp/clip.wav"))
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod capture;
pub mod playback;
pub mod resample;
pub mod wav;

use thiserror::Error;

pub use capture::{AudioCapture, AudioChunk, AudioRecorder, CaptureError, CpalRecorder, StreamHandle};
pub use playback::{AplayPlayer, AudioPlayer};
pub use resample::{resample_to_16k, stereo_to_mono, TARGET_RATE};
pub use wav::{read_wav_mono_f32, write_pcm16_wav, WavData};

#[cfg(test)]
pub use capture::MockRecorder;
#[cfg(test)]
pub use playback::MockPlayer;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Failures while recording, converting or playing audio.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The input stream produced no samples.
    #[error("no audio captured")]
    Empty,

    #[error("resampling failed: {0}")]
    Resample(String),

    /// A WAV file could not be read or written.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// A WAV file used an encoding the transcriber cannot take.
    #[error("unsupported WAV: {0}")]
    Format(String),

    #[error("playback failed: {0}")]
    Playback(String),

    /// The blocking capture task panicked or was cancelled.
    #[error("capture task failed: {0}")]
    Task(String),
}
