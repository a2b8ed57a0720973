//! Core STT engine trait and implementations.
//!
//! [`SttEngine`] is object-safe and `Send + Sync` so the pipeline can hold it
//! behind an `Arc<dyn SttEngine>` and call it from the blocking pool.
//!
//! * [`WhisperEngine`] wraps a `whisper_rs::WhisperContext`.
//! * [`NoModelStt`] stands in when no model file is installed; every call
//!   fails, so the pipeline falls back to its canned transcript.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::stt::transcribe::TranscribeParams;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SttError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a context or per-call state.
    #[error("Whisper context initialisation failed: {0}")]
    ContextInit(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    /// The recording could not be read or converted.
    #[error("Audio input error: {0}")]
    Audio(String),

    #[error("Audio too short: minimum 0.5 s (8 000 samples at 16 kHz)")]
    AudioTooShort,

    #[error("Audio too long: maximum 60 s (960 000 samples at 16 kHz)")]
    AudioTooLong,

    /// No engine is loaded.
    #[error("speech-to-text unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// SttEngine trait
// ---------------------------------------------------------------------------

/// Speech-to-text over **16 kHz, mono, f32** samples.
pub trait SttEngine: Send + Sync {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SttEngine>) {}
};

/// 0.5 s at 16 kHz.
pub(crate) const MIN_AUDIO_SAMPLES: usize = 8_000;
/// 60 s at 16 kHz.
pub(crate) const MAX_AUDIO_SAMPLES: usize = 960_000;

fn check_length(audio: &[f32]) -> Result<(), SttError> {
    if audio.len() < MIN_AUDIO_SAMPLES {
        return Err(SttError::AudioTooShort);
    }
    if audio.len() > MAX_AUDIO_SAMPLES {
        return Err(SttError::AudioTooLong);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Whisper via `whisper-rs`.  A fresh `WhisperState` is created per call so
/// the engine needs no locking.
pub struct WhisperEngine {
    ctx: WhisperContext,
    params: TranscribeParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs; the model
// weights are read-only after loading.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`] when `model_path` does not exist.
    /// - [`SttError::ContextInit`] when whisper-rs rejects the file.
    pub fn load(model_path: impl AsRef<Path>, params: TranscribeParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!("non-UTF-8 model path: {}", path.display()))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        log::info!("stt: loaded {}", path.display());
        Ok(Self { ctx, params })
    }
}

impl SttEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        check_length(audio)?;

        let strategy = match self.params.beam_size {
            Some(beam_size) => SamplingStrategy::BeamSearch {
                beam_size,
                patience: 1.0,
            },
            None => SamplingStrategy::Greedy { best_of: 1 },
        };

        let mut fp = FullParams::new(strategy);
        let lang = (self.params.language != "auto").then_some(self.params.language.as_str());
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        state
            .full(fp, audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        Ok(text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// NoModelStt
// ---------------------------------------------------------------------------

/// Engine used when the Whisper model could not be loaded.
#[derive(Debug, Clone)]
pub struct NoModelStt {
    reason: String,
}

impl NoModelStt {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SttEngine for NoModelStt {
    fn transcribe(&self, _audio: &[f32]) -> Result<String, SttError> {
        Err(SttError::Unavailable(self.reason.clone()))
    }
}

// ---------------------------------------------------------------------------
// MockSttEngine  (test-only)
// ---------------------------------------------------------------------------

/// Returns a pre-configured response without loading a model.
#[cfg(test)]
pub struct MockSttEngine {
    response: Result<String, SttError>,
}

#[cfg(test)]
impl MockSttEngine {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
        }
    }

    pub fn err(error: SttError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
impl SttEngine for MockSttEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        check_length(audio)?;
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
