//! Transcription parameters and the file-based entry point used by the
//! pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::{read_wav_mono_f32, resample_to_16k};
use crate::config::SttConfig;
use crate::stt::engine::{SttEngine, SttError};

/// Settings for one Whisper inference run.
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    /// ISO-639-1 code, or `"auto"` for detection.
    pub language: String,
    /// CPU threads handed to Whisper.
    pub n_threads: i32,
    /// Beam-search width; `None` decodes greedily.
    pub beam_size: Option<i32>,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "en".into(),
            n_threads: optimal_threads(),
            beam_size: None,
        }
    }
}

impl TranscribeParams {
    pub fn from_config(config: &SttConfig) -> Self {
        Self {
            language: config.language.clone(),
            ..Self::default()
        }
    }
}

/// Available parallelism, capped at 8.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

/// Read `path`, convert to 16 kHz mono and transcribe on the blocking pool.
///
/// # Errors
///
/// [`SttError::Audio`] when the file cannot be read or resampled, otherwise
/// whatever the engine reports.
pub async fn transcribe_wav(engine: Arc<dyn SttEngine>, path: &Path) -> Result<String, SttError> {
    let path: PathBuf = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let wav = read_wav_mono_f32(&path).map_err(|e| SttError::Audio(e.to_string()))?;
        let samples =
            resample_to_16k(&wav.samples, wav.sample_rate).map_err(|e| SttError::Audio(e.to_string()))?;
        engine.transcribe(&samples)
    })
    .await
    .map_err(|e| SttError::Transcription(format!("transcription task failed: {e}")))?
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
