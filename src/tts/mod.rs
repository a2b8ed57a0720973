//! Text-to-speech: the [`SpeechSynthesizer`] seam, the Piper implementation
//! and the voice catalog.

pub mod piper;
pub mod voices;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

pub use piper::PiperSynth;
pub use voices::{find_voice_files, list_voice_ids, VoiceFiles};

#[derive(Debug, Error)]
pub enum TtsError {
    /// No model/config pair is installed for this voice id.
    #[error("voice not found: {0}")]
    VoiceNotFound(String),

    #[error("cannot read voices directory {path}: {source}")]
    VoicesDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start synthesizer: {0}")]
    Spawn(String),

    #[error("synthesizer failed: {0}")]
    Failed(String),

    #[error("synthesis timed out after {0}s")]
    Timeout(u64),

    #[error("synthesizer I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns text into a WAV file.  The caller owns (and deletes) the file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, voice: &str, text: &str) -> Result<PathBuf, TtsError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechSynthesizer>) {}
};

#[cfg(test)]
pub use mock::MockSynth;
