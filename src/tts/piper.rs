//! Piper subprocess synthesizer.
//!
//! ```text
//! piper --model <voice>.onnx --config <voice>.onnx.json --output_file <tmp>.wav
//!       stdin ← reply text
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::voices::find_voice_files;
use super::{SpeechSynthesizer, TtsError};
use crate::config::TtsConfig;

/// [`SpeechSynthesizer`] backed by the `piper` CLI.
#[derive(Debug, Clone)]
pub struct PiperSynth {
    binary: PathBuf,
    voices_dir: PathBuf,
    out_dir: PathBuf,
    timeout: Duration,
}

impl PiperSynth {
    /// `out_dir` receives the generated WAV files; callers delete them after
    /// playback.
    pub fn from_config(config: &TtsConfig, out_dir: &Path) -> Self {
        Self {
            binary: config.piper_binary.clone(),
            voices_dir: config.voices_dir.clone(),
            out_dir: out_dir.to_path_buf(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn output_path(&self) -> PathBuf {
        self.out_dir
            .join(format!("{}.wav", uuid::Uuid::new_v4().simple()))
    }

    async fn run(&self, model: &Path, config: &Path, text: &str, out: &Path) -> Result<(), TtsError> {
        let mut child = Command::new(&self.binary)
            .arg("--model")
            .arg(model)
            .arg("--config")
            .arg(config)
            .arg("--output_file")
            .arg(out)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TtsError::Spawn(format!("{}: {e}", self.binary.display())))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TtsError::Failed(format!(
                "piper exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechSynthesizer for PiperSynth {
    async fn synthesize(&self, voice: &str, text: &str) -> Result<PathBuf, TtsError> {
        let files = find_voice_files(&self.voices_dir, voice)?;
        let out = self.output_path();

        log::debug!("tts: {voice} → {}", out.display());

        match tokio::time::timeout(self.timeout, self.run(&files.model, &files.config, text, &out)).await {
            Ok(Ok(())) => Ok(out),
            Ok(Err(e)) => {
                let _ = std::fs::remove_file(&out);
                Err(e)
            }
            Err(_) => {
                let _ = std::fs::remove_file(&out);
                Err(TtsError::Timeout(self.timeout.as_secs()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
