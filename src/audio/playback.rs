//! Playback of synthesized speech through ALSA's `aplay`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::AudioError;

/// Plays a WAV file to completion.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, path: &Path) -> Result<(), AudioError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioPlayer>) {}
};

/// Runs `aplay [-D <device>] <file>`.
#[derive(Debug, Clone)]
pub struct AplayPlayer {
    binary: PathBuf,
    device: Option<String>,
}

impl AplayPlayer {
    pub fn new(device: Option<String>) -> Self {
        Self {
            binary: PathBuf::from("aplay"),
            device,
        }
    }

    fn args(&self, path: &Path) -> Vec<std::ffi::OsString> {
        let mut args = Vec::with_capacity(3);
        if let Some(device) = self.device.as_deref().filter(|d| !d.is_empty()) {
            args.push("-D".into());
            args.push(device.into());
        }
        args.push(path.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl AudioPlayer for AplayPlayer {
    async fn play(&self, path: &Path) -> Result<(), AudioError> {
        let output = Command::new(&self.binary)
            .args(self.args(path))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AudioError::Playback(format!("{}: {e}", self.binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AudioError::Playback(format!(
                "aplay exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::MockPlayer;


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
