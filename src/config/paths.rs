//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Linux:   ~/.config/roverseer/
//!   macOS:   ~/Library/Application Support/roverseer/
//!
//! Data dir (Whisper models, Piper voices):
//!   Linux:   ~/.local/share/roverseer/
//!   macOS:   ~/Library/Application Support/roverseer/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for GGML Whisper model files.
    pub models_dir: PathBuf,
    /// Directory for Piper `.onnx` voices.
    pub voices_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "roverseer";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            models_dir: data_dir.join("models"),
            voices_dir: data_dir.join("voices"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
