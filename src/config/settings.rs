//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every struct is `#[serde(default)]`, so a `settings.toml` that only names a
//! handful of keys still loads.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Model used when the Ollama catalog is empty or unreachable.
pub const DEFAULT_MODEL: &str = "tinydolphin:1.1b";

/// Piper voice used for spoken replies unless `PIPER_VOICE` overrides it.
pub const DEFAULT_VOICE: &str = "en_GB-jarvis";

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the chat-completion backend (Ollama, OpenAI-compatible mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// API key; `None` for a local Ollama.
    pub api_key: Option<String>,
    /// Fallback model when the catalog lists nothing.
    pub default_model: String,
    /// Upper bound on a single chat-completion request.
    pub timeout_secs: u64,
    /// Sampling temperature, omitted from the request when `None`.
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            default_model: DEFAULT_MODEL.into(),
            timeout_secs: 120,
            temperature: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper STT engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// GGML model file stem inside the models directory (e.g. `"base"`).
    pub model: String,
    /// ISO-639-1 language code, or `"auto"`.
    pub language: String,
    /// Utterance used when transcription fails so the turn is not dropped.
    pub fallback_transcript: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "base".into(),
            language: "en".into(),
            fallback_transcript: "Hello, testing the system.".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for Piper speech synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Path (or `$PATH` name) of the `piper` executable.
    pub piper_binary: PathBuf,
    /// Directory holding `<voice>-<quality>.onnx` / `.onnx.json` pairs.
    pub voices_dir: PathBuf,
    /// Voice used for button-initiated replies.
    pub default_voice: String,
    /// Upper bound on a single synthesis run.
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            piper_binary: PathBuf::from("piper"),
            voices_dir: AppPaths::new().voices_dir,
            default_voice: DEFAULT_VOICE.into(),
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for capture and playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Fixed length of a button-triggered recording.
    pub record_secs: u64,
    /// ALSA playback device handed to `aplay -D`; `None` uses the default.
    pub output_device: Option<String>,
    /// Where recordings and synthesized replies are written.
    pub temp_dir: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            record_secs: 10,
            output_device: None,
            temp_dir: std::env::temp_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// HardwareConfig
// ---------------------------------------------------------------------------

/// Sysfs locations of the feedback hardware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Set `false` to force the no-op surface even when the paths exist.
    pub enabled: bool,
    /// LED class directories for buttons A, B and C.
    pub led_a: PathBuf,
    pub led_b: PathBuf,
    pub led_c: PathBuf,
    /// PWM channel directory driving the piezo buzzer.
    pub buzzer_pwm: PathBuf,
    /// Line-display `message` attribute of the 4-character display.
    pub display_message: PathBuf,
    /// Delay between scroll steps when showing a model name.
    pub scroll_step_ms: u64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            led_a: PathBuf::from("/sys/class/leds/rainbow:red:a"),
            led_b: PathBuf::from("/sys/class/leds/rainbow:green:b"),
            led_c: PathBuf::from("/sys/class/leds/rainbow:blue:c"),
            buzzer_pwm: PathBuf::from("/sys/class/pwm/pwmchip0/pwm1"),
            display_message: PathBuf::from("/sys/class/auxdisplay/fourletter/message"),
            scroll_step_ms: 200,
        }
    }
}

// ---------------------------------------------------------------------------
// ButtonConfig
// ---------------------------------------------------------------------------

/// Key bindings for the three buttons and the chord hold time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    /// Key acting as button A (previous model).
    pub key_a: String,
    /// Key acting as button B (record).
    pub key_b: String,
    /// Key acting as button C (next model).
    pub key_c: String,
    /// How long all three buttons must be held to clear history.
    pub clear_hold_secs: u64,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            key_a: "F1".into(),
            key_b: "F2".into(),
            key_c: "F3".into(),
            clear_hold_secs: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Conversation context and feedback timing for pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of history entries sent as chat context.  The buffer itself
    /// retains twice this many.
    pub context_window: usize,
    /// Half-period of the processing LED blink.
    pub indicator_period_ms: u64,
    /// How long the elapsed chat time blinks after a completion.
    pub elapsed_blink_secs: u64,
    /// On/off step of the elapsed-time blink.
    pub blink_step_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context_window: 10,
            indicator_period_ms: 300,
            elapsed_blink_secs: 4,
            blink_step_ms: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub audio: AudioConfig,
    pub hardware: HardwareConfig,
    pub buttons: ButtonConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`,
    /// then apply environment overrides.
    ///
    /// Returns defaults when the file does not exist yet.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&AppPaths::new().settings_file)?;
        config.apply_env();
        Ok(config)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `PIPER_VOICE` replaces the default voice when set and non-empty.
    pub fn apply_env(&mut self) {
        if let Ok(voice) = std::env::var("PIPER_VOICE") {
            if !voice.trim().is_empty() {
                self.tts.default_voice = voice.trim().to_string();
            }
        }
    }

    /// Absolute path of the configured Whisper model file.
    pub fn stt_model_path(&self) -> PathBuf {
        AppPaths::new()
            .models_dir
            .join(format!("ggml-{}.bin", self.stt.model))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
