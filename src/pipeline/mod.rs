//! Interaction pipeline: one spoken question in, one spoken answer out.
//!
//! # Architecture
//!
//! ```text
//! ButtonMachine ── B release ──▶ Pipeline::try_start_recording
//!                                      │
//!                       RunGuard ◀─────┤ (one run at a time)
//!                                      ▼
//!             record → transcribe → chat → persist → synthesize → play
//!                                      │         │
//!                     FeedbackPanel ◀──┘         └──▶ HistoryBuffer
//!                     (tunes, display, LEDs)          (bounded, shared)
//!                                      │
//!                                      ▼
//!                         cleanup: indicator off, display blank
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use roverseer::audio::{AplayPlayer, CpalRecorder};
//! use roverseer::config::AppConfig;
//! use roverseer::hardware::{FeedbackPanel, NoopSurface};
//! use roverseer::llm::OllamaClient;
//! use roverseer::pipeline::{Collaborators, Pipeline, PipelineSettings};
//! use roverseer::stt::NoModelStt;
//! use roverseer::tts::PiperSynth;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let panel = FeedbackPanel::new(Arc::new(NoopSurface), Duration::from_millis(200));
//!     let collab = Collaborators {
//!         recorder: Arc::new(CpalRecorder),
//!         stt: Arc::new(NoModelStt::new("no model")),
//!         chat: Arc::new(OllamaClient::from_config(&config.llm)),
//!         tts: Arc::new(PiperSynth::from_config(&config.tts, &config.audio.temp_dir)),
//!         player: Arc::new(AplayPlayer::new(None)),
//!     };
//!     let pipeline = Pipeline::new(panel, collab, PipelineSettings::from_config(&config));
//!
//!     pipeline.try_start_recording("tinydolphin:1.1b");
//!     pipeline.shutdown().await;
//! }
//! ```

pub mod history;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use history::{HistoryBuffer, HistoryEntry};
pub use runner::{Collaborators, Pipeline, PipelineError, PipelineSettings};
pub use state::{new_shared_run, PipelineRun, RunGuard, RunPermit, SharedRun, Stage};
