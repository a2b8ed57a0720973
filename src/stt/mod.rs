//! STT (Speech-to-Text) module.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  SttEngine (trait)                   │
//! │                                                      │
//! │   WhisperEngine (whisper-rs)    NoModelStt (absent)  │
//! │              ▲                                       │
//! │              │ 16 kHz mono f32                       │
//! │   transcribe_wav(path) ── read WAV → resample        │
//! │                           (spawn_blocking)           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roverseer::stt::{transcribe_wav, SttEngine, TranscribeParams, WhisperEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine: Arc<dyn SttEngine> = Arc::new(
//!         WhisperEngine::load("models/ggml-base.bin", TranscribeParams::default()).unwrap(),
//!     );
//!     let text = transcribe_wav(engine, "/tmp/clip.wav".as_ref()).await.unwrap();
//!     println!("{text}");
//! }
//! ```

pub mod engine;
pub mod transcribe;

pub use engine::{NoModelStt, SttEngine, SttError, WhisperEngine};
pub use transcribe::{transcribe_wav, TranscribeParams};

#[cfg(test)]
pub use engine::MockSttEngine;
