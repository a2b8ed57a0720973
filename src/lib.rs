//! RoverSeer: a button-driven voice assistant for a small device with a
//! four-character display, three button LEDs and a buzzer.
//!
//! Press B to ask a question, A/C to switch chat models, hold all three to
//! forget the conversation.

pub mod audio;
pub mod buttons;
pub mod config;
pub mod hardware;
pub mod indicator;
pub mod llm;
pub mod pipeline;
pub mod stt;
pub mod tts;
pub mod tune;
