//! Hardware feedback surface: 4-character display, three button LEDs and a
//! single-voice buzzer.
//!
//! # Architecture
//!
//! ```text
//!  select_surface(config) ──▶ Arc<dyn Surface>      (chosen once at startup)
//!                                 │
//!             ┌───────────────────┴──────────────────┐
//!             │ SysfsSurface  (LED class, PWM, line  │
//!             │               display attributes)    │
//!             │ NoopSurface   (hardware absent)      │
//!             └───────────────────┬──────────────────┘
//!                                 ▼
//!                          FeedbackPanel
//!        display().await ─▶ DisplayHandle  (exclusive, owned guard)
//!        buzzer().await  ─▶ BuzzerHandle   (exclusive, silences on drop)
//!        set_led(..)     ─▶ immediate write
//! ```
//!
//! Every write is best-effort: [`FeedbackPanel`] logs a [`HardwareError`] and
//! carries on, so a missing or flaky device never aborts a pipeline run.

pub mod noop;
pub mod panel;
pub mod sysfs;

#[cfg(test)]
pub mod mock;

use std::sync::Arc;

use thiserror::Error;

use crate::config::HardwareConfig;

pub use noop::NoopSurface;
pub use panel::{scroll_frames, BuzzerHandle, DisplayHandle, FeedbackPanel};
pub use sysfs::SysfsSurface;

#[cfg(test)]
pub use mock::{MockSurface, SurfaceEvent};

// ---------------------------------------------------------------------------
// ButtonId
// ---------------------------------------------------------------------------

/// One of the three front-panel buttons.  Each button has its own LED, so
/// the same identifier addresses both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    A,
    B,
    C,
}

impl ButtonId {
    pub const ALL: [ButtonId; 3] = [ButtonId::A, ButtonId::B, ButtonId::C];

    /// Stable array index (`A` = 0).
    pub fn index(self) -> usize {
        match self {
            ButtonId::A => 0,
            ButtonId::B => 1,
            ButtonId::C => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ButtonId::A => "A",
            ButtonId::B => "B",
            ButtonId::C => "C",
        }
    }
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

/// Pitches the buzzer is asked to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Note {
    C4,
    D4,
    E4,
    F4,
    G4,
    A4,
    B4,
    C5,
    D5,
    E5,
    F5,
    G5,
    A5,
    B5,
    C6,
    D6,
    E6,
}

impl Note {
    /// MIDI note number (C4 = 60).
    pub fn midi(self) -> u8 {
        match self {
            Note::C4 => 60,
            Note::D4 => 62,
            Note::E4 => 64,
            Note::F4 => 65,
            Note::G4 => 67,
            Note::A4 => 69,
            Note::B4 => 71,
            Note::C5 => 72,
            Note::D5 => 74,
            Note::E5 => 76,
            Note::F5 => 77,
            Note::G5 => 79,
            Note::A5 => 81,
            Note::B5 => 83,
            Note::C6 => 84,
            Note::D6 => 86,
            Note::E6 => 88,
        }
    }

    /// Equal-tempered frequency with A4 = 440 Hz.
    pub fn frequency_hz(self) -> f64 {
        440.0 * 2f64.powf((f64::from(self.midi()) - 69.0) / 12.0)
    }
}

// ---------------------------------------------------------------------------
// HardwareError
// ---------------------------------------------------------------------------

/// Failures of a single hardware write.  Never fatal.
#[derive(Debug, Error)]
pub enum HardwareError {
    /// A device attribute exists but could not be written.
    #[error("{resource} write failed: {source}")]
    Io {
        resource: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A device attribute the surface needs is not present.
    #[error("hardware unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Surface trait
// ---------------------------------------------------------------------------

/// Primitive, non-blocking writes to the feedback hardware.
///
/// Timing (tone lengths, scroll speed) lives in [`FeedbackPanel`]; a surface
/// only flips state.  Implementations must be `Send + Sync` so the panel can
/// be shared by every worker task.
pub trait Surface: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Show up to four characters on the display.
    fn show_text(&self, text: &str) -> Result<(), HardwareError>;

    fn clear_display(&self) -> Result<(), HardwareError>;

    fn set_led(&self, led: ButtonId, on: bool) -> Result<(), HardwareError>;

    /// Start sounding `note` until [`tone_off`](Self::tone_off).
    fn tone_on(&self, note: Note) -> Result<(), HardwareError>;

    fn tone_off(&self) -> Result<(), HardwareError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Surface>) {}
};

/// Pick the surface once at startup.
///
/// Returns a [`SysfsSurface`] when hardware is enabled and every device
/// attribute is present, otherwise a [`NoopSurface`].
pub fn select_surface(config: &HardwareConfig) -> Arc<dyn Surface> {
    if !config.enabled {
        log::info!("hardware: disabled in config, using no-op surface");
        return Arc::new(NoopSurface);
    }

    match SysfsSurface::probe(config) {
        Ok(surface) => {
            log::info!("hardware: sysfs surface ready");
            Arc::new(surface)
        }
        Err(e) => {
            log::warn!("hardware: {e}; feedback disabled");
            Arc::new(NoopSurface)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
