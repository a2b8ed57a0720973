//! Surface used when the feedback hardware is absent.

use super::{ButtonId, HardwareError, Note, Surface};

/// Accepts every write and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSurface;

impl Surface for NoopSurface {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn show_text(&self, text: &str) -> Result<(), HardwareError> {
        log::trace!("noop display: {text:?}");
        Ok(())
    }

    fn clear_display(&self) -> Result<(), HardwareError> {
        Ok(())
    }

    fn set_led(&self, led: ButtonId, on: bool) -> Result<(), HardwareError> {
        log::trace!("noop led {}: {on}", led.label());
        Ok(())
    }

    fn tone_on(&self, note: Note) -> Result<(), HardwareError> {
        log::trace!("noop tone {note:?}");
        Ok(())
    }

    fn tone_off(&self) -> Result<(), HardwareError> {
        Ok(())
    }
}
