//! Recording surface for tests.

use std::sync::Mutex;

use super::{ButtonId, HardwareError, Note, Surface};

/// One write observed by [`MockSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Text(String),
    Clear,
    Led(ButtonId, bool),
    ToneOn(Note),
    ToneOff,
}

/// Keeps every write in order and tracks LED state.
#[derive(Debug, Default)]
pub struct MockSurface {
    events: Mutex<Vec<SurfaceEvent>>,
    leds: Mutex<[bool; 3]>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: SurfaceEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Current state of one LED.
    pub fn led(&self, led: ButtonId) -> bool {
        self.leds.lock().unwrap()[led.index()]
    }

    /// Notes started, in order.
    pub fn tones(&self) -> Vec<Note> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SurfaceEvent::ToneOn(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Most recent text written, ignoring clears.
    pub fn last_text(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|e| match e {
            SurfaceEvent::Text(t) => Some(t),
            _ => None,
        })
    }

    /// Number of times `led` was switched on.
    pub fn led_on_count(&self, led: ButtonId) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == SurfaceEvent::Led(led, true))
            .count()
    }
}

impl Surface for MockSurface {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn show_text(&self, text: &str) -> Result<(), HardwareError> {
        self.record(SurfaceEvent::Text(text.to_string()));
        Ok(())
    }

    fn clear_display(&self) -> Result<(), HardwareError> {
        self.record(SurfaceEvent::Clear);
        Ok(())
    }

    fn set_led(&self, led: ButtonId, on: bool) -> Result<(), HardwareError> {
        self.leds.lock().unwrap()[led.index()] = on;
        self.record(SurfaceEvent::Led(led, on));
        Ok(())
    }

    fn tone_on(&self, note: Note) -> Result<(), HardwareError> {
        self.record(SurfaceEvent::ToneOn(note));
        Ok(())
    }

    fn tone_off(&self) -> Result<(), HardwareError> {
        self.record(SurfaceEvent::ToneOff);
        Ok(())
    }
}
