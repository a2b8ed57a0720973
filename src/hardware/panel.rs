//! Timed, exclusive access to the feedback surface.
//!
//! The display and the buzzer are single resources shared by the button
//! handlers, the pipeline worker and the chord timer.  Each is guarded by its
//! own async mutex; holders get an owned handle so the guard can travel into
//! a spawned task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::time::{sleep, Instant};

use super::sysfs::DISPLAY_WIDTH;
use super::{ButtonId, HardwareError, Surface};
use crate::tune::Tune;

/// Largest value [`DisplayHandle::show_number`] can render.
const MAX_DISPLAY_NUMBER: u64 = 9999;
/// Refresh period of the elapsed-time counter.
const TIMER_REFRESH: Duration = Duration::from_millis(100);

/// Log a failed write and move on.
fn best_effort(result: Result<(), HardwareError>) {
    if let Err(e) = result {
        log::warn!("hardware: {e}");
    }
}

// ---------------------------------------------------------------------------
// FeedbackPanel
// ---------------------------------------------------------------------------

/// Shared entry point to the display, LEDs and buzzer.
#[derive(Clone)]
pub struct FeedbackPanel {
    surface: Arc<dyn Surface>,
    display: Arc<Mutex<()>>,
    buzzer: Arc<Mutex<()>>,
    scroll_step: Duration,
}

impl FeedbackPanel {
    pub fn new(surface: Arc<dyn Surface>, scroll_step: Duration) -> Self {
        Self {
            surface,
            display: Arc::new(Mutex::new(())),
            buzzer: Arc::new(Mutex::new(())),
            scroll_step,
        }
    }

    pub fn surface_name(&self) -> &'static str {
        self.surface.name()
    }

    /// LEDs are independent and never contended, so they bypass the locks.
    pub fn set_led(&self, led: ButtonId, on: bool) {
        best_effort(self.surface.set_led(led, on));
    }

    pub fn set_all_leds(&self, on: bool) {
        for led in ButtonId::ALL {
            self.set_led(led, on);
        }
    }

    /// Flash all three LEDs `times` times.
    pub async fn flash_leds(&self, times: usize, step: Duration) {
        for _ in 0..times {
            self.set_all_leds(true);
            sleep(step).await;
            self.set_all_leds(false);
            sleep(step).await;
        }
    }

    /// Wait for exclusive use of the display.
    pub async fn display(&self) -> DisplayHandle {
        let guard = Arc::clone(&self.display).lock_owned().await;
        DisplayHandle {
            surface: Arc::clone(&self.surface),
            scroll_step: self.scroll_step,
            _guard: guard,
        }
    }

    /// Wait for exclusive use of the buzzer.
    pub async fn buzzer(&self) -> BuzzerHandle {
        let guard = Arc::clone(&self.buzzer).lock_owned().await;
        BuzzerHandle {
            surface: Arc::clone(&self.surface),
            _guard: guard,
        }
    }

    /// Take the buzzer, play `tune`, release it.
    pub async fn play(&self, tune: &Tune) {
        self.buzzer().await.play(tune).await;
    }
}

// ---------------------------------------------------------------------------
// DisplayHandle
// ---------------------------------------------------------------------------

/// Exclusive display access; released on drop.
pub struct DisplayHandle {
    surface: Arc<dyn Surface>,
    scroll_step: Duration,
    _guard: OwnedMutexGuard<()>,
}

impl DisplayHandle {
    pub fn show_text(&self, text: &str) {
        best_effort(self.surface.show_text(text));
    }

    /// Right-aligned decimal, clamped to four digits.
    pub fn show_number(&self, n: u64) {
        let shown = n.min(MAX_DISPLAY_NUMBER);
        self.show_text(&format!("{shown:>width$}", width = DISPLAY_WIDTH));
    }

    pub fn clear(&self) {
        best_effort(self.surface.clear_display());
    }

    /// Scroll `text` right-to-left across the display, one character per step.
    pub async fn scroll(&self, text: &str) {
        for frame in scroll_frames(text) {
            self.show_text(&frame);
            sleep(self.scroll_step).await;
        }
    }

    /// Show `from`, `from - 1`, … `1`, one second each.
    pub async fn countdown(&self, from: u64) {
        for n in (1..=from).rev() {
            self.show_number(n);
            sleep(Duration::from_secs(1)).await;
        }
    }

    /// Show whole seconds since `started`, refreshed every 100 ms, until
    /// `stop` turns true or its sender is dropped.
    pub async fn run_timer(&self, started: Instant, mut stop: watch::Receiver<bool>) {
        loop {
            if *stop.borrow() {
                break;
            }
            self.show_number(started.elapsed().as_secs());
            tokio::select! {
                _ = sleep(TIMER_REFRESH) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// Alternate `n` and a blank display every `step` for roughly `total`,
    /// then leave `n` showing.
    pub async fn blink_number(&self, n: u64, total: Duration, step: Duration) {
        let deadline = Instant::now() + total;
        while Instant::now() < deadline {
            self.show_number(n);
            sleep(step).await;
            self.clear();
            sleep(step).await;
        }
        self.show_number(n);
    }
}

/// The four-character windows shown while scrolling `text`.
///
/// The text is upper-cased and padded with a full blank display on each side,
/// so it enters from the right and leaves to the left.
pub fn scroll_frames(text: &str) -> Vec<String> {
    let pad = " ".repeat(DISPLAY_WIDTH);
    let padded: Vec<char> = format!("{pad}{}{pad}", text.to_uppercase())
        .chars()
        .collect();
    padded
        .windows(DISPLAY_WIDTH)
        .map(|w| w.iter().collect())
        .collect()
}

// ---------------------------------------------------------------------------
// BuzzerHandle
// ---------------------------------------------------------------------------

/// Exclusive buzzer access.  Dropping the handle silences the buzzer, so a
/// tune task that is aborted mid-note never leaves a tone sounding.
pub struct BuzzerHandle {
    surface: Arc<dyn Surface>,
    _guard: OwnedMutexGuard<()>,
}

impl BuzzerHandle {
    pub async fn play(&mut self, tune: &Tune) {
        if !tune.lead_in.is_zero() {
            sleep(tune.lead_in).await;
        }
        for (note, duration) in &tune.notes {
            best_effort(self.surface.tone_on(*note));
            sleep(*duration).await;
            best_effort(self.surface.tone_off());
            if !tune.gap.is_zero() {
                sleep(tune.gap).await;
            }
        }
    }
}

impl Drop for BuzzerHandle {
    fn drop(&mut self) {
        let _ = self.surface.tone_off();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
