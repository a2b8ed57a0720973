//! Button state machine.
//!
//! ```text
//!            ┌──────── allPressed ────────┐
//!            │  chord timer (hold)         │  still allPressed and idle
//!  press ──▶ │  suppresses A/C/B actions   │ ─────────────────────────▶ clear
//!            └─────────────────────────────┘                            history
//!
//!  A / C press   (idle, not allPressed)  LED on, step model, tune, scroll, index
//!  A / C release (idle, nothing held)    LED off, echo tune
//!  B press       (idle, not allPressed)  LED on, arm
//!  B release     (armed, no chord seen)  Pipeline::try_start_recording
//! ```
//!
//! Handlers only flip state and spawn tasks; [`ButtonMachine::handle_event`]
//! never awaits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::hardware::{ButtonId, FeedbackPanel};
use crate::pipeline::Pipeline;
use crate::tune::{synthesize, TuneKind};

use super::{ButtonEvent, ModelSelection};

const CLEAR_FLASHES: usize = 3;
const CLEAR_FLASH_STEP: Duration = Duration::from_millis(200);

/// Raw pressed state of the three buttons, shared with the chord timer.
#[derive(Debug, Default)]
struct PressedSet([AtomicBool; 3]);

impl PressedSet {
    fn set(&self, id: ButtonId, pressed: bool) {
        self.0[id.index()].store(pressed, Ordering::SeqCst);
    }

    fn all(&self) -> bool {
        self.0.iter().all(|b| b.load(Ordering::SeqCst))
    }

    fn any(&self) -> bool {
        self.0.iter().any(|b| b.load(Ordering::SeqCst))
    }
}

struct ChordTimer {
    handle: JoinHandle<()>,
    /// Set once the hold elapsed and the clear went ahead.
    fired: Arc<AtomicBool>,
}

/// Interprets button edges.  Owned by the task running [`ButtonMachine::run`].
pub struct ButtonMachine {
    pipeline: Pipeline,
    panel: FeedbackPanel,
    selection: ModelSelection,
    pressed: Arc<PressedSet>,
    clear_hold: Duration,
    /// All three buttons were down at some point since the last full release.
    chord_seen: bool,
    /// B went down while idle, so its release may start a run.
    b_armed: bool,
    chord: Option<ChordTimer>,
    toggle_feedback: Option<JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,
}

impl ButtonMachine {
    pub fn new(pipeline: Pipeline, selection: ModelSelection, clear_hold: Duration) -> Self {
        let panel = pipeline.panel().clone();
        Self {
            pipeline,
            panel,
            selection,
            pressed: Arc::new(PressedSet::default()),
            clear_hold,
            chord_seen: false,
            b_armed: false,
            chord: None,
            toggle_feedback: None,
            background: Vec::new(),
        }
    }

    pub fn selection(&self) -> &ModelSelection {
        &self.selection
    }

    /// Consume edges until the channel closes, then wind down.
    pub async fn run(mut self, mut rx: mpsc::Receiver<ButtonEvent>) {
        log::info!(
            "buttons: ready, model {} ({} available)",
            self.selection.current(),
            self.selection.len()
        );
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
        log::info!("buttons: event channel closed");
        self.shutdown().await;
    }

    /// Apply one edge.  Must be called from inside a tokio runtime.
    pub fn handle_event(&mut self, event: ButtonEvent) {
        match event {
            ButtonEvent::Pressed(id) => self.on_press(id),
            ButtonEvent::Released(id) => self.on_release(id),
        }
    }

    /// Abort a pending chord and wait for feedback tasks to finish.
    pub async fn shutdown(&mut self) {
        if let Some(chord) = self.chord.take() {
            chord.handle.abort();
            let _ = chord.handle.await;
        }
        if let Some(feedback) = self.toggle_feedback.take() {
            let _ = feedback.await;
        }
        for task in self.background.drain(..) {
            let _ = task.await;
        }
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    fn on_press(&mut self, id: ButtonId) {
        self.pressed.set(id, true);
        let busy = self.pipeline.is_busy();

        if self.pressed.all() {
            self.chord_seen = true;
            if !busy {
                self.arm_chord();
            }
            return;
        }
        if busy {
            log::debug!("buttons: {} ignored, run in progress", id.label());
            return;
        }

        match id {
            ButtonId::A => self.toggle(id, TuneKind::ToggleLeft),
            ButtonId::C => self.toggle(id, TuneKind::ToggleRight),
            ButtonId::B => {
                self.panel.set_led(ButtonId::B, true);
                self.b_armed = true;
            }
        }
    }

    fn on_release(&mut self, id: ButtonId) {
        self.pressed.set(id, false);
        self.abandon_chord();
        let busy = self.pipeline.is_busy();

        match id {
            ButtonId::A | ButtonId::C => {
                if !busy && !self.pressed.any() {
                    let echo = if id == ButtonId::A {
                        TuneKind::ToggleLeftEcho
                    } else {
                        TuneKind::ToggleRightEcho
                    };
                    self.panel.set_led(id, false);
                    let panel = self.panel.clone();
                    self.spawn_background(async move {
                        panel.play(&synthesize(echo, None)).await;
                    });
                }
            }
            ButtonId::B => {
                let armed = std::mem::take(&mut self.b_armed);
                if armed && !self.chord_seen {
                    self.start_run();
                } else if !busy {
                    self.panel.set_led(ButtonId::B, false);
                }
            }
        }

        if !self.pressed.any() {
            self.chord_seen = false;
        }
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    fn toggle(&mut self, id: ButtonId, tune: TuneKind) {
        self.panel.set_led(id, true);
        let model = match id {
            ButtonId::A => self.selection.previous(),
            _ => self.selection.next(),
        }
        .to_string();
        let index = self.selection.index() as u64;
        let name = self.selection.display_name().to_string();
        log::info!("buttons: selected {model} (#{index})");

        if let Some(previous) = self.toggle_feedback.take() {
            previous.abort();
        }
        let panel = self.panel.clone();
        self.toggle_feedback = Some(tokio::spawn(async move {
            panel.play(&synthesize(tune, None)).await;
            let display = panel.display().await;
            display.scroll(&name).await;
            display.show_number(index);
        }));
    }

    fn start_run(&mut self) {
        // The run owns the display from here on.
        if let Some(feedback) = self.toggle_feedback.take() {
            feedback.abort();
        }
        let model = self.selection.current().to_string();
        if !self.pipeline.try_start_recording(model) {
            self.panel.set_led(ButtonId::B, false);
        }
    }

    fn arm_chord(&mut self) {
        if self.chord.as_ref().is_some_and(|c| !c.handle.is_finished()) {
            return;
        }
        log::info!(
            "buttons: all pressed, hold {}s to clear history",
            self.clear_hold.as_secs()
        );

        let fired = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(clear_after_hold(
            self.pipeline.clone(),
            Arc::clone(&self.pressed),
            self.clear_hold,
            Arc::clone(&fired),
        ));
        self.chord = Some(ChordTimer { handle, fired });
    }

    /// Drop a chord timer that has not fired yet.  A fired one is left to
    /// finish its tune and flash.
    fn abandon_chord(&mut self) {
        if let Some(chord) = &self.chord {
            if !chord.fired.load(Ordering::SeqCst) && !chord.handle.is_finished() {
                chord.handle.abort();
                self.chord = None;
                log::debug!("buttons: chord released early");
            }
        }
    }

    fn spawn_background(&mut self, fut: impl std::future::Future<Output = ()> + Send + 'static) {
        self.background.retain(|t| !t.is_finished());
        self.background.push(tokio::spawn(fut));
    }
}

async fn clear_after_hold(
    pipeline: Pipeline,
    pressed: Arc<PressedSet>,
    hold: Duration,
    fired: Arc<AtomicBool>,
) {
    tokio::time::sleep(hold).await;
    if !pressed.all() {
        return;
    }
    let Some(removed) = pipeline.clear_history_if_idle() else {
        log::debug!("buttons: chord completed during a run, history kept");
        return;
    };
    fired.store(true, Ordering::SeqCst);
    log::info!("buttons: history cleared ({removed} entries)");

    let panel = pipeline.panel().clone();
    panel.play(&synthesize(TuneKind::ClearHistory, None)).await;
    panel.flash_leds(CLEAR_FLASHES, CLEAR_FLASH_STEP).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
