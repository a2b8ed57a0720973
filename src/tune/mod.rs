//! Tune synthesizer: short buzzer cues for each pipeline stage.
//!
//! Seeded kinds ([`TuneKind::OllamaStart`], [`TuneKind::TtsStart`]) derive
//! their middle phrase from the model or voice name, so the same name always
//! sounds the same and a listener learns to recognise it.
//! [`TuneKind::ClearHistory`] is the only non-deterministic kind.
//!
//! ```
//! use roverseer::tune::{synthesize, TuneKind};
//!
//! let a = synthesize(TuneKind::OllamaStart, Some("llama3.2:1b"));
//! let b = synthesize(TuneKind::OllamaStart, Some("llama3.2:1b"));
//! assert_eq!(a, b);
//! ```

mod tables;

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::hardware::Note;

use tables::{model_interval, voice_pattern, CLEAR_PALETTE, MODEL_PALETTE, VOICE_PALETTE};

/// Characters of a model name that shape its tune.
const MODEL_SEED_CHARS: usize = 8;
/// Characters of a voice name that shape its tune.
const VOICE_SEED_CHARS: usize = 6;
/// Length of the random clear-history tune.
const CLEAR_TUNE_NOTES: usize = 7;

// ---------------------------------------------------------------------------
// TuneKind
// ---------------------------------------------------------------------------

/// Which cue to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TuneKind {
    /// Chat request starting; seeded by the model name.
    OllamaStart,
    /// Chat request finished successfully.
    OllamaComplete,
    /// Speech-to-text starting.
    Transcribe,
    /// Speech synthesis starting; seeded by the voice name.
    TtsStart,
    ToggleLeft,
    /// Quieter release echo of [`ToggleLeft`](Self::ToggleLeft).
    ToggleLeftEcho,
    ToggleRight,
    /// Quieter release echo of [`ToggleRight`](Self::ToggleRight).
    ToggleRightEcho,
    /// Recording is about to begin.
    Confirmation,
    RecordingComplete,
    /// History wiped by the three-button chord.  Random every time.
    ClearHistory,
}

// ---------------------------------------------------------------------------
// Tune
// ---------------------------------------------------------------------------

/// An ordered note sequence plus its articulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tune {
    /// `(note, how long it sounds)` in playing order.
    pub notes: Vec<(Note, Duration)>,
    /// Silence after every note.
    pub gap: Duration,
    /// Silence before the first note.
    pub lead_in: Duration,
}

impl Tune {
    fn new(notes: Vec<(Note, Duration)>, gap_ms: u64) -> Self {
        Self {
            notes,
            gap: Duration::from_millis(gap_ms),
            lead_in: Duration::ZERO,
        }
    }

    /// Wall-clock length of the whole tune including gaps.
    pub fn total_duration(&self) -> Duration {
        let sounding: Duration = self.notes.iter().map(|(_, d)| *d).sum();
        self.lead_in + sounding + self.gap * self.notes.len() as u32
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

fn phrase(notes: &[(Note, u64)]) -> Vec<(Note, Duration)> {
    notes
        .iter()
        .map(|(n, ms)| (*n, Duration::from_millis(*ms)))
        .collect()
}

// ---------------------------------------------------------------------------
// synthesize
// ---------------------------------------------------------------------------

/// Build the tune for `kind`.
///
/// `seed` is only read by [`TuneKind::OllamaStart`] and [`TuneKind::TtsStart`];
/// without it they fall back to a fixed phrase.  Seed characters outside the
/// lookup tables are skipped.
pub fn synthesize(kind: TuneKind, seed: Option<&str>) -> Tune {
    use Note::*;

    match kind {
        TuneKind::OllamaStart => match seed {
            Some(model) => model_tune(model),
            None => Tune::new(
                phrase(&[
                    (C4, 150),
                    (D4, 150),
                    (E4, 150),
                    (F4, 200),
                    (G4, 150),
                    (F4, 100),
                    (A4, 150),
                    (G4, 100),
                    (B4, 150),
                    (A4, 100),
                    (C5, 200),
                    (D5, 300),
                ]),
                50,
            ),
        },
        TuneKind::OllamaComplete => Tune::new(
            phrase(&[
                (C4, 100),
                (E4, 100),
                (G4, 100),
                (C5, 150),
                (E5, 150),
                (G5, 300),
            ]),
            20,
        ),
        TuneKind::Transcribe => Tune::new(
            phrase(&[(D4, 200), (G4, 150), (F4, 150), (A4, 200), (G4, 250)]),
            80,
        ),
        TuneKind::TtsStart => {
            let mut tune = match seed {
                Some(voice) => voice_tune(voice),
                None => Tune::new(
                    phrase(&[
                        (G5, 150),
                        (E5, 100),
                        (C5, 100),
                        (D5, 150),
                        (E5, 150),
                        (G5, 200),
                        (C6, 400),
                    ]),
                    30,
                ),
            };
            tune.lead_in = Duration::from_millis(100);
            tune
        }
        TuneKind::ToggleLeft => Tune::new(phrase(&[(E5, 100), (C5, 100)]), 0),
        TuneKind::ToggleLeftEcho => Tune::new(phrase(&[(E4, 50)]), 0),
        TuneKind::ToggleRight => Tune::new(phrase(&[(C5, 100), (E5, 100)]), 0),
        TuneKind::ToggleRightEcho => Tune::new(phrase(&[(C4, 50)]), 0),
        TuneKind::Confirmation => Tune::new(phrase(&[(A5, 80), (A5, 80)]), 50),
        TuneKind::RecordingComplete => Tune::new(phrase(&[(G5, 80), (E5, 80), (C5, 80)]), 0),
        TuneKind::ClearHistory => clear_tune(&mut rand::thread_rng()),
    }
}

/// Curious ascending phrase with a middle section spelled by the model name.
fn model_tune(model: &str) -> Tune {
    use Note::*;

    let base = model.split(':').next().unwrap_or(model);

    let mut notes = phrase(&[(C4, 150), (E4, 150), (G4, 200)]);

    for (i, c) in base.to_lowercase().chars().take(MODEL_SEED_CHARS).enumerate() {
        if let Some(interval) = model_interval(c) {
            let note = MODEL_PALETTE[(i + interval) % MODEL_PALETTE.len()];
            let ms = 100 + 50 * (i as u64 % 3);
            notes.push((note, Duration::from_millis(ms)));
        }
    }

    notes.extend(phrase(&[(A4, 150), (B4, 150), (C5, 200), (D5, 300)]));
    Tune::new(notes, 50)
}

/// Announcing fanfare with a middle section spelled by the voice name and an
/// ending chosen by voice family.
fn voice_tune(voice: &str) -> Tune {
    use Note::*;

    let base = voice
        .split('.')
        .next()
        .unwrap_or(voice)
        .split('-')
        .next()
        .unwrap_or(voice);
    let lower = base.to_lowercase();

    let mut notes = phrase(&[(G5, 100), (G5, 100), (E5, 150)]);

    for (i, c) in lower.chars().take(VOICE_SEED_CHARS).enumerate() {
        if let Some(pattern) = voice_pattern(c) {
            let note = VOICE_PALETTE[pattern[i % pattern.len()]];
            let ms = if i % 2 == 0 { 150 } else { 100 };
            notes.push((note, Duration::from_millis(ms)));
        }
    }

    // "en" is matched case-sensitively, "gb" in any case.
    let ending = if base.contains("en") {
        phrase(&[(C5, 100), (E5, 100), (G5, 200), (C6, 400)])
    } else if lower.contains("gb") {
        phrase(&[(D5, 100), (F5, 150), (A5, 200), (D6, 400)])
    } else {
        phrase(&[(E5, 100), (G5, 150), (B5, 200), (E6, 400)])
    };
    notes.extend(ending);

    Tune::new(notes, 30)
}

fn clear_tune<R: Rng>(rng: &mut R) -> Tune {
    let notes = (0..CLEAR_TUNE_NOTES)
        .map(|_| {
            let note = *CLEAR_PALETTE.choose(rng).unwrap_or(&Note::C5);
            (note, Duration::from_millis(rng.gen_range(80..=150)))
        })
        .collect();
    Tune::new(notes, 20)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
