//! Front-panel buttons: edge events, key bindings and the state machine that
//! turns them into model toggles, recording runs and the clear-history
//! chord.
//!
//! # Design
//!
//! ```text
//!  rdev thread ── KeyPress/KeyRelease ──▶ KeyFilter (drop key-repeat)
//!                                            │ ButtonEvent (mpsc)
//!                                            ▼
//!                                   ButtonMachine::run()
//!              ┌───────────────┬─────────────┴───────────┬──────────────┐
//!         A/C press       A/C release               B release       A+B+C held
//!     toggle model,      LED off, echo        Pipeline::try_start   clear history
//!     scroll + index                              _recording        after hold
//! ```
//!
//! Every handler returns immediately; anything slow (tunes, scrolling,
//! the pipeline itself) runs on its own task.
//!
//! # Usage
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use roverseer::buttons::{ButtonListener, KeyMap};
//! use roverseer::config::ButtonConfig;
//!
//! let keymap = KeyMap::from_config(&ButtonConfig::default()).unwrap();
//! let (tx, _rx) = mpsc::channel(32);
//! let _listener = ButtonListener::start(keymap, tx).unwrap();
//! ```

pub mod listener;
pub mod machine;
pub mod selection;

use rdev::Key;
use thiserror::Error;

use crate::config::ButtonConfig;
use crate::hardware::ButtonId;

pub use listener::{ButtonListener, KeyFilter};
pub use machine::ButtonMachine;
pub use selection::ModelSelection;

// ---------------------------------------------------------------------------
// ButtonEvent
// ---------------------------------------------------------------------------

/// A debounced edge on one button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Pressed(ButtonId),
    Released(ButtonId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ButtonError {
    #[error("unknown key name {0:?}")]
    UnknownKey(String),

    #[error("key {0:?} is bound to more than one button")]
    DuplicateKey(String),
}

// ---------------------------------------------------------------------------
// KeyMap
// ---------------------------------------------------------------------------

/// Which keyboard key stands in for each button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMap {
    keys: [Key; 3],
}

impl KeyMap {
    pub fn from_config(config: &ButtonConfig) -> Result<Self, ButtonError> {
        let names = [&config.key_a, &config.key_b, &config.key_c];
        let mut keys = [Key::F1; 3];
        for (slot, name) in keys.iter_mut().zip(names) {
            *slot = parse_key(name).ok_or_else(|| ButtonError::UnknownKey(name.clone()))?;
        }
        for (i, name) in names.iter().enumerate() {
            if keys[i + 1..].contains(&keys[i]) {
                return Err(ButtonError::DuplicateKey((*name).clone()));
            }
        }
        Ok(Self { keys })
    }

    pub fn button_for(&self, key: Key) -> Option<ButtonId> {
        ButtonId::ALL
            .into_iter()
            .find(|id| self.keys[id.index()] == key)
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

const FUNCTION_KEYS: [Key; 12] = [
    Key::F1,
    Key::F2,
    Key::F3,
    Key::F4,
    Key::F5,
    Key::F6,
    Key::F7,
    Key::F8,
    Key::F9,
    Key::F10,
    Key::F11,
    Key::F12,
];

const LETTER_KEYS: [Key; 26] = [
    Key::KeyA,
    Key::KeyB,
    Key::KeyC,
    Key::KeyD,
    Key::KeyE,
    Key::KeyF,
    Key::KeyG,
    Key::KeyH,
    Key::KeyI,
    Key::KeyJ,
    Key::KeyK,
    Key::KeyL,
    Key::KeyM,
    Key::KeyN,
    Key::KeyO,
    Key::KeyP,
    Key::KeyQ,
    Key::KeyR,
    Key::KeyS,
    Key::KeyT,
    Key::KeyU,
    Key::KeyV,
    Key::KeyW,
    Key::KeyX,
    Key::KeyY,
    Key::KeyZ,
];

const DIGIT_KEYS: [Key; 10] = [
    Key::Num0,
    Key::Num1,
    Key::Num2,
    Key::Num3,
    Key::Num4,
    Key::Num5,
    Key::Num6,
    Key::Num7,
    Key::Num8,
    Key::Num9,
];

/// Parse a key name from the config into an [`rdev::Key`].
///
/// Accepts `F1`–`F12`, single letters (either case), digits and a handful
/// of named keys.
///
/// ```
/// use roverseer::buttons::parse_key;
///
/// assert_eq!(parse_key("F2"), Some(rdev::Key::F2));
/// assert_eq!(parse_key("q"), Some(rdev::Key::KeyQ));
/// assert_eq!(parse_key("F13"), None);
/// ```
pub fn parse_key(name: &str) -> Option<Key> {
    if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<usize>().ok()) {
        return n.checked_sub(1).and_then(|i| FUNCTION_KEYS.get(i)).copied();
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            let i = (c.to_ascii_lowercase() as u8 - b'a') as usize;
            return LETTER_KEYS.get(i).copied();
        }
        if let Some(d) = c.to_digit(10) {
            return DIGIT_KEYS.get(d as usize).copied();
        }
        return None;
    }

    match name {
        "Space" => Some(Key::Space),
        "Escape" | "Esc" => Some(Key::Escape),
        "Return" | "Enter" => Some(Key::Return),
        "Tab" => Some(Key::Tab),
        "Up" | "UpArrow" => Some(Key::UpArrow),
        "Down" | "DownArrow" => Some(Key::DownArrow),
        "Left" | "LeftArrow" => Some(Key::LeftArrow),
        "Right" | "RightArrow" => Some(Key::RightArrow),
        "PageUp" => Some(Key::PageUp),
        "PageDown" => Some(Key::PageDown),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
