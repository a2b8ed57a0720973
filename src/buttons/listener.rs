//! Keyboard stand-in for the front-panel buttons, via `rdev::listen`.
//!
//! `rdev::listen` blocks forever, so it lives on a dedicated OS thread.
//! Dropping [`ButtonListener`] takes the event sender away from that thread,
//! which closes the channel and lets the button machine wind down.  The
//! thread itself stays parked inside rdev until the process exits since rdev
//! offers no way to interrupt it.

use std::sync::{Arc, Mutex, PoisonError};

use rdev::EventType;
use tokio::sync::mpsc;

use super::{ButtonEvent, KeyMap};

// ---------------------------------------------------------------------------
// KeyFilter
// ---------------------------------------------------------------------------

/// Maps raw key events to button edges and drops OS auto-repeat presses.
#[derive(Debug, Clone)]
pub struct KeyFilter {
    keymap: KeyMap,
    held: [bool; 3],
}

impl KeyFilter {
    pub fn new(keymap: KeyMap) -> Self {
        Self {
            keymap,
            held: [false; 3],
        }
    }

    pub fn filter(&mut self, event: EventType) -> Option<ButtonEvent> {
        match event {
            EventType::KeyPress(key) => {
                let id = self.keymap.button_for(key)?;
                let held = &mut self.held[id.index()];
                if *held {
                    return None;
                }
                *held = true;
                Some(ButtonEvent::Pressed(id))
            }
            EventType::KeyRelease(key) => {
                let id = self.keymap.button_for(key)?;
                let held = &mut self.held[id.index()];
                if !*held {
                    return None;
                }
                *held = false;
                Some(ButtonEvent::Released(id))
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ButtonListener
// ---------------------------------------------------------------------------

type SenderSlot = Arc<Mutex<Option<mpsc::Sender<ButtonEvent>>>>;

/// Handle to the listener thread.  Drop it to close the event channel.
pub struct ButtonListener {
    sender: SenderSlot,
    _thread: std::thread::JoinHandle<()>,
}

impl ButtonListener {
    /// Spawn the listener thread.  Edges are forwarded on `tx` with
    /// `blocking_send`.
    pub fn start(keymap: KeyMap, tx: mpsc::Sender<ButtonEvent>) -> std::io::Result<Self> {
        let sender: SenderSlot = Arc::new(Mutex::new(Some(tx)));
        let slot = Arc::clone(&sender);

        let thread = std::thread::Builder::new()
            .name("button-listener".into())
            .spawn(move || {
                let mut filter = KeyFilter::new(keymap);
                let result = rdev::listen(move |event| {
                    let Some(edge) = filter.filter(event.event_type) else {
                        return;
                    };
                    let tx = slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
                    let Some(tx) = tx else {
                        return;
                    };
                    log::trace!("buttons: {edge:?}");
                    if tx.blocking_send(edge).is_err() {
                        slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                    }
                });

                if let Err(e) = result {
                    log::error!("buttons: rdev::listen exited with error: {e:?}");
                }
            })?;

        Ok(Self {
            sender,
            _thread: thread,
        })
    }
}

impl Drop for ButtonListener {
    fn drop(&mut self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
