//! Processing indicator: LED-B blinks while the device is busy.
//!
//! While the blinker runs it is the only writer of LED-B.  [`stop`] hands the
//! LED back in a known state: it signals the worker, waits a bounded time for
//! it to exit, then forces the LED off whatever the worker last wrote.
//!
//! [`stop`]: ProcessingIndicator::stop

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::hardware::{ButtonId, FeedbackPanel};

/// How long [`ProcessingIndicator::stop`] waits for the blinker to exit.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

struct BlinkWorker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Cancellable LED-B blinker.  `start` and `stop` are idempotent.
pub struct ProcessingIndicator {
    panel: FeedbackPanel,
    period: Duration,
    worker: Mutex<Option<BlinkWorker>>,
}

impl ProcessingIndicator {
    pub fn new(panel: FeedbackPanel, period: Duration) -> Self {
        Self {
            panel,
            period,
            worker: Mutex::new(None),
        }
    }

    /// Start blinking unless a blinker is already alive.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn start(&self) {
        let mut slot = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(worker) = slot.as_ref() {
            if !worker.handle.is_finished() {
                return;
            }
        }

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(blink(self.panel.clone(), self.period, rx));
        *slot = Some(BlinkWorker { stop: tx, handle });
        log::debug!("indicator: started");
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Stop blinking and leave LED-B off.  Safe to call when never started.
    pub async fn stop(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(BlinkWorker { stop, mut handle }) = worker {
            let _ = stop.send(true);
            if timeout(STOP_JOIN_TIMEOUT, &mut handle).await.is_err() {
                log::warn!("indicator: blinker did not exit in time, aborting");
                handle.abort();
            }
            log::debug!("indicator: stopped");
        }

        self.panel.set_led(ButtonId::B, false);
    }
}

/// Blink until `stop` turns true (or its sender goes away).
async fn blink(panel: FeedbackPanel, period: Duration, mut stop: watch::Receiver<bool>) {
    let mut on = false;
    loop {
        if *stop.borrow() {
            break;
        }
        on = !on;
        panel.set_led(ButtonId::B, on);

        tokio::select! {
            _ = sleep(period) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    panel.set_led(ButtonId::B, false);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
