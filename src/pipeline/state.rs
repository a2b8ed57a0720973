//! Run bookkeeping: the stage machine, the per-run record and the
//! single-run guard.
//!
//! [`RunGuard`] is the only thing deciding whether a run may start.  A
//! successful [`RunGuard::try_acquire`] yields a [`RunPermit`]; dropping the
//! permit re-arms the buttons.  Holding the permit in the worker means even a
//! panicking run releases the guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Stages of one run, in execution order.
///
/// ```text
/// Idle ──B release──▶ Recording ──▶ Transcribing ──▶ Completing
///                                                     │
///                     Done ◀── Playing ◀── Synthesizing
/// any stage ──fatal error──▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Idle,
    Recording,
    Transcribing,
    Completing,
    Synthesizing,
    Playing,
    Done,
    Failed,
}

impl Stage {
    /// `true` while the run still has stages ahead of it.
    ///
    /// ```
    /// use roverseer::pipeline::Stage;
    ///
    /// assert!(!Stage::Idle.is_active());
    /// assert!(Stage::Completing.is_active());
    /// assert!(!Stage::Failed.is_active());
    /// ```
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Stage::Recording
                | Stage::Transcribing
                | Stage::Completing
                | Stage::Synthesizing
                | Stage::Playing
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Idle => "Idle",
            Stage::Recording => "Recording",
            Stage::Transcribing => "Transcribing",
            Stage::Completing => "Completing",
            Stage::Synthesizing => "Synthesizing",
            Stage::Playing => "Playing",
            Stage::Done => "Done",
            Stage::Failed => "Failed",
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineRun
// ---------------------------------------------------------------------------

/// Record of the current (or last) run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub started_at: Instant,
    pub model: String,
    pub voice: String,
    /// `None` until transcription finishes.
    pub transcript: Option<String>,
    /// `None` until the chat backend answers.
    pub reply: Option<String>,
    pub stage: Stage,
    /// Every stage entered so far, in order.
    pub visited: Vec<Stage>,
}

impl PipelineRun {
    pub fn new(model: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            started_at: Instant::now(),
            model: model.into(),
            voice: voice.into(),
            transcript: None,
            reply: None,
            stage: Stage::Idle,
            visited: Vec::new(),
        }
    }

    pub fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.visited.push(stage);
    }
}

/// Latest run, shared between the worker and anyone observing it.
///
/// Lock for a short critical section only; never across `.await`.
pub type SharedRun = Arc<Mutex<Option<PipelineRun>>>;

pub fn new_shared_run() -> SharedRun {
    Arc::new(Mutex::new(None))
}

/// Update the shared run in place, tolerating a poisoned lock.
pub(crate) fn update_run(run: &SharedRun, f: impl FnOnce(&mut PipelineRun)) {
    let mut guard = run.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(current) = guard.as_mut() {
        f(current);
    }
}

// ---------------------------------------------------------------------------
// RunGuard
// ---------------------------------------------------------------------------

/// Single-run-at-a-time flag.  Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    busy: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard.  `None` when a run is already in progress.
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the current run.  Released on drop.
#[derive(Debug)]
pub struct RunPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use proptest::prelude::*;

    #[test]
    fn default_stage_is_idle() {
        assert_eq!(Stage::default(), Stage::Idle);
    }

    #[test]
    fn only_middle_stages_are_active() {
        assert!(!Stage::Idle.is_active());
        assert!(Stage::Recording.is_active());
        assert!(Stage::Playing.is_active());
        assert!(!Stage::Done.is_active());
        assert!(!Stage::Failed.is_active());
    }

    #[test]
    fn labels() {
        assert_eq!(Stage::Completing.label(), "Completing");
        assert_eq!(Stage::Failed.label(), "Failed");
    }

    #[test]
    fn second_acquire_fails_until_permit_dropped() {
        let guard = RunGuard::new();
        let permit = guard.try_acquire();
        assert!(permit.is_some());
        assert!(guard.is_busy());
        assert!(guard.try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_busy());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn clones_share_the_flag() {
        let a = RunGuard::new();
        let b = a.clone();
        let _permit = a.try_acquire().unwrap();
        assert!(b.is_busy());
    }

    #[test]
    fn update_run_touches_current_run_only() {
        let run = new_shared_run();
        update_run(&run, |r| r.stage = Stage::Done);
        assert!(run.lock().unwrap().is_none());

        *run.lock().unwrap() = Some(PipelineRun::new("m", "v"));
        update_run(&run, |r| r.enter(Stage::Recording));
        update_run(&run, |r| r.enter(Stage::Failed));
        let current = run.lock().unwrap().clone().unwrap();
        assert_eq!(current.stage, Stage::Failed);
        assert_eq!(current.visited, vec![Stage::Recording, Stage::Failed]);
    }

    #[test]
    fn threads_racing_for_the_guard_never_overlap() {
        let guard = RunGuard::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = guard.clone();
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        if let Some(permit) = guard.try_acquire() {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            std::thread::yield_now();
                            active.fetch_sub(1, Ordering::SeqCst);
                            drop(permit);
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    proptest! {
        /// Any interleaving of acquire / release attempts keeps at most one
        /// permit alive.
        #[test]
        fn at_most_one_permit(ops in proptest::collection::vec(any::<bool>(), 0..64)) {
            let guard = RunGuard::new();
            let mut held: Vec<RunPermit> = Vec::new();
            for acquire in ops {
                if acquire {
                    if let Some(p) = guard.try_acquire() {
                        held.push(p);
                    }
                } else {
                    held.pop();
                }
                prop_assert!(held.len() <= 1);
                prop_assert_eq!(guard.is_busy(), !held.is_empty());
            }
        }
    }
}
