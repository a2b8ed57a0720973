//! Pipeline orchestrator: record → transcribe → chat → persist → speak.
//!
//! [`Pipeline`] owns the collaborators of one voice interaction and the
//! state shared with the button handler.  A run is started by
//! [`Pipeline::try_start_recording`] and executes on its own task:
//!
//! ```text
//! B release ─▶ try_start_recording ── RunGuard busy? ─▶ refuse
//!                │
//!                ├─ indicator.start()
//!                └─ spawn worker
//!                     ├─ spawn stages ─────────────────────────────────┐
//!                     │    Confirmation tune                          │
//!                     │    record ∥ countdown          [Recording]    │
//!                     │    transcribe (fallback text)  [Transcribing] │
//!                     │    chat (timer ∥ request)      [Completing]   │
//!                     │    persist to history                         │
//!                     │    synthesize → play           [Synthesizing] │
//!                     └─ cleanup (always) ◀────────────────────────────┘
//!                          stop indicator, clear display, drop permit
//! ```
//!
//! The stages run in a nested task so a panic inside a collaborator still
//! reaches cleanup and re-arms the buttons.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::audio::{AudioPlayer, AudioRecorder};
use crate::config::AppConfig;
use crate::hardware::FeedbackPanel;
use crate::indicator::ProcessingIndicator;
use crate::llm::{
    compose_messages, display_name, system_prompt, with_system_message, ChatBackend, ChatMessage,
};
use crate::stt::{transcribe_wav, SttEngine};
use crate::tts::{SpeechSynthesizer, TtsError};
use crate::tune::{synthesize, TuneKind};

use super::history::{HistoryBuffer, HistoryEntry};
use super::state::{new_shared_run, update_run, PipelineRun, RunGuard, RunPermit, SharedRun, Stage};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors that end a run (or a text-only request) early.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The microphone could not produce a clip.
    #[error("recording failed: {0}")]
    Capture(String),

    /// The chat backend answered with an error.
    #[error("chat backend failed: {0}")]
    Upstream(String),

    /// A stage exceeded its deadline.
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    /// A named voice or model does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Task join failure or panic.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TtsError> for PipelineError {
    fn from(e: TtsError) -> Self {
        match e {
            TtsError::VoiceNotFound(voice) => PipelineError::NotFound(format!("voice {voice}")),
            TtsError::Timeout(secs) => PipelineError::Timeout {
                stage: "synthesis",
                secs,
            },
            other => PipelineError::Upstream(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators / settings
// ---------------------------------------------------------------------------

/// External services one run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub recorder: Arc<dyn AudioRecorder>,
    pub stt: Arc<dyn SttEngine>,
    pub chat: Arc<dyn ChatBackend>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub player: Arc<dyn AudioPlayer>,
}

/// Timing and naming knobs, resolved from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub record: Duration,
    pub context_window: usize,
    pub chat_timeout: Duration,
    pub voice: String,
    pub fallback_transcript: String,
    pub temp_dir: PathBuf,
    pub indicator_period: Duration,
    pub elapsed_blink: Duration,
    pub blink_step: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            record: Duration::from_secs(config.audio.record_secs),
            context_window: config.pipeline.context_window,
            chat_timeout: Duration::from_secs(config.llm.timeout_secs),
            voice: config.tts.default_voice.clone(),
            fallback_transcript: config.stt.fallback_transcript.clone(),
            temp_dir: config.audio.temp_dir.clone(),
            indicator_period: Duration::from_millis(config.pipeline.indicator_period_ms),
            elapsed_blink: Duration::from_secs(config.pipeline.elapsed_blink_secs),
            blink_step: Duration::from_millis(config.pipeline.blink_step_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

struct Inner {
    panel: FeedbackPanel,
    indicator: ProcessingIndicator,
    history: HistoryBuffer,
    guard: RunGuard,
    run: SharedRun,
    collab: Collaborators,
    settings: PipelineSettings,
    /// Worker of the latest recording run.
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Detached display animations (chat timer, elapsed blink).
    display_tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheap-to-clone handle on the interaction pipeline.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

impl Pipeline {
    pub fn new(panel: FeedbackPanel, collab: Collaborators, settings: PipelineSettings) -> Self {
        let indicator = ProcessingIndicator::new(panel.clone(), settings.indicator_period);
        let history = HistoryBuffer::for_context_window(settings.context_window);
        Self {
            inner: Arc::new(Inner {
                panel,
                indicator,
                history,
                guard: RunGuard::new(),
                run: new_shared_run(),
                collab,
                settings,
                worker: Mutex::new(None),
                display_tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn panel(&self) -> &FeedbackPanel {
        &self.inner.panel
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.inner.history
    }

    pub fn history_snapshot(&self) -> Vec<HistoryEntry> {
        self.inner.history.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.guard.is_busy()
    }

    pub fn indicator_running(&self) -> bool {
        self.inner.indicator.is_running()
    }

    /// Copy of the current (or last finished) run.
    pub fn current_run(&self) -> Option<PipelineRun> {
        self.inner
            .run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wipe the history unless a run is in flight.  Returns the number of
    /// entries removed.
    pub fn clear_history_if_idle(&self) -> Option<usize> {
        if self.is_busy() {
            return None;
        }
        Some(self.inner.history.clear())
    }

    /// Start a recording run for `model`.
    ///
    /// Returns `false` (and does nothing) while another run holds the guard.
    /// Must be called from inside a tokio runtime.
    pub fn try_start_recording(&self, model: impl Into<String>) -> bool {
        let Some(permit) = self.inner.guard.try_acquire() else {
            log::debug!("pipeline: run already in progress, ignoring start");
            return false;
        };
        let model = model.into();
        log::info!("pipeline: starting run with {model}");

        *self.inner.run.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(PipelineRun::new(model.clone(), self.inner.settings.voice.clone()));

        // Blink from the moment B is released, before the first stage.
        self.inner.indicator.start();

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(run_worker(inner, permit, model));
        *self.inner.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        true
    }

    /// Text-only chat request sharing the chat stage's feedback.
    ///
    /// Does not touch the history and does not take the run guard.
    pub async fn run_from_text(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        system: Option<&str>,
    ) -> Result<String, PipelineError> {
        let messages = with_system_message(messages, system);
        let result = self.inner.chat_stage(model, &messages).await;
        // A concurrent recording run owns the indicator until its cleanup,
        // whichever way this request ended.
        if !self.inner.guard.is_busy() {
            self.inner.indicator.stop().await;
        }
        result
    }

    /// Wait for the latest recording run to finish.
    pub async fn wait_for_run(&self) {
        let handle = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::error!("pipeline: worker join failed: {e}");
            }
        }
    }

    /// Join the running worker and every detached display task.
    pub async fn shutdown(&self) {
        self.wait_for_run().await;
        let tasks = std::mem::take(
            &mut *self
                .inner
                .display_tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            let _ = task.await;
        }
        self.inner.indicator.stop().await;
        log::info!("pipeline: shut down");
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

async fn run_worker(inner: Arc<Inner>, permit: RunPermit, model: String) {
    let stages = {
        let inner = Arc::clone(&inner);
        tokio::spawn(async move { inner.record_and_reply(&model).await })
    };

    let outcome = match stages.await {
        Ok(result) => result,
        Err(e) => Err(PipelineError::Internal(e.to_string())),
    };
    if let Err(e) = &outcome {
        log::error!("pipeline: run failed: {e}");
    }

    inner.cleanup(outcome.is_ok()).await;
    drop(permit);
    log::info!("pipeline: ready");
}

impl Inner {
    fn enter(&self, stage: Stage) {
        log::debug!("pipeline: stage {}", stage.label());
        update_run(&self.run, |r| r.enter(stage));
    }

    fn track_display(&self, handle: JoinHandle<()>) {
        let mut tasks = self
            .display_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Abort and join every tracked display animation, releasing the display.
    async fn cancel_display_tasks(&self) {
        let tasks = std::mem::take(
            &mut *self
                .display_tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    async fn record_and_reply(&self, model: &str) -> Result<(), PipelineError> {
        // ── 1. Record ─────────────────────────────────────────────────────
        self.enter(Stage::Recording);
        // A leftover blink from a text request must not delay the countdown.
        self.cancel_display_tasks().await;
        self.panel.play(&synthesize(TuneKind::Confirmation, None)).await;

        let clip = self
            .settings
            .temp_dir
            .join(format!("recording-{}.wav", uuid::Uuid::new_v4().simple()));
        let secs = self.settings.record.as_secs();
        let (recorded, ()) = tokio::join!(
            self.collab.recorder.record(self.settings.record, &clip),
            async { self.panel.display().await.countdown(secs).await },
        );
        if let Err(e) = recorded {
            remove_quietly(&clip);
            return Err(PipelineError::Capture(e.to_string()));
        }
        self.panel
            .play(&synthesize(TuneKind::RecordingComplete, None))
            .await;

        // ── 2. Transcribe ─────────────────────────────────────────────────
        self.enter(Stage::Transcribing);
        self.panel.play(&synthesize(TuneKind::Transcribe, None)).await;
        let transcript = match transcribe_wav(Arc::clone(&self.collab.stt), &clip).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                log::warn!("pipeline: empty transcript, using fallback");
                self.settings.fallback_transcript.clone()
            }
            Err(e) => {
                log::warn!("pipeline: transcription failed ({e}), using fallback");
                self.settings.fallback_transcript.clone()
            }
        };
        remove_quietly(&clip);
        log::info!("pipeline: heard {transcript:?}");
        update_run(&self.run, |r| r.transcript = Some(transcript.clone()));

        // ── 3. Chat ───────────────────────────────────────────────────────
        self.enter(Stage::Completing);
        let recent = self.history.recent(self.settings.context_window);
        let messages = with_system_message(
            compose_messages(&recent, model, &transcript),
            Some(&system_prompt(model)),
        );
        let reply = self.chat_stage(model, &messages).await?;
        update_run(&self.run, |r| r.reply = Some(reply.clone()));

        // ── 4. Persist ────────────────────────────────────────────────────
        self.history
            .push(HistoryEntry::new(transcript, reply.clone(), model));

        // ── 5. Speak ──────────────────────────────────────────────────────
        if let Err(e) = self.speak(&reply).await {
            log::warn!("pipeline: reply not spoken: {e}");
        }
        Ok(())
    }

    /// Chat request with the model name scrolled, then a live timer, on the
    /// display.  Starts the indicator (no-op when already blinking) and
    /// leaves stopping it to the caller.
    async fn chat_stage(&self, model: &str, messages: &[ChatMessage]) -> Result<String, PipelineError> {
        self.indicator.start();
        self.panel
            .play(&synthesize(TuneKind::OllamaStart, Some(model)))
            .await;

        let started = Instant::now();
        let (stop_tx, stop_rx) = watch::channel(false);
        let panel = self.panel.clone();
        let name = display_name(model).to_string();
        self.track_display(tokio::spawn(async move {
            let display = panel.display().await;
            display.scroll(&name).await;
            display.run_timer(started, stop_rx).await;
        }));

        let result =
            tokio::time::timeout(self.settings.chat_timeout, self.collab.chat.complete(model, messages))
                .await;
        let _ = stop_tx.send(true);

        match result {
            Ok(Ok(reply)) => {
                let elapsed = started.elapsed().as_secs();
                log::info!("pipeline: {model} answered in {elapsed}s");
                self.panel
                    .play(&synthesize(TuneKind::OllamaComplete, None))
                    .await;

                let panel = self.panel.clone();
                let (total, step) = (self.settings.elapsed_blink, self.settings.blink_step);
                self.track_display(tokio::spawn(async move {
                    panel.display().await.blink_number(elapsed, total, step).await;
                }));
                Ok(reply)
            }
            Ok(Err(e)) => Err(PipelineError::Upstream(e.to_string())),
            Err(_) => Err(PipelineError::Timeout {
                stage: "chat",
                secs: self.settings.chat_timeout.as_secs(),
            }),
        }
    }

    async fn speak(&self, reply: &str) -> Result<(), PipelineError> {
        let voice = self.settings.voice.as_str();
        self.enter(Stage::Synthesizing);
        self.panel
            .play(&synthesize(TuneKind::TtsStart, Some(voice)))
            .await;
        let wav = self.collab.tts.synthesize(voice, reply).await?;

        self.enter(Stage::Playing);
        let played = self.collab.player.play(&wav).await;
        remove_quietly(&wav);
        played.map_err(|e| PipelineError::Upstream(e.to_string()))
    }

    /// Runs on every exit path.  Leaves LED-B off and the display blank.
    async fn cleanup(&self, ok: bool) {
        self.indicator.stop().await;
        self.cancel_display_tasks().await;
        self.panel.display().await.clear();

        self.enter(if ok { Stage::Done } else { Stage::Failed });
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("pipeline: could not remove {}: {e}", path.display());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::audio::{AudioError, MockPlayer, MockRecorder};
    use crate::hardware::{ButtonId, MockSurface, SurfaceEvent};
    use crate::llm::{LlmError, MockChat, Role};
    use crate::stt::{MockSttEngine, SttError};
    use crate::tts::MockSynth;

    const MODEL: &str = "tinydolphin:1.1b";

    struct Fixture {
        pipeline: Pipeline,
        surface: Arc<MockSurface>,
        chat: Arc<MockChat>,
        synth: Arc<MockSynth>,
        player: Arc<MockPlayer>,
        _dir: tempfile::TempDir,
    }

    fn settings(dir: &Path) -> PipelineSettings {
        PipelineSettings {
            record: Duration::from_secs(10),
            context_window: 10,
            chat_timeout: Duration::from_secs(120),
            voice: "en_GB-jarvis".into(),
            fallback_transcript: "Hello, testing the system.".into(),
            temp_dir: dir.to_path_buf(),
            indicator_period: Duration::from_millis(300),
            elapsed_blink: Duration::from_secs(4),
            blink_step: Duration::from_millis(300),
        }
    }

    fn fixture_with(
        recorder: Arc<dyn AudioRecorder>,
        stt: MockSttEngine,
        chat: MockChat,
        synth_fails: bool,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(MockSurface::new());
        let panel = FeedbackPanel::new(surface.clone(), Duration::from_millis(200));
        let chat = Arc::new(chat);
        let synth = Arc::new(if synth_fails {
            MockSynth::failing(dir.path())
        } else {
            MockSynth::new(dir.path())
        });
        let player = Arc::new(MockPlayer::default());
        let collab = Collaborators {
            recorder,
            stt: Arc::new(stt),
            chat: chat.clone(),
            tts: synth.clone(),
            player: player.clone(),
        };
        Fixture {
            pipeline: Pipeline::new(panel, collab, settings(dir.path())),
            surface,
            chat,
            synth,
            player,
            _dir: dir,
        }
    }

    fn fixture(chat: MockChat) -> Fixture {
        fixture_with(
            Arc::new(MockRecorder::ok()),
            MockSttEngine::ok("what is mars"),
            chat,
            false,
        )
    }

    fn last_display_event(surface: &MockSurface) -> Option<SurfaceEvent> {
        surface
            .events()
            .into_iter()
            .rev()
            .find(|e| matches!(e, SurfaceEvent::Text(_) | SurfaceEvent::Clear))
    }

    fn assert_cleaned_up(f: &Fixture) {
        assert!(!f.pipeline.is_busy());
        assert!(!f.pipeline.indicator_running());
        assert!(!f.surface.led(ButtonId::B));
        assert_eq!(last_display_event(&f.surface), Some(SurfaceEvent::Clear));
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_visits_every_stage_in_order() {
        let f = fixture(MockChat::replying("Mars is red."));

        assert!(f.pipeline.try_start_recording(MODEL));
        assert!(f.pipeline.is_busy());
        f.pipeline.wait_for_run().await;

        let run = f.pipeline.current_run().unwrap();
        assert_eq!(
            run.visited,
            vec![
                Stage::Recording,
                Stage::Transcribing,
                Stage::Completing,
                Stage::Synthesizing,
                Stage::Playing,
                Stage::Done,
            ]
        );
        assert_eq!(run.transcript.as_deref(), Some("what is mars"));
        assert_eq!(run.reply.as_deref(), Some("Mars is red."));

        let history = f.pipeline.history_snapshot();
        assert_eq!(history, vec![HistoryEntry::new("what is mars", "Mars is red.", MODEL)]);

        assert_eq!(
            f.synth.requests(),
            vec![("en_GB-jarvis".to_string(), "Mars is red.".to_string())]
        );
        let played = f.player.played();
        assert_eq!(played.len(), 1);
        assert!(!played[0].exists(), "reply audio is deleted after playback");
        assert_cleaned_up(&f);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_refused_while_busy() {
        let f = fixture(MockChat::replying("ok"));
        assert!(f.pipeline.try_start_recording(MODEL));
        assert!(!f.pipeline.try_start_recording(MODEL));
        f.pipeline.wait_for_run().await;

        assert_eq!(f.chat.calls().len(), 1);
        assert!(f.pipeline.try_start_recording(MODEL));
        f.pipeline.wait_for_run().await;
        assert_eq!(f.chat.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn chat_request_carries_system_prompt_and_transcript() {
        let f = fixture(MockChat::replying("ok"));
        f.pipeline.try_start_recording(MODEL);
        f.pipeline.wait_for_run().await;

        let (model, messages) = f.chat.calls().remove(0);
        assert_eq!(model, MODEL);
        assert_eq!(messages.first().map(|m| m.role), Some(Role::System));
        assert_eq!(messages.first().map(|m| m.content.clone()), Some(system_prompt(MODEL)));
        let last = messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "what is mars");
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_exchanges_from_other_models_are_attributed() {
        let f = fixture(MockChat::replying("ok"));
        f.pipeline
            .history()
            .push(HistoryEntry::new("hi", "hello there", "llama3.2:3b"));

        f.pipeline.try_start_recording(MODEL);
        f.pipeline.wait_for_run().await;

        let (_, messages) = f.chat.calls().remove(0);
        assert!(messages
            .iter()
            .any(|m| m.role == Role::Assistant && m.content == "[llama3.2]: hello there"));
        assert_eq!(f.pipeline.history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn chat_failure_skips_persist_and_still_cleans_up() {
        let f = fixture(MockChat::failing("connection refused"));
        f.pipeline.try_start_recording(MODEL);
        f.pipeline.wait_for_run().await;

        assert!(f.pipeline.history().is_empty());
        assert!(f.synth.requests().is_empty());
        assert_eq!(f.pipeline.current_run().unwrap().stage, Stage::Failed);
        assert_cleaned_up(&f);
    }

    #[tokio::test(start_paused = true)]
    async fn chat_timeout_fails_the_run() {
        let f = fixture(MockChat::replying("late").with_delay(Duration::from_secs(300)));
        f.pipeline.try_start_recording(MODEL);
        f.pipeline.wait_for_run().await;

        assert!(f.pipeline.history().is_empty());
        assert_eq!(f.pipeline.current_run().unwrap().stage, Stage::Failed);
        assert_cleaned_up(&f);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failure_never_reaches_the_chat_backend() {
        let f = fixture_with(
            Arc::new(MockRecorder::failing()),
            MockSttEngine::ok("unused"),
            MockChat::replying("unused"),
            false,
        );
        f.pipeline.try_start_recording(MODEL);
        f.pipeline.wait_for_run().await;

        assert!(f.chat.calls().is_empty());
        assert_eq!(
            f.pipeline.current_run().unwrap().visited,
            vec![Stage::Recording, Stage::Failed]
        );
        assert_cleaned_up(&f);
    }

    #[tokio::test(start_paused = true)]
    async fn transcription_failure_uses_fallback_text() {
        let f = fixture_with(
            Arc::new(MockRecorder::ok()),
            MockSttEngine::err(SttError::Transcription("decoder blew up".into())),
            MockChat::replying("ok"),
            false,
        );
        f.pipeline.try_start_recording(MODEL);
        f.pipeline.wait_for_run().await;

        let (_, messages) = f.chat.calls().remove(0);
        assert_eq!(messages.last().unwrap().content, "Hello, testing the system.");
        assert_eq!(f.pipeline.current_run().unwrap().stage, Stage::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn synthesis_failure_keeps_the_exchange() {
        let f = fixture_with(
            Arc::new(MockRecorder::ok()),
            MockSttEngine::ok("what is mars"),
            MockChat::replying("Mars is red."),
            true,
        );
        f.pipeline.try_start_recording(MODEL);
        f.pipeline.wait_for_run().await;

        assert_eq!(f.pipeline.history().len(), 1);
        assert!(f.player.played().is_empty());
        let run = f.pipeline.current_run().unwrap();
        assert!(!run.visited.contains(&Stage::Playing));
        assert_eq!(run.stage, Stage::Done);
        assert_cleaned_up(&f);
    }

    struct PanickingRecorder;

    #[async_trait]
    impl AudioRecorder for PanickingRecorder {
        async fn record(&self, _duration: Duration, _dest: &Path) -> Result<(), AudioError> {
            panic!("driver exploded");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_stage_still_releases_the_guard() {
        let f = fixture_with(
            Arc::new(PanickingRecorder),
            MockSttEngine::ok("unused"),
            MockChat::replying("unused"),
            false,
        );
        f.pipeline.try_start_recording(MODEL);
        f.pipeline.wait_for_run().await;

        assert_eq!(f.pipeline.current_run().unwrap().stage, Stage::Failed);
        assert_cleaned_up(&f);
    }

    #[tokio::test(start_paused = true)]
    async fn text_request_bypasses_history_and_guard() {
        let f = fixture(MockChat::replying("Four."));
        let reply = f
            .pipeline
            .run_from_text(MODEL, vec![ChatMessage::user("2 + 2?")], Some("Be brief."))
            .await
            .unwrap();

        assert_eq!(reply, "Four.");
        assert!(f.pipeline.history().is_empty());
        assert!(!f.pipeline.is_busy());
        assert!(!f.pipeline.indicator_running());

        let (_, messages) = f.chat.calls().remove(0);
        assert_eq!(messages[0], ChatMessage::system("Be brief."));
        f.pipeline.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn text_request_failure_is_reported() {
        let f = fixture(MockChat::failing("boom"));
        let err = f
            .pipeline
            .run_from_text(MODEL, vec![ChatMessage::user("hi")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Upstream(_)));
        assert!(!f.pipeline.indicator_running());
    }

    #[tokio::test(start_paused = true)]
    async fn history_cannot_be_cleared_mid_run() {
        let f = fixture(MockChat::replying("ok"));
        f.pipeline.history().push(HistoryEntry::new("a", "b", MODEL));

        f.pipeline.try_start_recording(MODEL);
        assert_eq!(f.pipeline.clear_history_if_idle(), None);
        f.pipeline.wait_for_run().await;
        assert_eq!(f.pipeline.clear_history_if_idle(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_is_not_held_up_by_a_text_request_blink() {
        let f = fixture(MockChat::replying("Four."));
        f.pipeline
            .run_from_text(MODEL, vec![ChatMessage::user("2 + 2?")], None)
            .await
            .unwrap();

        // The elapsed-time blink from the text request is still running.
        let mark = f.surface.events().len();
        assert!(f.pipeline.try_start_recording(MODEL));
        let confirmation = synthesize(TuneKind::Confirmation, None).total_duration();
        tokio::time::sleep(confirmation + Duration::from_millis(100)).await;

        let since = f.surface.events().split_off(mark);
        assert!(
            since.contains(&SurfaceEvent::Text("  10".into())),
            "countdown did not start: {since:?}"
        );
        f.pipeline.wait_for_run().await;
        assert_eq!(f.pipeline.current_run().unwrap().stage, Stage::Done);
    }

    /// Fails at once for [`BROKEN_MODEL`], answers slowly for anything else.
    struct SplitChat;

    const BROKEN_MODEL: &str = "broken:1b";

    #[async_trait]
    impl ChatBackend for SplitChat {
        async fn complete(&self, model: &str, _messages: &[ChatMessage]) -> Result<String, LlmError> {
            if model == BROKEN_MODEL {
                return Err(LlmError::Request("model exploded".into()));
            }
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("slow answer".into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_text_request_leaves_the_run_indicator_alone() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(MockSurface::new());
        let panel = FeedbackPanel::new(surface.clone(), Duration::from_millis(200));
        let collab = Collaborators {
            recorder: Arc::new(MockRecorder::ok()),
            stt: Arc::new(MockSttEngine::ok("what is mars")),
            chat: Arc::new(SplitChat),
            tts: Arc::new(MockSynth::new(dir.path())),
            player: Arc::new(MockPlayer::default()),
        };
        let pipeline = Pipeline::new(panel, collab, settings(dir.path()));

        assert!(pipeline.try_start_recording(MODEL));
        for _ in 0..300 {
            if pipeline.current_run().map(|r| r.stage) == Some(Stage::Completing) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(pipeline.current_run().unwrap().stage, Stage::Completing);

        let err = pipeline
            .run_from_text(BROKEN_MODEL, vec![ChatMessage::user("hi")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Upstream(_)));
        assert!(pipeline.is_busy());
        assert!(pipeline.indicator_running(), "run still owns LED-B");

        pipeline.wait_for_run().await;
        assert_eq!(pipeline.current_run().unwrap().stage, Stage::Done);
        assert!(!pipeline.indicator_running());
        assert!(!surface.led(ButtonId::B));
    }

    #[test]
    fn unknown_voice_maps_to_not_found() {
        let err = PipelineError::from(TtsError::VoiceNotFound("xx".into()));
        assert_eq!(err, PipelineError::NotFound("voice xx".into()));
        assert_eq!(err.to_string(), "not found: voice xx");
    }
}
