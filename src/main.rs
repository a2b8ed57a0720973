//! Application entry point for RoverSeer.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (defaults on first run).
//! 3. Create the tokio runtime.
//! 4. Pick the hardware surface and build the feedback panel.
//! 5. Build the collaborators (Whisper, Ollama, Piper, aplay, cpal).
//! 6. Fetch the model list for the A/C carousel.
//! 7. Start the keyboard button listener and the button machine.
//! 8. Wait for Ctrl-C, then close the event channel and drain the pipeline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;

use roverseer::{
    audio::{AplayPlayer, CpalRecorder},
    buttons::{ButtonEvent, ButtonListener, ButtonMachine, KeyMap, ModelSelection},
    config::AppConfig,
    hardware::{select_surface, FeedbackPanel},
    llm::OllamaClient,
    pipeline::{Collaborators, Pipeline, PipelineSettings},
    stt::{NoModelStt, SttEngine, TranscribeParams, WhisperEngine},
    tts::PiperSynth,
};

fn load_stt(config: &AppConfig) -> Arc<dyn SttEngine> {
    let path = config.stt_model_path();
    match WhisperEngine::load(&path, TranscribeParams::from_config(&config.stt)) {
        Ok(engine) => {
            log::info!("Whisper model loaded: {}", path.display());
            Arc::new(engine)
        }
        Err(e) => {
            log::warn!(
                "Could not load Whisper model ({}): {e}. Runs will use the fallback transcript.",
                path.display()
            );
            Arc::new(NoModelStt::new(path.display().to_string()))
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    // 4. Hardware
    let surface = select_surface(&config.hardware);
    let panel = FeedbackPanel::new(
        surface,
        Duration::from_millis(config.hardware.scroll_step_ms),
    );
    log::info!("hardware surface: {}", panel.surface_name());

    // 5. Collaborators
    std::fs::create_dir_all(&config.audio.temp_dir).with_context(|| {
        format!("cannot create temp dir {}", config.audio.temp_dir.display())
    })?;
    let ollama = Arc::new(OllamaClient::from_config(&config.llm));
    let collab = Collaborators {
        recorder: Arc::new(CpalRecorder),
        stt: load_stt(&config),
        chat: ollama.clone(),
        tts: Arc::new(PiperSynth::from_config(&config.tts, &config.audio.temp_dir)),
        player: Arc::new(AplayPlayer::new(config.audio.output_device.clone())),
    };
    let pipeline = Pipeline::new(panel, collab, PipelineSettings::from_config(&config));

    // 6. Model carousel
    let selection = ModelSelection::new(ollama.models_or_default().await);

    // 7. Buttons
    let keymap = KeyMap::from_config(&config.buttons)?;
    let (button_tx, button_rx) = mpsc::channel::<ButtonEvent>(32);
    let listener = ButtonListener::start(keymap, button_tx)
        .context("failed to spawn button-listener thread")?;
    let machine = ButtonMachine::new(
        pipeline.clone(),
        selection,
        Duration::from_secs(config.buttons.clear_hold_secs),
    );
    let buttons = tokio::spawn(machine.run(button_rx));

    log::info!(
        "ready: {} = previous model, {} = ask, {} = next model",
        config.buttons.key_a,
        config.buttons.key_b,
        config.buttons.key_c
    );

    // 8. Shutdown
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    log::info!("shutting down");

    // Dropping the listener closes the event channel; the machine then
    // drains its own feedback tasks and returns.
    drop(listener);
    if let Err(e) = buttons.await {
        log::error!("button machine failed: {e}");
    }
    pipeline.shutdown().await;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("RoverSeer starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(serve(config))
}
