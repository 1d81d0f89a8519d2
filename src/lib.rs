pub mod audio;
mod effects;
pub mod notify;
pub mod settings;
pub mod state_machine;
pub mod submission;
mod timers;

use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use audio::{
    render_bars, Artifact, CaptureBackend, CpalCaptureBackend, CpalPermissionGate, PermissionGate,
    WaveformInput,
};
use effects::EffectRunner;
use notify::{LogNotifier, Notifier};
use settings::RecorderSettings;
use state_machine::{reduce, Effect, Event, SessionLimits, State};

pub use effects::RecordingCompleteCallback;

/// Session state as shown to the host view.
/// Uses tagged union format: { "status": "idle" } or { "status": "recording", "elapsedSecs": 5, ... }
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum UiState {
    Idle,
    RequestingPermission,
    #[serde(rename_all = "camelCase")]
    Recording {
        elapsed_secs: u32,
        /// "m:ss"
        elapsed: String,
        level: f32,
    },
    #[serde(rename_all = "camelCase")]
    Paused { elapsed_secs: u32, elapsed: String },
    #[serde(rename_all = "camelCase")]
    Finalizing { elapsed_secs: u32 },
    #[serde(rename_all = "camelCase")]
    Completed {
        elapsed_secs: u32,
        elapsed: String,
        duration_ms: u64,
    },
    Failed { message: String },
}

/// Everything the host needs to draw the recorder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderView {
    #[serde(flatten)]
    pub state: UiState,
    /// The "microphone access required" modal is visible.
    pub permission_modal: bool,
    /// Last known permission status; `None` until the first probe returns.
    pub microphone_available: Option<bool>,
    pub max_duration_secs: u32,
    /// Waveform bar heights in [0, 1].
    pub bars: Vec<f32>,
    /// The finished recording while the session is `Completed`.
    #[serde(skip)]
    pub artifact: Option<Artifact>,
}

impl RecorderView {
    pub fn is_recording(&self) -> bool {
        matches!(self.state, UiState::Recording { .. })
    }

    pub fn elapsed_secs(&self) -> u32 {
        match &self.state {
            UiState::Recording { elapsed_secs, .. }
            | UiState::Paused { elapsed_secs, .. }
            | UiState::Finalizing { elapsed_secs }
            | UiState::Completed { elapsed_secs, .. } => *elapsed_secs,
            _ => 0,
        }
    }
}

/// Format seconds as "m:ss"
pub fn format_elapsed(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Convert internal State to UiState for the host
fn state_to_ui(state: &State) -> UiState {
    match state {
        State::Idle { .. } => UiState::Idle,
        State::AwaitingPermission { .. } => UiState::RequestingPermission,
        State::Recording {
            elapsed_secs,
            level,
            ..
        } => UiState::Recording {
            elapsed_secs: *elapsed_secs,
            elapsed: format_elapsed(*elapsed_secs),
            level: *level,
        },
        State::Paused { elapsed_secs, .. } => UiState::Paused {
            elapsed_secs: *elapsed_secs,
            elapsed: format_elapsed(*elapsed_secs),
        },
        State::Finalizing { elapsed_secs, .. } => UiState::Finalizing {
            elapsed_secs: *elapsed_secs,
        },
        State::Completed {
            elapsed_secs,
            artifact,
            ..
        } => UiState::Completed {
            elapsed_secs: *elapsed_secs,
            elapsed: format_elapsed(*elapsed_secs),
            duration_ms: artifact.duration().as_millis() as u64,
        },
        State::Failed { message, .. } => UiState::Failed {
            message: message.clone(),
        },
    }
}

fn build_view(
    state: &State,
    runner: &EffectRunner,
    limits: &SessionLimits,
    bar_count: usize,
    rng: &mut StdRng,
) -> RecorderView {
    let input = match state {
        State::Recording { level, .. } => WaveformInput::Live {
            level: Some(*level),
        },
        _ => WaveformInput::Idle,
    };

    RecorderView {
        state: state_to_ui(state),
        permission_modal: matches!(
            state,
            State::Idle {
                permission_modal: true
            }
        ),
        microphone_available: runner.microphone_available(),
        max_duration_secs: limits.max_duration_secs,
        bars: render_bars(bar_count, input, rng),
        artifact: match state {
            State::Completed { artifact, .. } => Some(artifact.clone()),
            _ => None,
        },
    }
}

/// What the host supplies to mount a recorder.
pub struct RecorderConfig {
    settings: RecorderSettings,
    gate: Box<dyn PermissionGate>,
    backend: Box<dyn CaptureBackend>,
    notifier: Arc<dyn Notifier>,
    on_recording_complete: Option<RecordingCompleteCallback>,
    waveform_seed: Option<u64>,
}

impl RecorderConfig {
    /// Default input device via cpal, notices to the log.
    pub fn new(settings: RecorderSettings) -> Self {
        Self {
            settings: settings.validated(),
            gate: Box::new(CpalPermissionGate::new()),
            backend: Box::new(CpalCaptureBackend::new()),
            notifier: Arc::new(LogNotifier),
            on_recording_complete: None,
            waveform_seed: None,
        }
    }

    pub fn with_permission_gate(mut self, gate: impl PermissionGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    pub fn with_capture_backend(mut self, backend: impl CaptureBackend + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Called once with the artifact of every session that reaches `Completed`.
    pub fn on_recording_complete<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Artifact) + Send + 'static,
    {
        self.on_recording_complete = Some(Box::new(callback));
        self
    }

    /// Fixed seed for the waveform jitter.
    pub fn with_waveform_seed(mut self, seed: u64) -> Self {
        self.waveform_seed = Some(seed);
        self
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Recorder has shut down")]
pub struct RecorderClosed;

/// Host-side handle to a mounted recorder.
///
/// Dropping the handle unmounts the recorder: the state loop tears down and
/// the input stream is released.
pub struct RecorderHandle {
    tx: mpsc::UnboundedSender<Event>,
    view: watch::Receiver<RecorderView>,
    task: Option<JoinHandle<()>>,
}

impl RecorderHandle {
    fn send(&self, event: Event) -> Result<(), RecorderClosed> {
        self.tx.send(event).map_err(|_| RecorderClosed)
    }

    pub fn start(&self) -> Result<(), RecorderClosed> {
        self.send(Event::Start)
    }

    pub fn pause(&self) -> Result<(), RecorderClosed> {
        self.send(Event::Pause)
    }

    pub fn resume(&self) -> Result<(), RecorderClosed> {
        self.send(Event::Resume)
    }

    pub fn stop(&self) -> Result<(), RecorderClosed> {
        self.send(Event::Stop)
    }

    pub fn dismiss_permission_modal(&self) -> Result<(), RecorderClosed> {
        self.send(Event::DismissPermissionModal)
    }

    /// Latest published view.
    pub fn view(&self) -> RecorderView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RecorderView> {
        self.view.clone()
    }

    /// Tear down and wait until every resource is released.
    pub async fn shutdown(mut self) {
        let _ = self.send(Event::Teardown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::error!("Recorder loop ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for RecorderHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.tx.send(Event::Teardown);
        }
    }
}

/// Mount a recorder. Must be called from within a tokio runtime.
pub fn spawn_recorder(config: RecorderConfig) -> RecorderHandle {
    let RecorderConfig {
        settings,
        gate,
        backend,
        notifier,
        on_recording_complete,
        waveform_seed,
    } = config;

    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    let limits = settings.limits();
    let bar_count = settings.waveform_bars.max(1);
    let mut rng = match waveform_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let runner = EffectRunner::new(
        &settings,
        gate,
        backend,
        notifier,
        on_recording_complete,
        tx.clone(),
    );

    let initial = build_view(&State::default(), &runner, &limits, bar_count, &mut rng);
    let (view_tx, view_rx) = watch::channel(initial);

    let task = tokio::spawn(run_state_loop(rx, runner, view_tx, limits, bar_count, rng));

    RecorderHandle {
        tx,
        view: view_rx,
        task: Some(task),
    }
}

/// Run the session loop
///
/// Single writer: events are reduced one at a time, and the follow-up events
/// an effect produces are handled before the next queued event.
async fn run_state_loop(
    mut rx: mpsc::UnboundedReceiver<Event>,
    mut runner: EffectRunner,
    view_tx: watch::Sender<RecorderView>,
    limits: SessionLimits,
    bar_count: usize,
    mut rng: StdRng,
) {
    let mut state = State::default();

    runner.probe_permission().await;
    view_tx.send_replace(build_view(&state, &runner, &limits, bar_count, &mut rng));
    log::info!("State loop started");

    let mut pending = VecDeque::new();
    'outer: while let Some(event) = rx.recv().await {
        pending.push_back(event);

        while let Some(event) = pending.pop_front() {
            let teardown = matches!(event, Event::Teardown);
            if !event.is_chatty() {
                log::debug!("Received event: {:?}", event);
            }

            let old_discriminant = std::mem::discriminant(&state);
            let (next, effects) = reduce(&state, event, &limits);
            let new_discriminant = std::mem::discriminant(&next);

            // Log state transitions
            if old_discriminant != new_discriminant {
                log::info!("State transition: {} -> {}", state.name(), next.name());
            }

            state = next;

            for eff in effects {
                match eff {
                    Effect::EmitUi => {
                        view_tx.send_replace(build_view(
                            &state, &runner, &limits, bar_count, &mut rng,
                        ));
                    }
                    other => {
                        if let Some(follow_up) = runner.run(other).await {
                            pending.push_back(follow_up);
                        }
                    }
                }
            }

            if teardown {
                log::info!("Teardown requested, shutting down state loop");
                break 'outer;
            }
        }
    }

    runner.shutdown();
    view_tx.send_replace(build_view(&state, &runner, &limits, bar_count, &mut rng));
    log::info!("State loop ended");
}
