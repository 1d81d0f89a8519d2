//! Effect runner for Fluency Capture
//!
//! This module executes the effects produced by the state machine. It is the
//! only owner of the permission gate, the capture backend, the active timers
//! and the recorded chunks; everything runs on the session loop, so none of
//! it needs a lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::audio::{
    cleanup_old_recordings, save_artifact, Artifact, AudioChunk, AudioFormat, CaptureBackend,
    FragmentSink, LevelMonitor, Permission, PermissionGate,
};
use crate::notify::Notifier;
use crate::settings::RecorderSettings;
use crate::state_machine::{Effect, Event};
use crate::timers::ActiveTimers;

/// Host callback invoked once per completed recording.
pub type RecordingCompleteCallback = Box<dyn FnMut(Artifact) + Send>;

/// Data owned by the current session.
struct CaptureBuffer {
    format: AudioFormat,
    chunks: Vec<AudioChunk>,
    monitor: LevelMonitor,
}

impl CaptureBuffer {
    fn new(format: AudioFormat) -> Self {
        Self {
            format,
            chunks: Vec::new(),
            monitor: LevelMonitor::new(format),
        }
    }
}

/// Runs effects against the hardware seam, the timers and the host callbacks.
pub struct EffectRunner {
    gate: Box<dyn PermissionGate>,
    backend: Box<dyn CaptureBackend>,
    timers: ActiveTimers,
    notifier: Arc<dyn Notifier>,
    on_complete: Option<RecordingCompleteCallback>,
    tx: mpsc::UnboundedSender<Event>,
    buffer: Option<CaptureBuffer>,
    /// Set when finished recordings are also written to disk.
    keep_dir: Option<PathBuf>,
    /// Last known permission status, for UI affordances only.
    microphone_available: Option<bool>,
}

impl EffectRunner {
    pub fn new(
        settings: &RecorderSettings,
        gate: Box<dyn PermissionGate>,
        backend: Box<dyn CaptureBackend>,
        notifier: Arc<dyn Notifier>,
        on_complete: Option<RecordingCompleteCallback>,
        tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            gate,
            backend,
            timers: ActiveTimers::new(settings.level_interval(), settings.duration_tick()),
            notifier,
            on_complete,
            tx,
            buffer: None,
            keep_dir: settings
                .keep_recordings
                .then(|| settings.kept_recordings_dir()),
            microphone_available: None,
        }
    }

    /// One-time probe at mount. Only pre-populates the UI; `start` asks again.
    pub async fn probe_permission(&mut self) {
        let permission = self.gate.request_access().await;
        log::debug!("Initial microphone probe: {:?}", permission);
        self.microphone_available = Some(permission.is_granted());
    }

    pub fn microphone_available(&self) -> Option<bool> {
        self.microphone_available
    }

    /// Chunks recorded so far in the current session.
    #[cfg(test)]
    pub fn recorded_chunks(&self) -> usize {
        self.buffer.as_ref().map(|b| b.chunks.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn input_active(&self) -> bool {
        self.backend.is_active()
    }

    /// Execute one effect. Returns the follow-up event, if the effect produced one.
    ///
    /// `EmitUi` is handled by the session loop, never here.
    pub async fn run(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::ResetCapture => {
                // A new session never inherits the previous stream or data.
                self.timers.cancel();
                self.backend.release();
                self.buffer = None;
                None
            }

            Effect::AcquireInput { id } => Some(self.acquire_input(id).await),

            Effect::PauseInput => {
                if let Err(e) = self.backend.pause() {
                    log::warn!("Failed to pause input: {}", e);
                }
                None
            }

            Effect::ResumeInput { id } => match self.backend.resume() {
                Ok(()) => None,
                Err(err) => {
                    log::error!("Failed to resume input: {}", err);
                    Some(Event::HardwareError { id, err })
                }
            },

            Effect::ReleaseInput => {
                self.backend.release();
                if let Some(buffer) = self.buffer.as_mut() {
                    buffer.monitor.clear();
                }
                None
            }

            Effect::StartTimers { id } => {
                self.timers.start(id, self.tx.clone());
                None
            }

            Effect::CancelTimers => {
                self.timers.cancel();
                None
            }

            Effect::AppendChunk { chunk } => {
                if let Some(buffer) = self.buffer.as_mut() {
                    buffer.monitor.push_samples(&chunk.samples);
                    buffer.chunks.push(chunk);
                }
                None
            }

            Effect::SampleLevel { id } => {
                let level = self
                    .buffer
                    .as_ref()
                    .map(|b| b.monitor.level())
                    .unwrap_or(0.0);
                Some(Event::LevelSampled { id, level })
            }

            Effect::FinalizeArtifact { id } => {
                let Some(buffer) = self.buffer.take() else {
                    return Some(Event::ArtifactFailed {
                        id,
                        err: crate::audio::CaptureError::EncodingFailed(
                            "no audio was captured".to_string(),
                        ),
                    });
                };
                log::info!(
                    "Finalizing recording {} ({} chunks)",
                    id,
                    buffer.chunks.len()
                );
                match Artifact::encode(id, buffer.format, &buffer.chunks) {
                    Ok(artifact) => Some(Event::ArtifactReady { id, artifact }),
                    Err(err) => Some(Event::ArtifactFailed { id, err }),
                }
            }

            Effect::DiscardCapture => {
                if let Some(buffer) = self.buffer.take() {
                    log::debug!("Discarded {} recorded chunks", buffer.chunks.len());
                }
                None
            }

            Effect::DeliverArtifact { artifact } => {
                log::info!(
                    "Recording {} complete: {:?}, {} bytes",
                    artifact.session_id(),
                    artifact.duration(),
                    artifact.len()
                );
                if let Some(dir) = &self.keep_dir {
                    keep_recording(dir, &artifact);
                }
                if let Some(callback) = self.on_complete.as_mut() {
                    callback(artifact);
                }
                None
            }

            Effect::Notify { notice } => {
                self.notifier.notify(notice);
                None
            }

            Effect::EmitUi => {
                log::debug!("EmitUi reached the effect runner; ignored");
                None
            }
        }
    }

    /// Re-probe permission, then open the stream for session `id`.
    async fn acquire_input(&mut self, id: Uuid) -> Event {
        match self.gate.request_access().await {
            Permission::Denied { reason } => {
                self.microphone_available = Some(false);
                Event::PermissionDenied { id, reason }
            }
            Permission::Granted => {
                self.microphone_available = Some(true);
                // Exclusive ownership: nothing from an earlier session may still be open.
                self.backend.release();

                let sink = FragmentSink::new(id, self.tx.clone());
                match self.backend.acquire(sink).await {
                    Ok(format) => {
                        log::info!(
                            "Input ready for {}: {} Hz, {} channels",
                            id,
                            format.sample_rate,
                            format.channels
                        );
                        self.buffer = Some(CaptureBuffer::new(format));
                        Event::InputReady { id }
                    }
                    Err(err) => {
                        log::error!("Failed to open input for {}: {}", id, err);
                        Event::InputFailed { id, err }
                    }
                }
            }
        }
    }

    /// Unconditional release on teardown.
    pub fn shutdown(&mut self) {
        if self.timers.is_running() || self.backend.is_active() {
            log::info!("Releasing capture resources");
        }
        self.timers.cancel();
        self.backend.release();
        self.buffer = None;
    }
}

impl Drop for EffectRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn keep_recording(dir: &Path, artifact: &Artifact) {
    match save_artifact(dir, artifact) {
        Ok(path) => log::info!("Recording kept at {:?}", path),
        Err(e) => log::warn!("Failed to keep recording: {}", e),
    }
    match cleanup_old_recordings(dir) {
        Ok(count) if count > 0 => log::info!("Cleaned up {} old recordings", count),
        Ok(_) => {}
        Err(e) => log::warn!("Failed to cleanup old recordings: {}", e),
    }
}
