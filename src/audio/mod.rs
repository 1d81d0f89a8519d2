//! Audio capture module for Fluency Capture
//!
//! This module handles microphone input capture, live level sampling,
//! waveform bars, and WAV encoding of the finished recording.
//! Uses CPAL for audio capture and hound for WAV encoding.

mod artifact;
pub mod capture;
mod level;
mod paths;
pub mod recorder;
mod waveform;

pub use artifact::{Artifact, ARTIFACT_FILE_NAME, ARTIFACT_MIME_TYPE};
pub use capture::{
    AudioChunk, AudioFormat, CaptureBackend, CaptureError, FragmentSink, Permission,
    PermissionGate,
};
pub use level::{normalize_rms, LevelMonitor};
pub use paths::{app_data_dir, cleanup_old_recordings, recordings_dir, save_artifact};
pub use recorder::{CpalCaptureBackend, CpalPermissionGate};
pub use waveform::{render_bars, WaveformInput, BASELINE_HEIGHT, DEFAULT_BAR_COUNT};
