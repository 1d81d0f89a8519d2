//! Hardware seam for microphone capture
//!
//! The session never talks to a device directly. It asks a `PermissionGate`
//! for access, then opens a `CaptureBackend` that pushes encoded fragments
//! through a `FragmentSink` until it is released.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state_machine::Event;

/// Errors that can occur while opening or running the input stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("No audio input device found")]
    NoInputDevice,

    #[error("No supported audio configuration")]
    NoSupportedConfig,

    #[error("Failed to create audio stream: {0}")]
    StreamCreationFailed(String),

    #[error("Audio stream error: {0}")]
    StreamFailed(String),

    #[error("Failed to encode recording: {0}")]
    EncodingFailed(String),

    #[error("Audio device is busy with another recording")]
    DeviceBusy,
}

/// Outcome of a permission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied { reason: String },
}

impl Permission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Permission::Granted)
    }
}

/// Format negotiated with the device when the stream opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    /// Interleaved samples per second of audio.
    pub fn samples_per_second(&self) -> usize {
        self.sample_rate as usize * self.channels.max(1) as usize
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
        }
    }
}

/// One encoder fragment: interleaved 16-bit PCM samples in arrival order.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
}

impl fmt::Debug for AudioChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioChunk({} samples)", self.samples.len())
    }
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Delivery endpoint handed to a backend on `acquire`.
///
/// Cloneable and safe to call from the device thread. Every call is tagged
/// with the session id, so fragments from a released stream are dropped by the
/// state machine instead of leaking into the next recording.
#[derive(Debug, Clone)]
pub struct FragmentSink {
    session_id: Uuid,
    tx: mpsc::UnboundedSender<Event>,
}

impl FragmentSink {
    pub(crate) fn new(session_id: Uuid, tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { session_id, tx }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Hand a fragment to the session. Returns false once the session is gone.
    pub fn deliver(&self, chunk: AudioChunk) -> bool {
        if chunk.is_empty() {
            return true;
        }
        self.tx
            .send(Event::Fragment {
                id: self.session_id,
                chunk,
            })
            .is_ok()
    }

    /// Report a stream failure that happened after the stream was opened.
    pub fn fail(&self, err: CaptureError) {
        log::error!("Capture {} reported failure: {}", self.session_id, err);
        let _ = self.tx.send(Event::HardwareError {
            id: self.session_id,
            err,
        });
    }
}

/// Negotiates microphone access with the operating environment.
#[async_trait]
pub trait PermissionGate: Send {
    async fn request_access(&mut self) -> Permission;
}

/// Owns the input stream and the encoder bound to it.
///
/// At most one stream is open at a time. `release` must be safe to call any
/// number of times, including when nothing was acquired.
#[async_trait]
pub trait CaptureBackend: Send {
    /// Open the input stream and start delivering fragments to `sink`.
    async fn acquire(&mut self, sink: FragmentSink) -> Result<AudioFormat, CaptureError>;

    /// Stop delivering fragments without closing the stream.
    fn pause(&mut self) -> Result<(), CaptureError>;

    /// Continue delivering fragments after `pause`.
    fn resume(&mut self) -> Result<(), CaptureError>;

    /// Close the stream and any analysis resources. Synchronous and idempotent.
    fn release(&mut self);

    fn is_active(&self) -> bool;
}
