//! Microphone capture using CPAL
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated audio
//! thread. The backend talks to that thread over a control channel and the
//! stream callback pushes 16-bit fragments straight into the session's sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use tokio::sync::oneshot;

use super::capture::{
    AudioChunk, AudioFormat, CaptureBackend, CaptureError, FragmentSink, Permission,
    PermissionGate,
};

/// Messages from the backend to the audio thread.
enum Control {
    Pause,
    Resume,
    Release,
}

/// Locate the default input device and its default configuration.
fn default_input() -> Result<(Device, StreamConfig, SampleFormat), CaptureError> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or(CaptureError::NoInputDevice)?;

    let supported_config = device
        .default_input_config()
        .map_err(|_| CaptureError::NoSupportedConfig)?;

    let sample_format = supported_config.sample_format();
    let config: StreamConfig = supported_config.into();

    Ok((device, config, sample_format))
}

/// Permission gate for desktop hosts.
///
/// Desktop platforms grant access implicitly, so access is "granted" when a
/// default input device with a usable configuration can be opened right now.
#[derive(Debug, Default)]
pub struct CpalPermissionGate;

impl CpalPermissionGate {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PermissionGate for CpalPermissionGate {
    async fn request_access(&mut self) -> Permission {
        let probe = tokio::task::spawn_blocking(|| default_input().map(|_| ())).await;
        match probe {
            Ok(Ok(())) => Permission::Granted,
            Ok(Err(e)) => {
                log::warn!("Microphone probe failed: {}", e);
                Permission::Denied {
                    reason: e.to_string(),
                }
            }
            Err(e) => Permission::Denied {
                reason: format!("Microphone probe did not complete: {}", e),
            },
        }
    }
}

/// Handle to the running audio thread.
struct AudioThread {
    control: std_mpsc::Sender<Control>,
    paused: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// Capture backend that records from the default input device.
#[derive(Default)]
pub struct CpalCaptureBackend {
    active: Option<AudioThread>,
}

impl CpalCaptureBackend {
    pub fn new() -> Self {
        Self { active: None }
    }
}

#[async_trait]
impl CaptureBackend for CpalCaptureBackend {
    async fn acquire(&mut self, sink: FragmentSink) -> Result<AudioFormat, CaptureError> {
        if self.active.is_some() {
            return Err(CaptureError::DeviceBusy);
        }

        let (control_tx, control_rx) = std_mpsc::channel::<Control>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<AudioFormat, CaptureError>>();
        let paused = Arc::new(AtomicBool::new(false));
        let paused_for_thread = paused.clone();

        let thread = std::thread::Builder::new()
            .name("fluency-audio".to_string())
            .spawn(move || run_audio_thread(sink, paused_for_thread, control_rx, ready_tx))
            .map_err(|e| CaptureError::StreamCreationFailed(e.to_string()))?;

        let mut handle = AudioThread {
            control: control_tx,
            paused,
            thread: Some(thread),
        };

        match ready_rx.await {
            Ok(Ok(format)) => {
                self.active = Some(handle);
                Ok(format)
            }
            Ok(Err(e)) => {
                join_audio_thread(&mut handle);
                Err(e)
            }
            Err(_) => {
                join_audio_thread(&mut handle);
                Err(CaptureError::StreamCreationFailed(
                    "audio thread exited before the stream opened".to_string(),
                ))
            }
        }
    }

    fn pause(&mut self) -> Result<(), CaptureError> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| CaptureError::StreamFailed("no active stream".to_string()))?;
        active.paused.store(true, Ordering::SeqCst);
        active
            .control
            .send(Control::Pause)
            .map_err(|_| CaptureError::StreamFailed("audio thread stopped".to_string()))
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| CaptureError::StreamFailed("no active stream".to_string()))?;
        active.paused.store(false, Ordering::SeqCst);
        active
            .control
            .send(Control::Resume)
            .map_err(|_| CaptureError::StreamFailed("audio thread stopped".to_string()))
    }

    fn release(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.paused.store(true, Ordering::SeqCst);
            let _ = active.control.send(Control::Release);
            join_audio_thread(&mut active);
            log::info!("Input stream released");
        }
    }

    fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for CpalCaptureBackend {
    fn drop(&mut self) {
        self.release();
    }
}

fn join_audio_thread(handle: &mut AudioThread) {
    if let Some(thread) = handle.thread.take() {
        if thread.join().is_err() {
            log::error!("Audio thread panicked");
        }
    }
}

/// Body of the audio thread: open, report readiness, then obey control messages.
fn run_audio_thread(
    sink: FragmentSink,
    paused: Arc<AtomicBool>,
    control: std_mpsc::Receiver<Control>,
    ready: oneshot::Sender<Result<AudioFormat, CaptureError>>,
) {
    let stream = match open_stream(sink, paused) {
        Ok((stream, format)) => {
            if ready.send(Ok(format)).is_err() {
                return;
            }
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Dropping the control sender also ends the loop.
    while let Ok(msg) = control.recv() {
        match msg {
            Control::Pause => {
                if let Err(e) = stream.pause() {
                    log::debug!("Stream pause unsupported, dropping callbacks instead: {}", e);
                }
            }
            Control::Resume => {
                if let Err(e) = stream.play() {
                    log::warn!("Failed to resume stream: {}", e);
                }
            }
            Control::Release => break,
        }
    }

    drop(stream);
}

fn open_stream(
    sink: FragmentSink,
    paused: Arc<AtomicBool>,
) -> Result<(Stream, AudioFormat), CaptureError> {
    let (device, config, sample_format) = default_input()?;

    log::info!(
        "Using audio input device: {:?} ({} Hz, {} channels, {:?})",
        device.name(),
        config.sample_rate.0,
        config.channels,
        sample_format
    );

    let format = AudioFormat {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };

    let stream = match sample_format {
        SampleFormat::I16 => build_stream_typed::<i16>(&device, &config, sink, paused)?,
        SampleFormat::U16 => build_stream_typed::<u16>(&device, &config, sink, paused)?,
        SampleFormat::F32 => build_stream_typed::<f32>(&device, &config, sink, paused)?,
        _ => return Err(CaptureError::NoSupportedConfig),
    };

    stream.play().map_err(|e| {
        CaptureError::StreamCreationFailed(format!("Failed to start stream: {}", e))
    })?;

    Ok((stream, format))
}

fn build_stream_typed<T>(
    device: &Device,
    config: &StreamConfig,
    sink: FragmentSink,
    paused: Arc<AtomicBool>,
) -> Result<Stream, CaptureError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let err_sink = sink.clone();
    let err_fn = move |err: cpal::StreamError| {
        err_sink.fail(CaptureError::StreamFailed(err.to_string()));
    };

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if paused.load(Ordering::SeqCst) {
                    return;
                }
                let samples: Vec<i16> = data.iter().map(|&s| sample_to_i16(s)).collect();
                sink.deliver(AudioChunk::new(samples));
            },
            err_fn,
            None,
        )
        .map_err(|e| CaptureError::StreamCreationFailed(e.to_string()))
}

/// Convert any sample type to i16 for WAV writing.
fn sample_to_i16<T>(sample: T) -> i16
where
    T: cpal::Sample,
    f32: cpal::FromSample<T>,
{
    let f32_sample: f32 = sample.to_sample::<f32>();
    let clamped = f32_sample.clamp(-1.0, 1.0);
    (clamped * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_to_i16() {
        assert_eq!(sample_to_i16(0.0f32), 0);
        assert_eq!(sample_to_i16(1.0f32), i16::MAX);
        assert_eq!(sample_to_i16(-1.0f32), -i16::MAX);

        // Clamping
        assert_eq!(sample_to_i16(2.0f32), i16::MAX);
        assert_eq!(sample_to_i16(-2.0f32), -i16::MAX);
    }

    #[test]
    fn release_without_acquire_is_noop() {
        let mut backend = CpalCaptureBackend::new();
        backend.release();
        backend.release();
        assert!(!backend.is_active());
    }

    #[test]
    fn pause_without_stream_is_an_error() {
        let mut backend = CpalCaptureBackend::new();
        assert!(backend.pause().is_err());
        assert!(backend.resume().is_err());
    }
}
