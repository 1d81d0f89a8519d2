//! Finished recording artifact
//!
//! Built exactly once per session from the recorded chunks, then shared
//! read-only between the completion callback, the upload job and retries.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hound::{WavSpec, WavWriter};
use uuid::Uuid;

use super::capture::{AudioChunk, AudioFormat, CaptureError};

pub const ARTIFACT_MIME_TYPE: &str = "audio/wav";
pub const ARTIFACT_FILE_NAME: &str = "recording.wav";

/// Immutable, playable audio (16-bit PCM WAV).
#[derive(Clone)]
pub struct Artifact {
    session_id: Uuid,
    bytes: Arc<[u8]>,
    format: AudioFormat,
    sample_count: usize,
    created_at: DateTime<Utc>,
}

impl Artifact {
    /// Encode the concatenation of `chunks`, in order, as a WAV file.
    pub fn encode(
        session_id: Uuid,
        format: AudioFormat,
        chunks: &[AudioChunk],
    ) -> Result<Self, CaptureError> {
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        let mut sample_count = 0usize;
        {
            let mut writer = WavWriter::new(&mut cursor, spec)
                .map_err(|e| CaptureError::EncodingFailed(e.to_string()))?;

            for chunk in chunks {
                for &sample in &chunk.samples {
                    writer
                        .write_sample(sample)
                        .map_err(|e| CaptureError::EncodingFailed(e.to_string()))?;
                }
                sample_count += chunk.len();
            }

            writer
                .finalize()
                .map_err(|e| CaptureError::EncodingFailed(e.to_string()))?;
        }

        Ok(Self {
            session_id,
            bytes: cursor.into_inner().into(),
            format,
            sample_count,
            created_at: Utc::now(),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Interleaved sample count across all channels.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn duration(&self) -> Duration {
        let per_second = self.format.samples_per_second();
        if per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.sample_count as f64 / per_second as f64)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn mime_type(&self) -> &'static str {
        ARTIFACT_MIME_TYPE
    }

    pub fn file_name(&self) -> &'static str {
        ARTIFACT_FILE_NAME
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("session_id", &self.session_id)
            .field("bytes", &self.bytes.len())
            .field("format", &self.format)
            .field("duration", &self.duration())
            .finish()
    }
}
