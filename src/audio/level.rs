//! Live input level for visual feedback
//!
//! Keeps a short sliding window of the most recent samples and reduces it to
//! one normalized energy value per sampling tick. The value is observational
//! only; nothing in the session's control flow depends on it.

use std::collections::VecDeque;

use super::capture::AudioFormat;

/// Length of the analysis window.
const WINDOW_MS: usize = 100;

/// Lower edge of the displayed dynamic range. Anything quieter reads as 0.
const MIN_DB: f32 = -60.0;

/// Upper edge of the displayed dynamic range (full scale).
const MAX_DB: f32 = 0.0;

/// Sliding window of recent samples.
pub struct LevelMonitor {
    samples: VecDeque<i16>,
    capacity: usize,
}

impl LevelMonitor {
    /// Create a monitor sized for ~100ms of audio in `format`.
    pub fn new(format: AudioFormat) -> Self {
        let capacity = (format.samples_per_second() * WINDOW_MS / 1000).max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add samples, dropping the oldest ones once the window is full.
    pub fn push_samples(&mut self, samples: &[i16]) {
        let len = samples.len();

        if len >= self.capacity {
            self.samples.clear();
            self.samples.extend(&samples[len - self.capacity..]);
            return;
        }

        let to_remove = (self.samples.len() + len).saturating_sub(self.capacity);
        if to_remove > 0 {
            self.samples.drain(0..to_remove);
        }

        self.samples.extend(samples);
    }

    /// RMS energy of the window, in linear full-scale units (0.0-1.0).
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let sum_squares: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let normalized = s as f64 / i16::MAX as f64;
                normalized * normalized
            })
            .sum();

        ((sum_squares / self.samples.len() as f64).sqrt() as f32).clamp(0.0, 1.0)
    }

    /// Normalized level in [0, 1]: the window's RMS mapped from dBFS onto the display range.
    pub fn level(&self) -> f32 {
        normalize_rms(self.rms())
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LevelMonitor {
    fn default() -> Self {
        Self::new(AudioFormat::default())
    }
}

/// Map a linear RMS value onto [0, 1] through the dB display range.
pub fn normalize_rms(rms: f32) -> f32 {
    if !rms.is_finite() || rms <= 0.0 {
        return 0.0;
    }
    let db = 20.0 * rms.log10();
    ((db - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 1.0)
}
