//! Waveform bars for the recorder view
//!
//! Stateless: the view model calls `render_bars` every time it publishes,
//! which happens on the level-tick cadence while recording.

use rand::Rng;

/// Number of bars shown by default.
pub const DEFAULT_BAR_COUNT: usize = 14;

/// Height of every bar when nothing is being recorded.
pub const BASELINE_HEIGHT: f32 = 0.05;

/// What the renderer is drawing from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaveformInput {
    /// Not recording (idle, paused, finalizing, ...): flat baseline.
    Idle,
    /// Recording. `level` is `None` when no level signal is available.
    Live { level: Option<f32> },
}

/// Compute `count` bar heights, each a fraction of full height in [0, 1].
///
/// With a positive level every bar tracks it. Without one, bars jitter
/// randomly so the user still sees that the microphone is live.
pub fn render_bars<R: Rng + ?Sized>(count: usize, input: WaveformInput, rng: &mut R) -> Vec<f32> {
    match input {
        WaveformInput::Idle => vec![BASELINE_HEIGHT; count],
        WaveformInput::Live { level: Some(level) } if level.is_finite() && level > 0.0 => {
            vec![level.min(1.0); count]
        }
        WaveformInput::Live { .. } => (0..count).map(|_| rng.random_range(0.0..1.0)).collect(),
    }
}
