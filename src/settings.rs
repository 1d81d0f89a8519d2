use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::state_machine::SessionLimits;

const SETTINGS_FILE_NAME: &str = "settings.json";
const APP_DIR_NAME: &str = "fluency-capture";

const ENV_API_BASE_URL: &str = "FLUENCY_API_BASE_URL";
const ENV_API_TOKEN: &str = "FLUENCY_API_TOKEN";
const ENV_MAX_DURATION: &str = "FLUENCY_MAX_DURATION_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Recording auto-stops once this many seconds have been captured.
    pub max_duration_secs: u32,

    /// Level sampling period while recording.
    pub level_interval_ms: u64,

    /// Elapsed-time tick period while recording.
    pub duration_tick_ms: u64,

    /// Number of waveform bars in the view.
    pub waveform_bars: usize,

    /// Base URL of the analysis service, without a trailing slash.
    pub api_base_url: String,

    /// Bearer token sent with uploads when the user is signed in.
    pub auth_token: Option<String>,

    pub request_timeout_secs: u64,

    /// Simulated upload progress: percent added per step.
    pub progress_step: u8,

    /// Simulated upload progress: time between steps.
    pub progress_interval_ms: u64,

    /// Simulated progress never passes this value before the server answers.
    pub progress_cap: u8,

    /// Also write every finished recording to the data directory.
    pub keep_recordings: bool,

    /// Where kept recordings go. Defaults to the XDG data directory.
    pub recordings_dir: Option<PathBuf>,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            max_duration_secs: 30,
            level_interval_ms: 100,
            duration_tick_ms: 1000,
            waveform_bars: 14,
            api_base_url: "http://localhost:5000/api".to_string(),
            auth_token: None,
            request_timeout_secs: 60,
            progress_step: 10,
            progress_interval_ms: 100,
            progress_cap: 90,
            keep_recordings: false,
            recordings_dir: None,
        }
    }
}

impl RecorderSettings {
    /// Clamp values that would break the recorder's invariants.
    pub fn validated(mut self) -> Self {
        self.max_duration_secs = self.max_duration_secs.max(1);
        self.level_interval_ms = self.level_interval_ms.max(1);
        self.duration_tick_ms = self.duration_tick_ms.max(1);
        self.waveform_bars = self.waveform_bars.max(1);
        self.request_timeout_secs = self.request_timeout_secs.max(1);
        self.progress_step = self.progress_step.max(1);
        self.progress_interval_ms = self.progress_interval_ms.max(1);
        self.progress_cap = self.progress_cap.min(99);
        while self.api_base_url.ends_with('/') {
            self.api_base_url.pop();
        }
        self
    }

    /// Apply environment overrides (a `.env` file is honoured if present).
    pub fn with_env_overrides(mut self) -> Self {
        let _ = dotenvy::dotenv();

        if let Ok(url) = std::env::var(ENV_API_BASE_URL) {
            if !url.is_empty() {
                self.api_base_url = url;
            }
        }
        if let Ok(token) = std::env::var(ENV_API_TOKEN) {
            if !token.is_empty() {
                self.auth_token = Some(token);
            }
        }
        if let Ok(raw) = std::env::var(ENV_MAX_DURATION) {
            match raw.parse::<u32>() {
                Ok(secs) => self.max_duration_secs = secs,
                Err(e) => log::warn!("Settings: ignoring {}={:?}: {}", ENV_MAX_DURATION, raw, e),
            }
        }
        self
    }

    pub fn kept_recordings_dir(&self) -> PathBuf {
        self.recordings_dir
            .clone()
            .unwrap_or_else(crate::audio::recordings_dir)
    }

    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            max_duration_secs: self.max_duration_secs.max(1),
        }
    }

    pub fn level_interval(&self) -> Duration {
        Duration::from_millis(self.level_interval_ms.max(1))
    }

    pub fn duration_tick(&self) -> Duration {
        Duration::from_millis(self.duration_tick_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}

/// Default settings location: ~/.config/fluency-capture/settings.json
pub fn settings_path() -> Result<PathBuf, String> {
    let dir = dirs::config_dir().ok_or_else(|| "Could not determine config directory".to_string())?;
    Ok(dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
}

/// Load settings from the default location, then apply environment overrides.
pub fn load_default_settings() -> RecorderSettings {
    let settings = match settings_path() {
        Ok(path) => load_settings(&path),
        Err(e) => {
            log::warn!("Settings: {}", e);
            RecorderSettings::default()
        }
    };
    settings.with_env_overrides().validated()
}

pub fn load_settings(path: &Path) -> RecorderSettings {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<RecorderSettings>(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Settings: failed to parse {:?}: {}", path, e);
                RecorderSettings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => RecorderSettings::default(),
        Err(e) => {
            log::warn!("Settings: failed to read {:?}: {}", path, e);
            RecorderSettings::default()
        }
    }
}

pub fn save_settings(path: &Path, settings: &RecorderSettings) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory {:?}: {}", parent, e))?;
    }

    let contents =
        serde_json::to_string_pretty(settings).map_err(|e| format!("Serialize settings: {}", e))?;

    // Write to a sibling temp file, then rename over the destination.
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &contents)
        .map_err(|e| format!("Write temp settings {:?}: {}", tmp_path, e))?;

    // Windows rename fails if the destination exists.
    if cfg!(windows) && path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(format!("Remove existing settings file {:?}: {}", path, e));
            }
        }
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| format!("Rename temp settings {:?} to {:?}: {}", tmp_path, path, e))?;
    Ok(())
}
