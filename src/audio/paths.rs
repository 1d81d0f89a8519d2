//! XDG path helpers for kept recordings
//!
//! Recordings are stored in: ~/.local/share/fluency-capture/recordings/
//! Only written when `keep_recordings` is enabled; the artifact itself lives
//! in memory.

use std::fs;
use std::path::{Path, PathBuf};

use super::artifact::Artifact;

const APP_DIR_NAME: &str = "fluency-capture";
const MAX_RECORDINGS: usize = 5;

/// Root data directory: ~/.local/share/fluency-capture/
pub fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Kept-recordings directory: ~/.local/share/fluency-capture/recordings/
pub fn recordings_dir() -> PathBuf {
    app_data_dir().join("recordings")
}

/// File name for a kept artifact. Format: <YYYYMMDD_HHMMSS>_<uuid>.wav
fn artifact_file_name(artifact: &Artifact) -> String {
    format!(
        "{}_{}.wav",
        artifact.created_at().format("%Y%m%d_%H%M%S"),
        artifact.session_id()
    )
}

/// Write the artifact into `dir` (created if missing) and return its path.
pub fn save_artifact(dir: &Path, artifact: &Artifact) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(artifact_file_name(artifact));
    fs::write(&path, artifact.bytes())?;
    Ok(path)
}

/// Clean up old recordings in `dir`, keeping only the most recent N files.
pub fn cleanup_old_recordings(dir: &Path) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "wav")
                .unwrap_or(false)
        })
        .collect();

    if entries.len() <= MAX_RECORDINGS {
        return Ok(0);
    }

    // Oldest first; names embed the timestamp, which breaks mtime ties.
    entries.sort_by(|a, b| {
        let time_a = a.metadata().and_then(|m| m.modified()).ok();
        let time_b = b.metadata().and_then(|m| m.modified()).ok();
        time_a
            .cmp(&time_b)
            .then_with(|| a.file_name().cmp(&b.file_name()))
    });

    let to_delete = entries.len() - MAX_RECORDINGS;
    let mut deleted = 0;

    for entry in entries.into_iter().take(to_delete) {
        if fs::remove_file(entry.path()).is_ok() {
            log::debug!("Cleaned up old recording: {:?}", entry.path());
            deleted += 1;
        }
    }

    Ok(deleted)
}
