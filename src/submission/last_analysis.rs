//! "Last analysis id" handle
//!
//! The only state the recorder persists: the id of the most recent successful
//! analysis, so the host can route to its results view.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::audio::app_data_dir;

const FILE_NAME: &str = "last_analysis_id";

#[derive(Debug, Clone)]
pub struct LastAnalysisStore {
    path: PathBuf,
}

impl LastAnalysisStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data_local_dir>/fluency-capture/last_analysis_id`.
    pub fn in_app_data_dir() -> Self {
        Self::new(app_data_dir().join(FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, analysis_id: u64) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, analysis_id.to_string())?;
        fs::rename(&tmp, &self.path)?;
        log::debug!("Saved last analysis id {} to {:?}", analysis_id, self.path);
        Ok(())
    }

    /// The stored id, if present and readable.
    pub fn load(&self) -> Option<u64> {
        let raw = fs::read_to_string(&self.path).ok()?;
        match raw.trim().parse() {
            Ok(id) => Some(id),
            Err(e) => {
                log::warn!("Ignoring corrupt last analysis id at {:?}: {}", self.path, e);
                None
            }
        }
    }

    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
