//! Upload job lifecycle
//!
//! One job tracks one transfer of one artifact. It moves
//! Pending -> InFlight -> (Succeeded | Failed) exactly once; progress only
//! goes up and reaches 100 only on success.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum UploadStatus {
    Pending,
    InFlight,
    #[serde(rename_all = "camelCase")]
    Succeeded {
        analysis_id: u64,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadJob {
    progress: u8,
    #[serde(flatten)]
    status: UploadStatus,
}

impl Default for UploadJob {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadJob {
    pub fn new() -> Self {
        Self {
            progress: 0,
            status: UploadStatus::Pending,
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn status(&self) -> &UploadStatus {
        &self.status
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            UploadStatus::Succeeded { .. } | UploadStatus::Failed { .. }
        )
    }

    pub fn analysis_id(&self) -> Option<u64> {
        match self.status {
            UploadStatus::Succeeded { analysis_id } => Some(analysis_id),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            UploadStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Pending -> InFlight. Returns false if the job already left Pending.
    pub fn begin(&mut self) -> bool {
        if self.status != UploadStatus::Pending {
            return false;
        }
        self.status = UploadStatus::InFlight;
        true
    }

    /// Simulated progress step, never passing `cap` (itself kept below 100).
    ///
    /// Returns true if the visible progress changed.
    pub fn advance(&mut self, step: u8, cap: u8) -> bool {
        if self.status != UploadStatus::InFlight {
            return false;
        }
        let cap = cap.min(99);
        let next = self.progress.saturating_add(step).min(cap).max(self.progress);
        let changed = next != self.progress;
        self.progress = next;
        changed
    }

    pub fn succeed(&mut self, analysis_id: u64) -> bool {
        if self.is_terminal() {
            log::warn!("Upload job already finished; ignoring success");
            return false;
        }
        self.status = UploadStatus::Succeeded { analysis_id };
        self.progress = 100;
        true
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.is_terminal() {
            log::warn!("Upload job already finished; ignoring failure");
            return false;
        }
        self.status = UploadStatus::Failed {
            reason: reason.into(),
        };
        true
    }
}
