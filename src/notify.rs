//! User-facing notifications
//!
//! Every failure produces one specific notice. The host decides how to show
//! it (toast, banner, ...); the default notifier only logs.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Info,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Destructive,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Retry from the permission modal was denied again.
    pub fn permission_denied() -> Self {
        Self::destructive(
            "Permission Denied",
            "Microphone access is required to record your speech.",
        )
    }

    /// The input stream could not be opened after access was granted.
    pub fn recording_start_failed(detail: &str) -> Self {
        Self::destructive(
            "Recording Error",
            format!("Failed to start recording: {}. Please try again.", detail),
        )
    }

    /// The device or encoder failed while a session was running.
    pub fn recording_interrupted(detail: &str) -> Self {
        Self::destructive(
            "Recording Error",
            format!(
                "Recording stopped unexpectedly: {}. Please record again.",
                detail
            ),
        )
    }

    pub fn analysis_complete() -> Self {
        Self::info(
            "Analysis Complete",
            "Your speech has been analyzed. View your results.",
        )
    }

    pub fn upload_failed(detail: &str) -> Self {
        Self::destructive(
            "Upload Failed",
            format!("{}. Your recording is kept, so you can retry.", detail),
        )
    }
}

/// Receives notices from the recorder and the submission pipeline.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that writes notices to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => log::info!("{}: {}", notice.title, notice.description),
            NoticeLevel::Destructive => log::warn!("{}: {}", notice.title, notice.description),
        }
    }
}
