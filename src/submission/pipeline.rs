//! Submission pipeline
//!
//! `submit` starts one upload task per artifact and hands back a handle that
//! observes the job. While the request is outstanding a simulated progress
//! ramp runs next to it; the ramp stops below 100 and only a server answer
//! finishes the job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::client::{AnalysisClient, HttpAnalysisClient, UploadError};
use super::job::UploadJob;
use super::last_analysis::LastAnalysisStore;
use crate::audio::Artifact;
use crate::notify::{LogNotifier, Notice, Notifier};
use crate::settings::RecorderSettings;

/// Shape of the simulated progress ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProgressRamp {
    step: u8,
    interval: Duration,
    cap: u8,
}

impl ProgressRamp {
    fn from_settings(settings: &RecorderSettings) -> Self {
        Self {
            step: settings.progress_step.max(1),
            interval: settings.progress_interval(),
            cap: settings.progress_cap.min(99),
        }
    }
}

pub struct SubmissionPipeline {
    client: Arc<dyn AnalysisClient>,
    notifier: Arc<dyn Notifier>,
    last_analysis: Option<LastAnalysisStore>,
    ramp: ProgressRamp,
}

impl SubmissionPipeline {
    pub fn new(client: Arc<dyn AnalysisClient>, settings: &RecorderSettings) -> Self {
        Self {
            client,
            notifier: Arc::new(LogNotifier),
            last_analysis: None,
            ramp: ProgressRamp::from_settings(settings),
        }
    }

    /// Pipeline talking HTTP to `settings.api_base_url`.
    pub fn from_settings(settings: &RecorderSettings) -> Result<Self, UploadError> {
        let client = HttpAnalysisClient::new(settings)?;
        Ok(Self::new(Arc::new(client), settings))
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Remember the id of every successful analysis in `store`.
    pub fn with_last_analysis_store(mut self, store: LastAnalysisStore) -> Self {
        self.last_analysis = Some(store);
        self
    }

    /// Start uploading `artifact`. Must be called from within a tokio runtime.
    pub fn submit(&self, artifact: Artifact) -> UploadHandle {
        let (tx, rx) = watch::channel(UploadJob::new());

        let task = tokio::spawn(run_upload(
            self.client.clone(),
            artifact.clone(),
            tx,
            self.ramp,
            self.notifier.clone(),
            self.last_analysis.clone(),
        ));

        UploadHandle { artifact, rx, task }
    }

    /// Submit the same artifact again as a new job.
    ///
    /// The previous job is dropped, which cancels it if it is still running.
    pub fn retry(&self, previous: UploadHandle) -> UploadHandle {
        let job = previous.job();
        if !job.is_terminal() {
            log::warn!("Retrying an upload that has not finished; cancelling it");
        }
        log::info!("Retrying upload of recording {}", previous.artifact.session_id());
        let artifact = previous.artifact.clone();
        drop(previous);
        self.submit(artifact)
    }
}

/// Observer for one upload job. Dropping it cancels the upload.
pub struct UploadHandle {
    artifact: Artifact,
    rx: watch::Receiver<UploadJob>,
    task: JoinHandle<()>,
}

impl UploadHandle {
    /// Current snapshot of the job.
    pub fn job(&self) -> UploadJob {
        self.rx.borrow().clone()
    }

    /// The artifact this job uploads; a retry sends the same bytes.
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadJob> {
        self.rx.clone()
    }

    /// Wait for the terminal state.
    pub async fn finished(&mut self) -> UploadJob {
        loop {
            {
                let job = self.rx.borrow_and_update();
                if job.is_terminal() {
                    return job.clone();
                }
            }
            if self.rx.changed().await.is_err() {
                // Task gone without a terminal state: it was cancelled.
                let mut job = self.rx.borrow().clone();
                if !job.is_terminal() {
                    job.fail("Upload cancelled");
                }
                return job;
            }
        }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for UploadHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_upload(
    client: Arc<dyn AnalysisClient>,
    artifact: Artifact,
    tx: watch::Sender<UploadJob>,
    ramp: ProgressRamp,
    notifier: Arc<dyn Notifier>,
    last_analysis: Option<LastAnalysisStore>,
) {
    tx.send_modify(|job| {
        job.begin();
    });

    let upload = client.upload(&artifact);
    tokio::pin!(upload);

    let mut ticks = interval_at(Instant::now() + ramp.interval, ramp.interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        tokio::select! {
            result = &mut upload => break result,
            _ = ticks.tick() => {
                tx.send_if_modified(|job| job.advance(ramp.step, ramp.cap));
            }
        }
    };

    match outcome {
        Ok(receipt) => {
            if let Some(store) = &last_analysis {
                if let Err(e) = store.save(receipt.analysis_id) {
                    log::warn!("Failed to store last analysis id: {}", e);
                }
            }
            notifier.notify(Notice::analysis_complete());
            tx.send_modify(|job| {
                job.succeed(receipt.analysis_id);
            });
        }
        Err(err) => {
            let reason = err.reason();
            log::error!(
                "Upload of recording {} failed: {}",
                artifact.session_id(),
                reason
            );
            notifier.notify(Notice::upload_failed(&reason));
            tx.send_modify(|job| {
                job.fail(reason);
            });
        }
    }
}
