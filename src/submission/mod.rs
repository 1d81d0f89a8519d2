//! Submission module for Fluency Capture
//!
//! Takes a finished artifact, uploads it to the analysis service, reports
//! progress, and yields an analysis id or a reason for failure.

mod client;
mod job;
mod last_analysis;
mod pipeline;

pub use client::{
    AnalysisClient, AnalysisResult, HttpAnalysisClient, UploadError, UploadReceipt, UPLOAD_FIELD,
};
pub use job::{UploadJob, UploadStatus};
pub use last_analysis::LastAnalysisStore;
pub use pipeline::{SubmissionPipeline, UploadHandle};
