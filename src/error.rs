// Error taxonomy for the scan job monitor

use thiserror::Error;

/// Input rejected before any request reaches the scan service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("target is required: enter a URL, IP address, or domain")]
    EmptyTarget,

    #[error("invalid target '{0}': enter a valid URL, IP address, or domain name")]
    InvalidTarget(String),

    #[error("no scanning tools selected: select at least one tool")]
    NoToolsSelected,
}

/// Failure of a single call to the scan service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("scan service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response payload: {0}")]
    Decode(String),
}

/// Synchronous failures surfaced by the job monitor.
///
/// Poll ticks never produce one of these: remote failure, cancellation and
/// budget exhaustion all end up as a terminal `JobStatus` instead.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to create scan: {0}")]
    Submission(#[source] ServiceError),

    #[error("invalid scan response - missing scan id")]
    MissingJobId,

    #[error("failed to cancel scan: {0}")]
    Cancel(#[source] ServiceError),
}

impl MonitorError {
    /// True for the errors that block a scan from ever starting.
    pub fn is_submission_failure(&self) -> bool {
        matches!(
            self,
            MonitorError::Validation(_) | MonitorError::Submission(_) | MonitorError::MissingJobId
        )
    }
}
