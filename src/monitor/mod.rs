// Scan job monitor
//
// Owns the lifecycle of one scan: submission, the poll loop, progress
// projection, terminal-state detection and hand-off of the normalized
// result. Each job is a self-contained value; the monitor holds no
// per-job state, so one monitor can drive any number of independent jobs.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::client::{RemoteStatus, ScanService, ScanStatusPayload};
use crate::error::MonitorError;
use crate::models::{JobId, ScanConfiguration, ScanJob};
use crate::normalizer::{self, JobContext};
use crate::validation;

pub mod projection;

pub use projection::project_tool_states;

// ============================================
// Constants
// ============================================

/// Poll interval in seconds
pub const POLL_INTERVAL_SECS: u64 = 5;

/// Poll ticks before a job is declared timed out (5 minutes at the default cadence)
pub const MAX_POLLS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            max_polls: MAX_POLLS,
        }
    }
}

/// Updates published while a job is driven by [`JobMonitor::run_with_events`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    Progress {
        progress_percent: u8,
        current_tool: Option<String>,
        remaining_minutes: u32,
    },
    Finished(Box<ScanJob>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The service accepted the request; a later poll tick observes the cancellation.
    Requested,
    /// The job was already terminal, nothing was sent.
    AlreadyFinished,
}

/// Outcome of a single poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Status fetched and applied.
    Updated,
    /// The status call failed; the job is unchanged apart from the poll count.
    Skipped,
    /// The job was already terminal, nothing was done.
    Idle,
}

pub struct JobMonitor<S> {
    service: S,
    settings: MonitorSettings,
}

impl<S: ScanService> JobMonitor<S> {
    pub fn new(service: S, settings: MonitorSettings) -> Self {
        Self { service, settings }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn settings(&self) -> MonitorSettings {
        self.settings
    }

    /// Validate and create a scan. On success the job is in `Polling` with no progress.
    ///
    /// Validation runs before any network call. A creation response without
    /// a job id is a submission failure, not a success.
    pub async fn submit(
        &self,
        target: &str,
        config: ScanConfiguration,
    ) -> Result<ScanJob, MonitorError> {
        let config = config.deduplicated();
        let target = validation::check_request(target, &config)?;

        tracing::info!(
            "Submitting scan for {} with {} tools ({} profile)",
            target,
            config.selected_tools.len(),
            config.scan_type.as_str()
        );

        let created = self
            .service
            .create_scan(&target, &config)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create scan for {}: {}", target, e);
                MonitorError::Submission(e)
            })?;

        let id = created
            .id
            .filter(|id| id.is_assigned())
            .ok_or_else(|| {
                tracing::error!("Scan service accepted {} but returned no scan id", target);
                MonitorError::MissingJobId
            })?;

        let mut job = ScanJob::submitted(id, target, config);
        job.begin_polling();

        tracing::info!(
            "Scan {} created for {} (estimated {} minutes)",
            job.id(),
            job.target(),
            job.estimated_minutes()
        );
        Ok(job)
    }

    /// Run one poll tick against the service and apply it to `job`.
    ///
    /// Never fails: a transport error leaves the job as it was (apart from
    /// using up one poll), and every remote outcome becomes a job status.
    pub async fn poll(&self, job: &mut ScanJob) -> TickOutcome {
        if job.is_terminal() {
            return TickOutcome::Idle;
        }
        job.begin_polling();

        let outcome = match self.service.get_scan(job.id()).await {
            Ok(status) => {
                self.apply_status(job, status).await;
                TickOutcome::Updated
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to get status for scan {} (poll {}): {}",
                    job.id(),
                    job.polls() + 1,
                    e
                );
                TickOutcome::Skipped
            }
        };

        // Skipped ticks count too: a backend that never answers must still time out.
        let polls = job.count_poll();
        if !job.is_terminal() && polls >= self.settings.max_polls {
            job.time_out();
            tracing::warn!(
                "Scan {} timed out after {} polls at {}% - results may be partial",
                job.id(),
                polls,
                job.progress_percent()
            );
        }

        outcome
    }

    async fn apply_status(&self, job: &mut ScanJob, status: ScanStatusPayload) {
        let before = job.progress_percent();
        job.record_progress(status.progress.unwrap_or(0.0));

        if let Some(current) = status.current_tool() {
            job.set_current_tool(current);
            if let Some(projection) = project_tool_states(&job.config().selected_tools, Some(current))
            {
                job.set_tool_statuses(projection);
            }
        }

        if job.progress_percent() != before {
            tracing::debug!(
                "Scan {} progress {}% (current tool: {})",
                job.id(),
                job.progress_percent(),
                job.current_tool().unwrap_or("-")
            );
        }

        match status.remote_status() {
            RemoteStatus::Completed => self.complete(job, &status).await,
            RemoteStatus::Failed => {
                job.fail(status.error_message.as_deref());
                tracing::error!(
                    "Scan {} failed: {}",
                    job.id(),
                    job.error_message().unwrap_or_default()
                );
            }
            RemoteStatus::Cancelled => {
                job.cancel();
                tracing::info!("Scan {} was cancelled", job.id());
            }
            RemoteStatus::InProgress => {}
        }
    }

    async fn complete(&self, job: &mut ScanJob, status: &ScanStatusPayload) {
        // A failed detail fetch still completes the job, without vulnerabilities.
        let vulnerabilities = match self.service.get_scan_vulnerabilities(job.id()).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch vulnerabilities for scan {}: {} - completing without them",
                    job.id(),
                    e
                );
                Vec::new()
            }
        };

        let result = normalizer::normalize(
            status,
            vulnerabilities,
            &JobContext {
                job_id: job.id(),
                target: job.target(),
                config: job.config(),
                started_at: job.started_at(),
                completed_at: Utc::now(),
            },
        );

        tracing::info!(
            "Scan {} completed with {} vulnerabilities ({} critical, {} high)",
            job.id(),
            result.summary.total_vulnerabilities,
            result.summary.critical,
            result.summary.high
        );
        job.complete(result);
    }

    /// Poll on the configured cadence until the job reaches a terminal state.
    pub async fn run(&self, job: ScanJob) -> ScanJob {
        self.drive(job, None).await
    }

    /// Like [`run`](Self::run), publishing progress and the final job on `events`.
    ///
    /// Events are dropped rather than waited for when the receiver is full or
    /// gone, so a slow reader never delays a tick or the poll budget.
    pub async fn run_with_events(&self, job: ScanJob, events: mpsc::Sender<ScanEvent>) -> ScanJob {
        self.drive(job, Some(events)).await
    }

    async fn drive(&self, mut job: ScanJob, events: Option<mpsc::Sender<ScanEvent>>) -> ScanJob {
        tracing::info!(
            "Polling scan {} every {:?} (at most {} polls)",
            job.id(),
            self.settings.poll_interval,
            self.settings.max_polls
        );

        while !job.is_terminal() {
            // The delay starts only after the previous tick fully completed.
            tokio::time::sleep(self.settings.poll_interval).await;

            let outcome = self.poll(&mut job).await;
            if outcome == TickOutcome::Updated
                && let Some(tx) = &events
            {
                publish(
                    tx,
                    job.id(),
                    ScanEvent::Progress {
                        progress_percent: job.progress_percent(),
                        current_tool: job.current_tool().map(str::to_string),
                        remaining_minutes: job.remaining_minutes(),
                    },
                );
            }
        }

        if let Some(tx) = &events {
            publish(tx, job.id(), ScanEvent::Finished(Box::new(job.clone())));
        }
        job
    }

    /// Ask the service to cancel the scan.
    ///
    /// The job itself is not touched: the next poll tick observes the
    /// cancellation through the normal status field. Cancelling a job that is
    /// already terminal is a no-op.
    pub async fn cancel(&self, job: &ScanJob) -> Result<CancelOutcome, MonitorError> {
        if job.is_terminal() {
            tracing::debug!(
                "Ignoring cancel for scan {}: already {:?}",
                job.id(),
                job.status()
            );
            return Ok(CancelOutcome::AlreadyFinished);
        }

        self.service.cancel_scan(job.id()).await.map_err(|e| {
            tracing::warn!("Failed to cancel scan {}: {}", job.id(), e);
            MonitorError::Cancel(e)
        })?;

        tracing::info!("Cancellation requested for scan {}", job.id());
        Ok(CancelOutcome::Requested)
    }
}

/// Best-effort publish; the poll loop never waits on a reader.
fn publish(tx: &mpsc::Sender<ScanEvent>, job_id: &JobId, event: ScanEvent) {
    if let Err(e) = tx.try_send(event) {
        match e {
            mpsc::error::TrySendError::Full(_) => {
                tracing::debug!("Event channel full, dropping update for scan {}", job_id);
            }
            mpsc::error::TrySendError::Closed(_) => {
                tracing::debug!("Event receiver gone, dropping update for scan {}", job_id);
            }
        }
    }
}
