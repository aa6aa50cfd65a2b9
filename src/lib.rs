//! Scan job monitor for the PatchScout scanning backend.
//!
//! Submits scan jobs, polls their status on a fixed cadence, projects
//! per-tool progress from the backend's coarse signals and hands off a
//! normalized [`ScanResult`](models::ScanResult) once a scan completes.

pub mod client;
pub mod config;
pub mod error;
pub mod estimator;
pub mod models;
pub mod monitor;
pub mod normalizer;
pub mod validation;

pub use client::{HttpScanClient, ScanService};
pub use error::{MonitorError, ServiceError, ValidationError};
pub use monitor::{CancelOutcome, JobMonitor, MonitorSettings, ScanEvent, TickOutcome};
