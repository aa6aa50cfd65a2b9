use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::tool::{TOOL_CATALOG, ToolId};
use crate::estimator;

// ============================================
// Scan Configuration
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Quick,
    Comprehensive,
    Stealth,
    Custom,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Quick => "quick",
            ScanType::Comprehensive => "comprehensive",
            ScanType::Stealth => "stealth",
            ScanType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggressiveness {
    Low,
    Medium,
    High,
}

impl Aggressiveness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggressiveness::Low => "low",
            Aggressiveness::Medium => "medium",
            Aggressiveness::High => "high",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl FromStr for ScanType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quick" => Ok(ScanType::Quick),
            "comprehensive" => Ok(ScanType::Comprehensive),
            "stealth" => Ok(ScanType::Stealth),
            "custom" => Ok(ScanType::Custom),
            _ => Err(ParseEnumError {
                kind: "scan type",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Aggressiveness {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Aggressiveness::Low),
            "medium" => Ok(Aggressiveness::Medium),
            "high" => Ok(Aggressiveness::High),
            _ => Err(ParseEnumError {
                kind: "aggressiveness",
                value: s.to_string(),
            }),
        }
    }
}

/// What to scan with and how. Sent verbatim to the scan service as `scan_config`.
///
/// `selected_tools` is an ordered set: the order drives the per-tool
/// progress projection while the scan runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ScanConfiguration {
    #[validate(length(min = 1, message = "select at least one scanning tool"))]
    pub selected_tools: Vec<ToolId>,
    pub scan_type: ScanType,
    pub aggressiveness: Aggressiveness,
    pub port_range: String,
    #[serde(default)]
    pub exclude_ports: String,
    pub include_nse: bool,
    #[serde(default)]
    pub compliance: Vec<String>,
}

impl ScanConfiguration {
    /// Replace the tool selection, dropping repeated ids (first one wins).
    pub fn with_tools<I, T>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ToolId>,
    {
        self.selected_tools = tools.into_iter().map(Into::into).collect();
        self.deduplicated()
    }

    pub fn with_scan_type(mut self, scan_type: ScanType) -> Self {
        self.scan_type = scan_type;
        self
    }

    pub fn deduplicated(mut self) -> Self {
        let mut seen: Vec<ToolId> = Vec::with_capacity(self.selected_tools.len());
        for tool in self.selected_tools.drain(..) {
            if !seen.iter().any(|t| t.matches(tool.as_str())) {
                seen.push(tool);
            }
        }
        self.selected_tools = seen;
        self
    }
}

impl Default for ScanConfiguration {
    fn default() -> Self {
        Self {
            selected_tools: TOOL_CATALOG.iter().map(|t| t.tool_id()).collect(),
            scan_type: ScanType::Comprehensive,
            aggressiveness: Aggressiveness::Medium,
            port_range: "1-65535".to_string(),
            exclude_ports: String::new(),
            include_nse: true,
            compliance: vec!["PCI DSS".to_string(), "NIST".to_string()],
        }
    }
}

// ============================================
// Scan Job
// ============================================

/// Job identifier assigned by the scan service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The service signals "no job" with an empty or zero id as well as a missing one.
    pub fn is_assigned(&self) -> bool {
        let id = self.0.trim();
        !id.is_empty() && id != "0"
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => JobId(n.to_string()),
            Raw::Text(s) => JobId(s),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Polling,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut
        )
    }

    /// Whether the final status is a successful scan.
    pub fn is_success(&self) -> bool {
        *self == JobStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolState {
    Idle,
    Running,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolRuntimeStatus {
    pub tool_id: ToolId,
    pub state: ToolState,
}

/// Generic text used when the service reports a failure without a message.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Scan failed";

/// One scan, tracked from submission to a terminal outcome.
///
/// Only the job monitor mutates a job. The mutators below keep the
/// invariants: a terminal status is reached once, progress is 100 exactly
/// when completed, and a result exists exactly when completed.
#[derive(Debug, Clone, Serialize)]
pub struct ScanJob {
    id: JobId,
    target: String,
    config: ScanConfiguration,
    status: JobStatus,
    progress_percent: u8,
    current_tool: Option<String>,
    tool_statuses: Vec<ToolRuntimeStatus>,
    polls: u32,
    estimated_minutes: u32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    result: Option<ScanResult>,
}

impl ScanJob {
    pub(crate) fn submitted(id: JobId, target: String, config: ScanConfiguration) -> Self {
        let estimated_minutes = estimator::estimate(&config);
        let tool_statuses = config
            .selected_tools
            .iter()
            .map(|tool_id| ToolRuntimeStatus {
                tool_id: tool_id.clone(),
                state: ToolState::Idle,
            })
            .collect();

        Self {
            id,
            target,
            config,
            status: JobStatus::Submitted,
            progress_percent: 0,
            current_tool: None,
            tool_statuses,
            polls: 0,
            estimated_minutes,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            result: None,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn config(&self) -> &ScanConfiguration {
        &self.config
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn current_tool(&self) -> Option<&str> {
        self.current_tool.as_deref()
    }

    pub fn tool_statuses(&self) -> &[ToolRuntimeStatus] {
        &self.tool_statuses
    }

    pub fn tool_state(&self, tool: &str) -> Option<ToolState> {
        self.tool_statuses
            .iter()
            .find(|s| s.tool_id.matches(tool))
            .map(|s| s.state)
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn estimated_minutes(&self) -> u32 {
        self.estimated_minutes
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn result(&self) -> Option<&ScanResult> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<ScanResult> {
        self.result
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock time since submission, frozen once the job is terminal.
    pub fn elapsed(&self) -> chrono::Duration {
        self.completed_at.unwrap_or_else(Utc::now) - self.started_at
    }

    pub fn remaining_minutes(&self) -> u32 {
        estimator::remaining_minutes(self.progress_percent, self.estimated_minutes)
    }

    // ----- transitions (monitor only) -----

    pub(crate) fn begin_polling(&mut self) {
        if self.status == JobStatus::Submitted {
            self.status = JobStatus::Polling;
        }
    }

    pub(crate) fn count_poll(&mut self) -> u32 {
        self.polls += 1;
        self.polls
    }

    /// Record a progress report from a non-terminal tick.
    ///
    /// Progress never decreases, and 100 stays reserved for completion.
    pub(crate) fn record_progress(&mut self, reported: f64) {
        if self.is_terminal() {
            return;
        }
        let clamped = if reported.is_finite() {
            reported.round().clamp(0.0, 99.0) as u8
        } else {
            0
        };
        self.progress_percent = self.progress_percent.max(clamped);
    }

    pub(crate) fn set_current_tool(&mut self, tool: &str) {
        self.current_tool = Some(tool.to_string());
    }

    pub(crate) fn set_tool_statuses(&mut self, statuses: Vec<ToolRuntimeStatus>) {
        if !self.is_terminal() {
            self.tool_statuses = statuses;
        }
    }

    pub(crate) fn complete(&mut self, result: ScanResult) {
        if self.finish(JobStatus::Completed) {
            self.progress_percent = 100;
            self.result = Some(result);
        }
    }

    pub(crate) fn fail(&mut self, message: Option<&str>) {
        if self.finish(JobStatus::Failed) {
            let message = message
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_FAILURE_MESSAGE);
            self.error_message = Some(message.to_string());
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.finish(JobStatus::Cancelled);
    }

    pub(crate) fn time_out(&mut self) {
        self.finish(JobStatus::TimedOut);
    }

    fn finish(&mut self, status: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        for tool in &mut self.tool_statuses {
            tool.state = ToolState::Complete;
        }
        true
    }
}

// ============================================
// Normalized Scan Result
// ============================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub total_vulnerabilities: u32,
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub open_ports: u32,
    pub services: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Unrecognised labels are reported as informational.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vulnerability {
    pub id: String,
    pub cve_id: Option<String>,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub cvss: f64,
    pub affected_component: String,
    pub port: Option<u16>,
    pub service: String,
    pub discovered_by: String,
    pub solution: String,
    pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenPort {
    pub port: u16,
    pub protocol: Option<String>,
    pub service: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkFindings {
    pub open_ports: Vec<OpenPort>,
    pub os_fingerprint: String,
    pub uptime: String,
}

/// Canonical, fully-defaulted record handed to presentation once a scan completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub job_id: JobId,
    pub target: String,
    pub config: ScanConfiguration,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Whole minutes, `None` when the service did not report both timestamps.
    pub duration_minutes: Option<i64>,
    pub summary: ScanSummary,
    pub vulnerabilities: Vec<Vulnerability>,
    pub network: NetworkFindings,
    pub compliance_results: BTreeMap<String, serde_json::Value>,
}
