// Scan service contract
//
// The job monitor only talks to the scanning backend through `ScanService`.
// `HttpScanClient` is the production implementation; tests script their own.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::models::{JobId, ScanConfiguration};

pub mod http;
mod lenient;

pub use http::HttpScanClient;

#[async_trait]
pub trait ScanService: Send + Sync {
    async fn create_scan(
        &self,
        target: &str,
        config: &ScanConfiguration,
    ) -> Result<ScanCreated, ServiceError>;

    async fn get_scan(&self, id: &JobId) -> Result<ScanStatusPayload, ServiceError>;

    async fn get_scan_vulnerabilities(
        &self,
        id: &JobId,
    ) -> Result<Vec<VulnerabilityPayload>, ServiceError>;

    async fn cancel_scan(&self, id: &JobId) -> Result<(), ServiceError>;
}

// ============================================
// Request/Response Types
// ============================================

#[derive(Debug, Serialize)]
pub struct CreateScanRequest<'a> {
    pub target: &'a str,
    pub scan_config: &'a ScanConfiguration,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanCreated {
    #[serde(default)]
    pub id: Option<JobId>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Nested summary block some backend versions send instead of flat counters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SummaryPayload {
    #[serde(deserialize_with = "lenient::option")]
    pub total_vulnerabilities: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub critical: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub high: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub medium: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub low: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub open_ports: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub services: Option<u32>,
}

/// Raw `getScan` response. Every field may be absent, null, or of an
/// unexpected type; the last two read as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScanStatusPayload {
    #[serde(deserialize_with = "lenient::option")]
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub progress: Option<f64>,
    #[serde(deserialize_with = "lenient::option")]
    pub current_tool: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub started_at: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub completed_at: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub error_message: Option<String>,

    #[serde(deserialize_with = "lenient::option")]
    pub vulnerabilities_count: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub critical_count: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub high_count: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub medium_count: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub low_count: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub open_ports_count: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub services_detected: Option<u32>,
    #[serde(deserialize_with = "lenient::option")]
    pub summary: Option<SummaryPayload>,

    #[serde(deserialize_with = "lenient::list")]
    pub open_ports: Option<Vec<OpenPortPayload>>,
    #[serde(deserialize_with = "lenient::option")]
    pub os_fingerprint: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub uptime: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub compliance_results: Option<BTreeMap<String, serde_json::Value>>,
}

/// Status as reported by the service, reduced to what the monitor acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Completed,
    Failed,
    Cancelled,
    /// Pending, running, absent, or anything unrecognised.
    InProgress,
}

impl ScanStatusPayload {
    pub fn remote_status(&self) -> RemoteStatus {
        match self
            .status
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("completed") => RemoteStatus::Completed,
            Some("failed") => RemoteStatus::Failed,
            Some("cancelled") | Some("canceled") => RemoteStatus::Cancelled,
            _ => RemoteStatus::InProgress,
        }
    }

    /// The single tool the service says is running, if any.
    pub fn current_tool(&self) -> Option<&str> {
        self.current_tool
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Open port entries come either as bare numbers or as objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OpenPortPayload {
    Number(#[serde(deserialize_with = "lenient::port")] u16),
    Detailed {
        #[serde(deserialize_with = "lenient::port")]
        port: u16,
        #[serde(default, deserialize_with = "lenient::option")]
        protocol: Option<String>,
        #[serde(default, deserialize_with = "lenient::option")]
        service: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VulnerabilityPayload {
    pub id: Option<serde_json::Value>,
    #[serde(deserialize_with = "lenient::option")]
    pub vulnerability_id: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub cve_id: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub severity: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub cvss_score: Option<f64>,
    #[serde(deserialize_with = "lenient::option")]
    pub cvss: Option<f64>,
    #[serde(deserialize_with = "lenient::option")]
    pub affected_component: Option<String>,
    #[serde(deserialize_with = "lenient::optional_port")]
    pub port: Option<u16>,
    #[serde(deserialize_with = "lenient::option")]
    pub service: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub discovered_by: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub solution: Option<String>,
    #[serde(deserialize_with = "lenient::references")]
    pub references: Option<Vec<String>>,
}

/// `getScanVulnerabilities` answers with a wrapper object or a bare list.
///
/// Records are decoded one at a time so a malformed entry costs only itself.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum VulnerabilityListPayload {
    Bare(Vec<serde_json::Value>),
    Wrapped {
        #[serde(default)]
        vulnerabilities: Option<Vec<serde_json::Value>>,
    },
}

impl VulnerabilityListPayload {
    pub(crate) fn into_records(self) -> Vec<VulnerabilityPayload> {
        let raw = match self {
            VulnerabilityListPayload::Bare(records) => records,
            VulnerabilityListPayload::Wrapped { vulnerabilities } => {
                vulnerabilities.unwrap_or_default()
            }
        };
        let total = raw.len();
        let records: Vec<VulnerabilityPayload> = raw
            .into_iter()
            .filter_map(|record| serde_json::from_value(record).ok())
            .collect();
        if records.len() < total {
            tracing::debug!(
                "Skipped {} unreadable vulnerability records out of {}",
                total - records.len(),
                total
            );
        }
        records
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HealthPayload {
    pub status: Option<String>,
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_payload_tolerates_nulls_and_missing_fields() {
        let payload: ScanStatusPayload = serde_json::from_value(json!({
            "status": null,
            "progress": 12,
            "current_tool": "",
            "summary": {"critical": 2}
        }))
        .expect("lenient payload");

        assert_eq!(payload.remote_status(), RemoteStatus::InProgress);
        assert_eq!(payload.progress, Some(12.0));
        assert_eq!(payload.current_tool(), None);
        assert_eq!(payload.summary.and_then(|s| s.critical), Some(2));
    }

    #[test]
    fn remote_status_is_case_insensitive() {
        let payload = ScanStatusPayload {
            status: Some("Completed".into()),
            ..Default::default()
        };
        assert_eq!(payload.remote_status(), RemoteStatus::Completed);
    }

    #[test]
    fn vulnerability_list_accepts_both_shapes() {
        let wrapped: VulnerabilityListPayload = serde_json::from_value(json!({
            "scan_id": 3,
            "vulnerabilities": [{"title": "a"}, {"title": "b"}],
            "total": 2
        }))
        .expect("wrapped");
        assert_eq!(wrapped.into_records().len(), 2);

        let bare: VulnerabilityListPayload =
            serde_json::from_value(json!([{"title": "a"}])).expect("bare");
        assert_eq!(bare.into_records().len(), 1);
    }

    #[test]
    fn open_ports_accept_numbers_and_objects() {
        let ports: Vec<OpenPortPayload> = serde_json::from_value(json!([
            22,
            {"port": 443, "protocol": "tcp", "service": "https"}
        ]))
        .expect("mixed ports");
        assert!(matches!(ports[0], OpenPortPayload::Number(22)));
        assert!(matches!(ports[1], OpenPortPayload::Detailed { port: 443, .. }));
    }

    #[test]
    fn mistyped_optional_fields_do_not_hide_a_completed_scan() {
        let payload: ScanStatusPayload = serde_json::from_value(json!({
            "status": "completed",
            "progress": 100,
            "compliance_results": [],
            "critical_count": "three",
            "os_fingerprint": {"name": "Linux"},
            "summary": {"critical": 2, "high": "n/a"}
        }))
        .expect("completed payload");

        assert_eq!(payload.remote_status(), RemoteStatus::Completed);
        assert!(payload.compliance_results.is_none());
        assert!(payload.critical_count.is_none());
        assert!(payload.os_fingerprint.is_none());
        let summary = payload.summary.expect("summary");
        assert_eq!(summary.critical, Some(2));
        assert_eq!(summary.high, None);
    }

    #[test]
    fn open_ports_keep_readable_entries() {
        let payload: ScanStatusPayload = serde_json::from_value(json!({
            "open_ports": [{"port": "443", "service": "https"}, "8080", "ssh", 70000, {"protocol": "tcp"}, 22]
        }))
        .expect("payload");

        let ports: Vec<u16> = payload
            .open_ports
            .expect("open ports")
            .iter()
            .map(|p| match p {
                OpenPortPayload::Number(port) | OpenPortPayload::Detailed { port, .. } => *port,
            })
            .collect();
        assert_eq!(ports, [443, 8080, 22]);

        let payload: ScanStatusPayload =
            serde_json::from_value(json!({"open_ports": "22,80"})).expect("payload");
        assert!(payload.open_ports.is_none());
    }

    #[test]
    fn one_odd_vulnerability_record_does_not_drop_the_list() {
        let list: VulnerabilityListPayload = serde_json::from_value(json!({
            "vulnerabilities": [
                {"title": "Log4Shell", "references": [{"url": "https://nvd.nist.gov/vuln/detail/CVE-2021-44228"}, "https://logging.apache.org"]},
                "not a record",
                {"title": "Weak cipher", "cvss_score": "high", "port": "443"}
            ]
        }))
        .expect("list");

        let records = list.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].references.as_deref(),
            Some(
                &[
                    "https://nvd.nist.gov/vuln/detail/CVE-2021-44228".to_string(),
                    "https://logging.apache.org".to_string()
                ][..]
            )
        );
        assert_eq!(records[1].cvss_score, None);
        assert_eq!(records[1].port, Some(443));
    }
}
