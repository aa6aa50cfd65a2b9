// Result normalization
//
// The backend reports counters either at the top level of the status
// payload or nested under `summary`, and leaves most fields nullable. This
// module is the only place that deals with that: everything it produces is
// fully defaulted.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::client::{OpenPortPayload, ScanStatusPayload, SummaryPayload, VulnerabilityPayload};
use crate::models::{
    JobId, NetworkFindings, OpenPort, ScanConfiguration, ScanResult, ScanSummary, Severity,
    Vulnerability,
};

const UNKNOWN: &str = "Unknown";
const UNKNOWN_VULNERABILITY: &str = "Unknown Vulnerability";

/// First present value among `layers`, in order, else the type's default.
pub fn layered<T: Default>(layers: impl IntoIterator<Item = Option<T>>) -> T {
    layers.into_iter().flatten().next().unwrap_or_default()
}

/// Context the status payload does not carry reliably.
#[derive(Debug, Clone)]
pub struct JobContext<'a> {
    pub job_id: &'a JobId,
    pub target: &'a str,
    pub config: &'a ScanConfiguration,
    /// Local fallbacks when the service omits its own timestamps.
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

pub fn normalize(
    raw: &ScanStatusPayload,
    vulnerabilities: Vec<VulnerabilityPayload>,
    ctx: &JobContext<'_>,
) -> ScanResult {
    let remote_started = raw.started_at.as_deref().and_then(parse_timestamp);
    let remote_completed = raw.completed_at.as_deref().and_then(parse_timestamp);

    let duration_minutes = match (remote_started, remote_completed) {
        (Some(start), Some(end)) => Some(whole_minutes(end - start)),
        _ => None,
    };

    ScanResult {
        job_id: ctx.job_id.clone(),
        target: ctx.target.to_string(),
        config: ctx.config.clone(),
        started_at: remote_started.unwrap_or(ctx.started_at),
        completed_at: remote_completed.unwrap_or(ctx.completed_at),
        duration_minutes,
        summary: summarize(raw),
        vulnerabilities: vulnerabilities
            .into_iter()
            .enumerate()
            .map(|(index, v)| normalize_vulnerability(v, index))
            .collect(),
        network: NetworkFindings {
            open_ports: raw
                .open_ports
                .iter()
                .flatten()
                .map(normalize_open_port)
                .collect(),
            os_fingerprint: text_or_unknown(raw.os_fingerprint.as_deref()),
            uptime: text_or_unknown(raw.uptime.as_deref()),
        },
        compliance_results: raw.compliance_results.clone().unwrap_or_default(),
    }
}

/// Flat counters win over the nested summary; both missing means zero.
pub fn summarize(raw: &ScanStatusPayload) -> ScanSummary {
    let nested = raw.summary.as_ref();
    let from_summary = |field: fn(&SummaryPayload) -> Option<u32>| nested.and_then(field);

    ScanSummary {
        total_vulnerabilities: layered([
            raw.vulnerabilities_count,
            from_summary(|s| s.total_vulnerabilities),
        ]),
        critical: layered([raw.critical_count, from_summary(|s| s.critical)]),
        high: layered([raw.high_count, from_summary(|s| s.high)]),
        medium: layered([raw.medium_count, from_summary(|s| s.medium)]),
        low: layered([raw.low_count, from_summary(|s| s.low)]),
        open_ports: layered([raw.open_ports_count, from_summary(|s| s.open_ports)]),
        services: layered([raw.services_detected, from_summary(|s| s.services)]),
    }
}

fn normalize_vulnerability(raw: VulnerabilityPayload, index: usize) -> Vulnerability {
    let numeric_id = raw.id.as_ref().and_then(|id| match id {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let id = layered([
        non_blank(raw.vulnerability_id.clone()),
        non_blank(raw.cve_id.clone()),
        non_blank(numeric_id),
        Some(format!("VULN-{}", index + 1)),
    ]);

    Vulnerability {
        id,
        cve_id: non_blank(raw.cve_id),
        title: non_blank(raw.title).unwrap_or_else(|| UNKNOWN_VULNERABILITY.to_string()),
        description: raw.description.unwrap_or_default(),
        severity: raw
            .severity
            .as_deref()
            .map(Severity::from_label)
            .unwrap_or(Severity::Info),
        cvss: layered([raw.cvss_score, raw.cvss]),
        affected_component: raw.affected_component.unwrap_or_default(),
        port: raw.port,
        service: raw.service.unwrap_or_default(),
        discovered_by: non_blank(raw.discovered_by).unwrap_or_else(|| UNKNOWN.to_string()),
        solution: raw.solution.unwrap_or_default(),
        references: raw.references.unwrap_or_default(),
    }
}

fn normalize_open_port(raw: &OpenPortPayload) -> OpenPort {
    match raw {
        OpenPortPayload::Number(port) => OpenPort {
            port: *port,
            protocol: None,
            service: None,
        },
        OpenPortPayload::Detailed {
            port,
            protocol,
            service,
        } => OpenPort {
            port: *port,
            protocol: protocol.clone(),
            service: service.clone(),
        },
    }
}

/// ISO-8601 with or without an offset; naive timestamps are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn whole_minutes(span: chrono::Duration) -> i64 {
    (span.num_milliseconds() as f64 / 60_000.0).round() as i64
}

fn text_or_unknown(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
