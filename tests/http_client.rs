//! Exercises `HttpScanClient` against a stub backend served by axum.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};

use patchscout_monitor::models::{JobId, JobStatus, ScanConfiguration};
use patchscout_monitor::{HttpScanClient, JobMonitor, MonitorSettings, ScanService, ServiceError};

#[derive(Default)]
struct Backend {
    last_create: Mutex<Option<Value>>,
    cancelled: Mutex<Vec<String>>,
}

async fn create_scan(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Json<Value> {
    *backend.last_create.lock().unwrap() = Some(body);
    Json(json!({"id": 42, "status": "pending"}))
}

async fn get_scan(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "42" => Json(json!({
            "id": 42,
            "status": "completed",
            "progress": 100.0,
            "current_tool": null,
            "vulnerabilities_count": 2,
            "critical_count": 1,
            "high_count": 1,
            "started_at": "2024-05-01T10:00:00.123456",
            "completed_at": "2024-05-01T10:20:00.123456",
            "error_message": null
        }))
        .into_response(),
        "43" => Json(json!({"id": 43, "status": "running", "progress": 37.5, "current_tool": "OpenVAS"}))
            .into_response(),
        "44" => Json(json!({
            "id": 44,
            "status": "completed",
            "progress": 100,
            "compliance_results": [],
            "open_ports": [{"port": "443", "service": "https"}, "unknown"],
            "uptime": 3600
        }))
        .into_response(),
        _ => (StatusCode::NOT_FOUND, "Scan not found").into_response(),
    }
}

async fn get_vulnerabilities(Path(id): Path<String>) -> Json<Value> {
    let records = json!([
        {"id": 1, "cve_id": "CVE-2023-4863", "title": "libwebp overflow", "severity": "critical", "cvss_score": 9.6},
        {"id": 2, "title": "Outdated TLS", "severity": "high", "port": 443}
    ]);
    match id.as_str() {
        "42" => Json(json!({"scan_id": 42, "vulnerabilities": records, "total": 2})),
        "44" => Json(json!({
            "scan_id": 44,
            "vulnerabilities": [
                {"id": 7, "title": "Exposed admin panel", "references": [{"url": "https://owasp.org/Top10"}]},
                null,
                {"id": 8, "title": "Missing HSTS", "severity": 3}
            ],
            "total": 3
        })),
        _ => Json(records),
    }
}

async fn cancel_scan(State(backend): State<Arc<Backend>>, Path(id): Path<String>) -> StatusCode {
    backend.cancelled.lock().unwrap().push(id);
    StatusCode::NO_CONTENT
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "version": "1.0.0"}))
}

/// Serve the stub on an ephemeral port and return its API base URL.
async fn spawn_backend() -> Result<(String, Arc<Backend>)> {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/scans/", post(create_scan))
        .route("/api/scans/{id}", get(get_scan))
        .route("/api/scans/{id}/vulnerabilities", get(get_vulnerabilities))
        .route("/api/scans/{id}/cancel", post(cancel_scan))
        .route("/health", get(health))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((format!("http://{addr}/api"), backend))
}

#[tokio::test]
async fn create_scan_posts_target_and_snake_case_config() -> Result<()> {
    let (base_url, backend) = spawn_backend().await?;
    let client = HttpScanClient::new(&base_url)?;

    let config = ScanConfiguration::default().with_tools(["Nmap", "Nuclei"]);
    let created = client.create_scan("example.com", &config).await?;
    assert_eq!(created.id, Some(JobId::new("42")));
    assert_eq!(created.status.as_deref(), Some("pending"));

    let body = backend.last_create.lock().unwrap().clone().expect("request body");
    assert_eq!(body["target"], "example.com");
    assert_eq!(body["scan_config"]["selected_tools"], json!(["Nmap", "Nuclei"]));
    assert_eq!(body["scan_config"]["scan_type"], "comprehensive");
    assert_eq!(body["scan_config"]["include_nse"], true);
    Ok(())
}

#[tokio::test]
async fn get_scan_decodes_a_running_scan() -> Result<()> {
    let (base_url, _) = spawn_backend().await?;
    let client = HttpScanClient::new(&base_url)?;

    let status = client.get_scan(&JobId::new("43")).await?;
    assert_eq!(status.status.as_deref(), Some("running"));
    assert_eq!(status.progress, Some(37.5));
    assert_eq!(status.current_tool(), Some("OpenVAS"));
    Ok(())
}

#[tokio::test]
async fn non_success_status_keeps_code_and_body() -> Result<()> {
    let (base_url, _) = spawn_backend().await?;
    let client = HttpScanClient::new(&base_url)?;

    let err = client.get_scan(&JobId::new("999")).await.unwrap_err();
    match err {
        ServiceError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Scan not found");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn vulnerabilities_are_read_from_either_response_shape() -> Result<()> {
    let (base_url, _) = spawn_backend().await?;
    let client = HttpScanClient::new(&base_url)?;

    let wrapped = client.get_scan_vulnerabilities(&JobId::new("42")).await?;
    let bare = client.get_scan_vulnerabilities(&JobId::new("43")).await?;

    assert_eq!(wrapped.len(), 2);
    assert_eq!(bare.len(), 2);
    assert_eq!(wrapped[0].cve_id.as_deref(), Some("CVE-2023-4863"));
    assert_eq!(bare[1].port, Some(443));
    Ok(())
}

#[tokio::test]
async fn cancel_accepts_an_empty_response() -> Result<()> {
    let (base_url, backend) = spawn_backend().await?;
    let client = HttpScanClient::new(&base_url)?;

    client.cancel_scan(&JobId::new("43")).await?;
    assert_eq!(*backend.cancelled.lock().unwrap(), ["43"]);
    Ok(())
}

#[tokio::test]
async fn health_check_is_served_from_the_service_root() -> Result<()> {
    let (base_url, _) = spawn_backend().await?;
    let client = HttpScanClient::new(&base_url)?;

    let health = client.health_check().await?;
    assert_eq!(health.status.as_deref(), Some("healthy"));
    assert_eq!(health.version.as_deref(), Some("1.0.0"));
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() -> Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = HttpScanClient::with_timeouts(
        &format!("http://{addr}/api"),
        Duration::from_secs(2),
        Duration::from_secs(1),
    )?;
    let err = client.get_scan(&JobId::new("1")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Transport(_)));
    Ok(())
}

#[tokio::test]
async fn monitor_runs_a_scan_end_to_end_over_http() -> Result<()> {
    let (base_url, _) = spawn_backend().await?;
    let monitor = JobMonitor::new(
        HttpScanClient::new(&base_url)?,
        MonitorSettings {
            poll_interval: Duration::from_millis(10),
            max_polls: 5,
        },
    );

    let job = monitor
        .submit("http://testphp.vulnweb.com", ScanConfiguration::default())
        .await?;
    let job = monitor.run(job).await;

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.polls(), 1);

    let result = job.result().expect("result");
    assert_eq!(result.job_id.as_str(), "42");
    assert_eq!(result.duration_minutes, Some(20));
    assert_eq!(result.summary.total_vulnerabilities, 2);
    assert_eq!(result.vulnerabilities.len(), 2);
    assert_eq!(result.vulnerabilities[0].id, "CVE-2023-4863");
    assert_eq!(result.vulnerabilities[1].id, "2");
    Ok(())
}

#[tokio::test]
async fn loosely_typed_payloads_still_decode() -> Result<()> {
    let (base_url, _) = spawn_backend().await?;
    let client = HttpScanClient::new(&base_url)?;
    let id = JobId::new("44");

    let status = client.get_scan(&id).await?;
    assert_eq!(status.status.as_deref(), Some("completed"));
    assert!(status.compliance_results.is_none());
    assert!(status.uptime.is_none());
    assert_eq!(status.open_ports.map(|ports| ports.len()), Some(1));

    let records = client.get_scan_vulnerabilities(&id).await?;
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].references.as_deref(),
        Some(&["https://owasp.org/Top10".to_string()][..])
    );
    assert_eq!(records[1].severity, None);
    Ok(())
}
