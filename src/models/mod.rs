pub mod scan;
pub mod tool;

pub use scan::{
    Aggressiveness, JobId, JobStatus, NetworkFindings, OpenPort, ScanConfiguration, ScanJob,
    ScanResult, ScanSummary, ScanType, Severity, ToolRuntimeStatus, ToolState, Vulnerability,
};
pub use tool::{TOOL_CATALOG, ToolCategory, ToolDescriptor, ToolId, find_tool};
