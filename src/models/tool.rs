use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a scanning tool as known to the scan service (e.g. `Nmap`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(String);

impl ToolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tool names reported by the backend are not guaranteed to keep our casing.
    pub fn matches(&self, name: &str) -> bool {
        self.0.eq_ignore_ascii_case(name.trim())
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ToolId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Network,
    Vulnerability,
    Compliance,
    Web,
    Template,
}

/// Static catalog entry for a scanning tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub id: &'static str,
    pub display_name: &'static str,
    pub category: ToolCategory,
    pub base_duration_minutes: u32,
    pub capabilities: &'static [&'static str],
}

impl ToolDescriptor {
    pub fn tool_id(&self) -> ToolId {
        ToolId::new(self.id)
    }
}

pub const TOOL_CATALOG: &[ToolDescriptor] = &[
    ToolDescriptor {
        id: "Nmap",
        display_name: "Network Discovery & Port Scanning",
        category: ToolCategory::Network,
        base_duration_minutes: 4,
        capabilities: &[
            "Port Scanning",
            "Service Detection",
            "OS Fingerprinting",
            "NSE Scripts",
        ],
    },
    ToolDescriptor {
        id: "OpenVAS",
        display_name: "Comprehensive Vulnerability Assessment",
        category: ToolCategory::Vulnerability,
        base_duration_minutes: 15,
        capabilities: &[
            "CVE Detection",
            "Compliance Checks",
            "Config Assessment",
            "Network Security",
        ],
    },
    ToolDescriptor {
        id: "Nessus",
        display_name: "Professional Vulnerability Scanner",
        category: ToolCategory::Compliance,
        base_duration_minutes: 22,
        capabilities: &[
            "Deep Vulnerability Analysis",
            "Compliance Auditing",
            "Malware Detection",
            "Asset Discovery",
        ],
    },
    ToolDescriptor {
        id: "Nikto",
        display_name: "Web Server Security Scanner",
        category: ToolCategory::Web,
        base_duration_minutes: 5,
        capabilities: &[
            "Web Vulnerabilities",
            "CGI Scanning",
            "Server Misconfigurations",
            "Dangerous Files",
        ],
    },
    ToolDescriptor {
        id: "Nuclei",
        display_name: "Fast Template-based Scanner",
        category: ToolCategory::Template,
        base_duration_minutes: 2,
        capabilities: &[
            "Template Engine",
            "Custom CVE Checks",
            "Subdomain Takeover",
            "Technology Detection",
        ],
    },
];

/// Look up a catalog entry, ignoring case.
pub fn find_tool(id: &ToolId) -> Option<&'static ToolDescriptor> {
    TOOL_CATALOG.iter().find(|tool| id.matches(tool.id))
}
