// Scan duration estimates
//
// Rough numbers for the UI, never used as a timeout.

use crate::models::{ScanConfiguration, ScanType, find_tool};

impl ScanType {
    /// Multiplier applied to the summed per-tool base times.
    pub fn duration_factor(&self) -> f64 {
        match self {
            ScanType::Quick => 0.5,
            ScanType::Comprehensive => 1.2,
            ScanType::Stealth | ScanType::Custom => 1.0,
        }
    }
}

/// Projected scan duration in minutes. Unknown tool ids contribute nothing.
pub fn estimate(config: &ScanConfiguration) -> u32 {
    let base: u32 = config
        .selected_tools
        .iter()
        .filter_map(find_tool)
        .map(|tool| tool.base_duration_minutes)
        .sum();

    (f64::from(base) * config.scan_type.duration_factor()).round() as u32
}

/// Minutes left, assuming progress advances linearly over the estimate.
pub fn remaining_minutes(progress_percent: u8, estimated_minutes: u32) -> u32 {
    let left = f64::from(100u8.saturating_sub(progress_percent.min(100))) / 100.0;
    (left * f64::from(estimated_minutes)).round() as u32
}
