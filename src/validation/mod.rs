// Target and configuration validation
//
// Pure checks run before a scan is submitted. No DNS lookups: a target is
// accepted purely on its shape.

use std::sync::LazyLock;

use regex::Regex;
use validator::Validate;

use crate::error::ValidationError;
use crate::models::ScanConfiguration;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| build(r"^https?://.+$"));

static IPV4_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    build(
        r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$",
    )
});

static DOMAIN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| build(r"^[a-zA-Z0-9][a-zA-Z0-9-]{1,61}[a-zA-Z0-9]\.[a-zA-Z]{2,}$"));

fn build(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static target pattern must compile")
}

/// Accept a URL, an IPv4 literal, or a domain name.
pub fn validate_target(candidate: &str) -> bool {
    let candidate = candidate.trim();
    URL_PATTERN.is_match(candidate)
        || IPV4_PATTERN.is_match(candidate)
        || DOMAIN_PATTERN.is_match(candidate)
}

/// Check a scan request, returning the trimmed target on success.
pub fn check_request(target: &str, config: &ScanConfiguration) -> Result<String, ValidationError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ValidationError::EmptyTarget);
    }
    if !validate_target(target) {
        return Err(ValidationError::InvalidTarget(target.to_string()));
    }
    config
        .validate()
        .map_err(|_| ValidationError::NoToolsSelected)?;
    Ok(target.to_string())
}
