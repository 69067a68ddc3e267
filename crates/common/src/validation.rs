//! Input validation for data crossing the tunnel
//!
//! Subdomains come from agents, request ids come back from agents, and paths
//! are spliced into the agent's local URL, so each gets checked before use.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// A single DNS label: lowercase alphanumerics and inner hyphens
static SUBDOMAIN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").unwrap());

/// Correlation ids are hyphenated UUIDs
static REQUEST_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$").unwrap()
});

/// Maximum length for HTTP paths
pub const MAX_PATH_LENGTH: usize = 8192;

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid subdomain: {0}")]
    InvalidSubdomain(String),

    #[error("Invalid request ID format: {0}")]
    InvalidRequestId(String),

    #[error("Path too long: {0} bytes (max: {1})")]
    PathTooLong(usize, usize),
}

/// Validate a requested subdomain
///
/// # Examples
///
/// ```
/// use tunl_common::validation::validate_subdomain;
///
/// assert!(validate_subdomain("bold-calm-fox").is_ok());
/// assert!(validate_subdomain("Not_Valid").is_err());
/// assert!(validate_subdomain("-leading").is_err());
/// ```
pub fn validate_subdomain(subdomain: &str) -> Result<(), ValidationError> {
    if !SUBDOMAIN_REGEX.is_match(subdomain) {
        return Err(ValidationError::InvalidSubdomain(
            subdomain.chars().take(64).collect::<String>(), // Limit error message
        ));
    }
    Ok(())
}

/// Validate request ID format
///
/// # Examples
///
/// ```
/// use tunl_common::validation::validate_request_id;
///
/// assert!(validate_request_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_request_id("invalid").is_err());
/// ```
pub fn validate_request_id(id: &str) -> Result<(), ValidationError> {
    if !REQUEST_ID_REGEX.is_match(id) {
        return Err(ValidationError::InvalidRequestId(
            id.chars().take(50).collect::<String>(), // Limit error message
        ));
    }
    Ok(())
}

/// Validate and normalize an HTTP path
///
/// - Removes control characters
/// - Enforces length limits
/// - Ensures path starts with / so it cannot change the authority it is appended to
pub fn validate_path(path: &str) -> Result<String, ValidationError> {
    if path.len() > MAX_PATH_LENGTH {
        return Err(ValidationError::PathTooLong(path.len(), MAX_PATH_LENGTH));
    }

    let sanitized: String = path.chars().filter(|c| !c.is_control()).collect();

    if sanitized.is_empty() {
        Ok("/".to_string())
    } else if sanitized.starts_with('/') {
        Ok(sanitized)
    } else {
        Ok(format!("/{}", sanitized))
    }
}
