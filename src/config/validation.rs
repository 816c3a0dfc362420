//! Runtime parameter validation.
//!
//! # Responsibilities
//! - Semantic validation (clap handles syntax and types)
//! - Check the upstream endpoint is a usable http URL
//! - Validate value ranges (status code, timeouts)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: &ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before any socket is bound

use axum::http::StatusCode;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream endpoint {endpoint:?} is not a valid URL: {reason}")]
    UpstreamUrl { endpoint: String, reason: String },

    #[error("upstream endpoint scheme must be http (https is not supported), got {0:?}")]
    UpstreamScheme(String),

    #[error("deny response code {0} is not a final HTTP status (200-599)")]
    DenyStatus(u16),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Validate runtime parameters.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.upstream_endpoint) {
        Ok(url) if url.scheme() != "http" => {
            errors.push(ValidationError::UpstreamScheme(url.scheme().to_string()));
        }
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::UpstreamUrl {
                endpoint: config.upstream_endpoint.clone(),
                reason: "missing host".to_string(),
            });
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::UpstreamUrl {
            endpoint: config.upstream_endpoint.clone(),
            reason: e.to_string(),
        }),
    }

    if deny_status(config.deny_response_code).is_none() {
        errors.push(ValidationError::DenyStatus(config.deny_response_code));
    }

    if config.exit_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("exit timeout"));
    }
    if config.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request timeout"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The deny status as a [`StatusCode`], if it is a final HTTP status.
pub fn deny_status(code: u16) -> Option<StatusCode> {
    if (200..=599).contains(&code) {
        StatusCode::from_u16(code).ok()
    } else {
        None
    }
}
