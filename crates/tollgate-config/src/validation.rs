//! Configuration validation

use crate::schema::RawConfig;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("default_page_size {default} exceeds max_page_size {max}")]
    PageSizeOrder { default: u32, max: u32 },

    #[error("{field} must not be empty")]
    EmptyPath { field: &'static str },
}

/// Validate a raw configuration, collecting every problem
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let tokens = &config.tokens;
    if tokens.max_name_length == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "tokens.max_name_length",
        });
    }
    if tokens.default_page_size == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "tokens.default_page_size",
        });
    }
    if tokens.max_page_size == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "tokens.max_page_size",
        });
    }

    // Compare against the effective values so a lone override is checked too
    let default = tokens
        .default_page_size
        .unwrap_or(crate::DEFAULT_PAGE_SIZE);
    let max = tokens.max_page_size.unwrap_or(crate::MAX_PAGE_SIZE);
    if default > 0 && max > 0 && default > max {
        errors.push(ValidationError::PageSizeOrder { default, max });
    }

    if config.rate_limit.requests == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "rate_limit.requests",
        });
    }
    if config.rate_limit.interval_ms == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "rate_limit.interval_ms",
        });
    }

    let paths = [
        ("service.socket_path", &config.service.socket_path),
        ("service.data_dir", &config.service.data_dir),
    ];
    for (field, path) in paths {
        if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            errors.push(ValidationError::EmptyPath { field });
        }
    }

    errors
}
