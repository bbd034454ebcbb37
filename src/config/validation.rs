//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (poll intervals > 0)
//! - Reject markers that cannot delimit a variable name
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use tracing_subscriber::EnvFilter;

use crate::config::schema::ServiceConfig;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.watch.idle_poll_ms == 0 {
        errors.push(ValidationError::new("watch.idle_poll_ms", "must be greater than 0"));
    }
    if config.watch.poll_interval_ms == 0 {
        errors.push(ValidationError::new("watch.poll_interval_ms", "must be greater than 0"));
    }

    let marker = config.resolver.marker;
    if marker.is_alphanumeric() || marker.is_whitespace() || marker == '/' || marker == '\\' {
        errors.push(ValidationError::new(
            "resolver.marker",
            format!("{marker:?} cannot delimit a variable name"),
        ));
    }
    if let Some(name) = config.resolver.variables.keys().find(|k| k.is_empty()) {
        errors.push(ValidationError::new(
            "resolver.variables",
            format!("variable name {name:?} is empty"),
        ));
    }

    if let Err(e) = EnvFilter::try_new(&config.observability.log_level) {
        errors.push(ValidationError::new("observability.log_level", e.to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(validate_config(&ServiceConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServiceConfig::default();
        config.watch.idle_poll_ms = 0;
        config.watch.poll_interval_ms = 0;
        config.resolver.marker = 'x';
        config.resolver.variables.insert(String::new(), "v".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "watch.idle_poll_ms",
                "watch.poll_interval_ms",
                "resolver.marker",
                "resolver.variables"
            ]
        );
    }
}
