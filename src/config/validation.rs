//! Configuration validation.

use url::Url;

use crate::config::schema::SelectionConfig;

/// A single validation failure, with the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a full configuration, collecting every failure.
pub fn validate_config(config: &SelectionConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.selector.max_concurrent_requests == 0 {
        errors.push(ValidationError {
            field: "selector.max_concurrent_requests".into(),
            message: "must be at least 1".into(),
        });
    }
    if config.selector.max_rounds == 0 {
        errors.push(ValidationError {
            field: "selector.max_rounds".into(),
            message: "must be at least 1".into(),
        });
    }
    if config.replica.replica_count == 0 {
        errors.push(ValidationError {
            field: "replica.replica_count".into(),
            message: "must be at least 1".into(),
        });
    }

    for list in [
        ("selector.whitelist", &config.selector.whitelist),
        ("selector.blacklist", &config.selector.blacklist),
        ("replica.whitelist", &config.replica.whitelist),
        ("replica.blacklist", &config.replica.blacklist),
    ] {
        if let Some(endpoints) = list.1 {
            for endpoint in endpoints {
                if Url::parse(endpoint).is_err() {
                    errors.push(ValidationError {
                        field: list.0.into(),
                        message: format!("invalid endpoint URL: {endpoint}"),
                    });
                }
            }
        }
    }

    for url in &config.gateway.gateway_urls {
        if Url::parse(url).is_err() {
            errors.push(ValidationError {
                field: "gateway.gateway_urls".into(),
                message: format!("invalid gateway URL: {url}"),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
