use http::HeaderName;

use super::{AppConfig, ConfigError};
use crate::inspect::LogicalField;

/// Validate the full application config, returning an error if any rule is violated.
///
/// A request URI regex that does not compile is not checked here;
/// it is logged when the inspector is built and then never matches.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_upstream(config)?;
    validate_inspection(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    if let Some(max_blocking_threads) = server.runtime_max_blocking_threads {
        if max_blocking_threads == 0 {
            return Err(validation_err(
                "server.runtime_max_blocking_threads must be greater than 0 when set",
            ));
        }
    }
    if let Some(thread_stack_size_kb) = server.runtime_thread_stack_size_kb {
        if thread_stack_size_kb == 0 {
            return Err(validation_err(
                "server.runtime_thread_stack_size_kb must be greater than 0 when set",
            ));
        }
    }
    if let Some(listener_count) = server.tcp_reuse_port_listener_count {
        if listener_count == 0 {
            return Err(validation_err(
                "server.tcp_reuse_port_listener_count must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_upstream(config: &AppConfig) -> Result<(), ConfigError> {
    let base_url = config.upstream.base_url.trim();
    if base_url.is_empty() {
        return Err(validation_err("upstream.base_url cannot be empty"));
    }
    let parsed = url::Url::parse(base_url).map_err(|err| {
        validation_err(format!("upstream.base_url is not a valid URL: {err}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(
            "upstream.base_url must use http:// or https://",
        ));
    }
    if parsed.query().is_some() {
        return Err(validation_err("upstream.base_url must not carry a query"));
    }
    Ok(())
}

fn validate_inspection(config: &AppConfig) -> Result<(), ConfigError> {
    let inspection = &config.inspection;
    if let Some(fields) = &inspection.request_fields {
        for (field, header) in fields {
            if LogicalField::parse(field).is_none() {
                tracing::warn!(field = %field, "inspection.request_fields contains an unknown field, it will be ignored");
                continue;
            }
            if HeaderName::from_bytes(header.as_bytes()).is_err() {
                return Err(validation_err(format!(
                    "inspection.request_fields.{field}: '{header}' is not a valid header name"
                )));
            }
        }
    }
    if inspection.batch_uri_prefix.as_deref() == Some("") {
        return Err(validation_err(
            "inspection.batch_uri_prefix cannot be empty",
        ));
    }
    if inspection.max_body_bytes == Some(0) {
        return Err(validation_err(
            "inspection.max_body_bytes must be greater than 0 when set",
        ));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::*;

    fn make_valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            upstream: UpstreamConfig {
                base_url: "https://api.openai.com".to_string(),
                preserve_host: false,
            },
            inspection: InspectionConfig::default(),
            features: FeaturesConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = make_valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_upstream_url() {
        let mut config = make_valid_config();
        config.upstream.base_url = "api.openai.com".to_string();
        assert!(validate_config(&config).is_err());

        config.upstream.base_url = "ftp://api.openai.com".to_string();
        assert!(validate_config(&config).is_err());

        config.upstream.base_url = "http://localhost:9000?x=1".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_header_name() {
        let mut config = make_valid_config();
        config.inspection.request_fields = Some(BTreeMap::from([(
            "model".to_string(),
            "X-OpenAI Model".to_string(),
        )]));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("request_fields.model"), "{err}");
    }

    #[test]
    fn test_unknown_field_is_not_an_error() {
        let mut config = make_valid_config();
        config.inspection.request_fields = Some(BTreeMap::from([(
            "unknown_field".to_string(),
            "not a header".to_string(),
        )]));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_malformed_regex_is_not_an_error() {
        let mut config = make_valid_config();
        config.inspection.request_uri_regex = "/v1/(chat".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_batch_uri_prefix() {
        let mut config = make_valid_config();
        config.inspection.batch_uri_prefix = Some(String::new());
        assert!(validate_config(&config).is_err());

        config.inspection.batch_uri_prefix = Some("/v1/batches".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_body_limit() {
        let mut config = make_valid_config();
        config.inspection.max_body_bytes = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_log_level() {
        let mut config = make_valid_config();
        config.features.log_level = "warning".to_string();
        assert!(validate_config(&config).is_ok());
        config.features.log_level = "VERBOSE".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_worker_threads() {
        let mut config = make_valid_config();
        config.server.runtime_worker_threads = Some(0);
        assert!(validate_config(&config).is_err());
    }
}
