use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_allowed_keys(config)?;
    validate_upstream(config)?;
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
    if !server.base_path.is_empty() && !server.base_path.starts_with('/') {
        return Err(validation_err("server.base_path must start with '/'"));
    }
    Ok(())
}

fn validate_allowed_keys(config: &AppConfig) -> Result<(), ConfigError> {
    if config.client_authentication.allowed_keys.is_empty() {
        return Err(validation_err("allowed_keys cannot be empty"));
    }
    for key in &config.client_authentication.allowed_keys {
        if key.trim().is_empty() {
            return Err(validation_err("allowed_keys contains an empty key"));
        }
    }
    Ok(())
}

fn validate_upstream(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    match url::Url::parse(&upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
        Ok(_) => {
            return Err(validation_err(
                "upstream.base_url must start with http:// or https://",
            ))
        }
        Err(err) => {
            return Err(validation_err(format!(
                "upstream.base_url is not a valid URL: {err}"
            )))
        }
    }
    if upstream.api_key.trim().is_empty() {
        return Err(validation_err(
            "upstream.api_key cannot be empty (set api_key or api_key_env)",
        ));
    }
    if upstream.model.trim().is_empty() {
        return Err(validation_err("upstream.model cannot be empty"));
    }
    if upstream.api_version.trim().is_empty() {
        return Err(validation_err("upstream.api_version cannot be empty"));
    }
    if upstream.default_max_tokens == 0 {
        return Err(validation_err(
            "upstream.default_max_tokens must be greater than 0",
        ));
    }
    if upstream.timeout_secs == 0 {
        return Err(validation_err("upstream.timeout_secs must be greater than 0"));
    }
    if upstream.connect_timeout_secs == 0 {
        return Err(validation_err(
            "upstream.connect_timeout_secs must be greater than 0",
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
    use super::*;
    use crate::config::{ClientAuthConfig, FeaturesConfig, ServerConfig, UpstreamConfig};

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            upstream: UpstreamConfig {
                base_url: "https://api.anthropic.com".to_string(),
                api_key: "sk-test".to_string(),
                api_key_env: None,
                model: "claude-test".to_string(),
                default_max_tokens: 1024,
                api_version: "2023-06-01".to_string(),
                timeout_secs: 300,
                connect_timeout_secs: 5,
            },
            client_authentication: ClientAuthConfig {
                allowed_keys: vec!["client-key".to_string()],
            },
            features: FeaturesConfig::default(),
        }
    }

    fn err_message(config: &AppConfig) -> String {
        match validate_config(config) {
            Err(ConfigError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_base_url_must_be_http() {
        let mut config = valid_config();
        config.upstream.base_url = "ftp://example.com".to_string();
        assert!(err_message(&config).contains("http:// or https://"));

        config.upstream.base_url = "not a url".to_string();
        assert!(err_message(&config).contains("not a valid URL"));
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let mut config = valid_config();
        config.upstream.api_key = "  ".to_string();
        assert!(err_message(&config).contains("api_key"));

        let mut config = valid_config();
        config.client_authentication.allowed_keys.clear();
        assert!(err_message(&config).contains("allowed_keys"));

        let mut config = valid_config();
        config.client_authentication.allowed_keys = vec![String::new()];
        assert!(err_message(&config).contains("empty key"));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = valid_config();
        config.upstream.default_max_tokens = 0;
        assert!(err_message(&config).contains("default_max_tokens"));

        let mut config = valid_config();
        config.upstream.timeout_secs = 0;
        assert!(err_message(&config).contains("timeout_secs"));

        let mut config = valid_config();
        config.upstream.connect_timeout_secs = 0;
        assert!(err_message(&config).contains("connect_timeout_secs"));

        let mut config = valid_config();
        config.server.runtime_worker_threads = Some(0);
        assert!(err_message(&config).contains("runtime_worker_threads"));
    }

    #[test]
    fn test_empty_model_rejected() {
        let mut config = valid_config();
        config.upstream.model = String::new();
        assert!(err_message(&config).contains("model"));
    }

    #[test]
    fn test_base_path_must_be_absolute() {
        let mut config = valid_config();
        config.server.base_path = "api".to_string();
        assert!(err_message(&config).contains("base_path"));
        config.server.base_path = "/api".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_log_level_checked_case_insensitively() {
        let mut config = valid_config();
        config.features.log_level = "warning".to_string();
        assert!(validate_config(&config).is_ok());
        config.features.log_level = "VERBOSE".to_string();
        assert!(err_message(&config).contains("log_level"));
    }
}
