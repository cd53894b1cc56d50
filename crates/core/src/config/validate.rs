use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Telegram bot token is set
/// - Service URLs are non-empty
/// - Timeouts and the poll interval are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "telegram.bot_token cannot be empty".to_string(),
        ));
    }

    for (key, url) in [
        ("telegram.api_url", &config.telegram.api_url),
        ("index.url", &config.index.url),
        ("agent.url", &config.agent.url),
        ("catalog.url", &config.catalog.url),
    ] {
        if url.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                key
            )));
        }
    }

    for (key, secs) in [
        ("telegram.timeout_secs", config.telegram.timeout_secs),
        ("telegram.upload_timeout_secs", config.telegram.upload_timeout_secs),
        ("index.timeout_secs", config.index.timeout_secs),
        ("agent.timeout_secs", config.agent.timeout_secs),
        ("catalog.timeout_secs", config.catalog.timeout_secs),
    ] {
        if secs == 0 {
            return Err(ConfigError::ValidationError(format!("{} cannot be 0", key)));
        }
    }

    if config.lifecycle.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "lifecycle.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.http.enabled && config.http.port == 0 {
        return Err(ConfigError::ValidationError(
            "http.port cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn valid_config() -> Config {
        load_config_from_str("[telegram]\nbot_token = \"123:abc\"\n").unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_empty_token_fails() {
        let mut config = valid_config();
        config.telegram.bot_token = "  ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_empty_agent_url_fails() {
        let mut config = valid_config();
        config.agent.url = String::new();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("agent.url"));
    }

    #[test]
    fn test_validate_zero_poll_interval_fails() {
        let mut config = valid_config();
        config.lifecycle.poll_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = valid_config();
        config.index.timeout_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("index.timeout_secs"));
    }

    #[test]
    fn test_validate_disabled_http_ignores_port() {
        let mut config = valid_config();
        config.http.enabled = false;
        config.http.port = 0;
        assert!(validate_config(&config).is_ok());
    }
}
