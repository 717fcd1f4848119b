use crate::config::types::{
    AnalysisConfig, Config, CrawlerConfig, OutputConfig, RenderConfig, TargetConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target_config(&config.target)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_render_config(&config.render)?;
    validate_analysis_config(&config.analysis)?;
    Ok(())
}

/// Validates the seed and render URLs
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    validate_http_url("seed-url", &config.seed_url)?;
    if let Some(render_url) = &config.render_url {
        validate_http_url("render-url", render_url)?;
    }
    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            field, value
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    let fields = [
        ("content-dir", &config.content_dir),
        ("database-path", &config.database_path),
        ("api-endpoints-path", &config.api_endpoints_path),
        ("message-log-path", &config.message_log_path),
        ("reports-dir", &config.reports_dir),
    ];

    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    if config.navigation_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "navigation-timeout-ms must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates analysis configuration
fn validate_analysis_config(config: &AnalysisConfig) -> Result<(), ConfigError> {
    if config.token_ceiling == 0 {
        return Err(ConfigError::Validation(
            "token-ceiling must be >= 1".to_string(),
        ));
    }

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation("model cannot be empty".to_string()));
    }

    Url::parse(&config.api_base)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api-base: {}", e)))?;

    if config.api_key_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "api-key-env cannot be empty".to_string(),
        ));
    }

    for ext in &config.skip_extensions {
        if ext.is_empty() || ext.starts_with('.') {
            return Err(ConfigError::Validation(format!(
                "skip-extensions entries are bare extensions like \"css\", got '{}'",
                ext
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("seed-url", "https://example.com/").is_ok());
        assert!(validate_http_url("seed-url", "http://127.0.0.1:8080/").is_ok());

        assert!(validate_http_url("seed-url", "").is_err());
        assert!(validate_http_url("seed-url", "ftp://example.com/").is_err());
        assert!(validate_http_url("seed-url", "not a url").is_err());
    }

    #[test]
    fn test_crawler_name_characters() {
        let mut ua = UserAgentConfig::default();
        assert!(validate_user_agent_config(&ua).is_ok());

        ua.crawler_name = "bad name!".to_string();
        assert!(validate_user_agent_config(&ua).is_err());

        ua.crawler_name = String::new();
        assert!(validate_user_agent_config(&ua).is_err());
    }

    #[test]
    fn test_skip_extensions_format() {
        let mut analysis = AnalysisConfig::default();
        assert!(validate_analysis_config(&analysis).is_ok());

        analysis.skip_extensions = vec![".css".to_string()];
        assert!(validate_analysis_config(&analysis).is_err());
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let analysis = AnalysisConfig {
            token_ceiling: 0,
            ..AnalysisConfig::default()
        };
        assert!(validate_analysis_config(&analysis).is_err());
    }
}
