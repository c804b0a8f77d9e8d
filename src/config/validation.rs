use crate::config::types::{
    Config, ExtractConfig, FingerprintConfig, HttpConfig, OutputConfig, RetryConfig, ScrapeConfig,
};
use crate::url::parse_start_url;
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scrape_config(&config.scrape)?;
    validate_retry_config(&config.retry)?;
    validate_fingerprint_config(&config.fingerprints)?;
    validate_http_config(&config.http)?;
    validate_extract_config(&config.extract)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_scrape_config(config: &ScrapeConfig) -> Result<(), ConfigError> {
    parse_start_url(&config.start_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid start_url '{}': {}", config.start_url, e))
    })?;

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    config.to_policy().validate()
}

fn validate_fingerprint_config(config: &FingerprintConfig) -> Result<(), ConfigError> {
    if config.user_agents.iter().all(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents must contain at least one non-empty entry".to_string(),
        ));
    }

    if config.accept_languages.is_empty() {
        return Err(ConfigError::Validation(
            "accept_languages cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "connect_timeout_secs must be >= 1, got {}",
            config.connect_timeout_secs
        )));
    }

    Ok(())
}

/// Selectors must parse up front so a bad template fails before any request
fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    let selectors = &config.selectors;
    let required = [
        ("item", Some(&selectors.item)),
        ("name", Some(&selectors.name)),
        ("price", Some(&selectors.price)),
    ];
    let optional = [
        ("availability", selectors.availability.as_ref()),
        ("image", selectors.image.as_ref()),
        ("link", selectors.link.as_ref()),
        ("rating", selectors.rating.as_ref()),
    ];

    for (field, selector) in required.iter().chain(optional.iter()) {
        if let Some(selector) = selector {
            validate_selector(field, selector)?;
        }
    }

    if let Some(base) = &config.product_base_url {
        Url::parse(base).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid product_base_url '{}': {}", base, e))
        })?;
    }

    Ok(())
}

fn validate_selector(field: &str, selector: &str) -> Result<(), ConfigError> {
    if selector.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "selector '{}' cannot be empty",
            field
        )));
    }

    Selector::parse(selector).map_err(|e| {
        ConfigError::Validation(format!(
            "selector '{}' is not valid CSS ('{}'): {:?}",
            field, selector, e
        ))
    })?;

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if matches!(&config.summary_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}
