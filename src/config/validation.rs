use crate::config::types::{
    parse_utc_offset, CatalogConfig, Config, PipelineConfig, ScheduleConfig, SourceConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_source_config(&config.source)?;
    validate_pipeline_config(&config.pipeline)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_catalog_config(&config.catalog)?;
    validate_schedule_config(&config.schedule)?;
    Ok(())
}

/// Validates the source description
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "source name cannot be empty".to_string(),
        ));
    }

    let listing = Url::parse(&config.listing_url).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid listing_url '{}': {}",
            config.listing_url, e
        ))
    })?;

    // HTTP is accepted alongside HTTPS so runs can target local mock servers
    if listing.scheme() != "http" && listing.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "listing_url '{}' must use HTTP or HTTPS",
            config.listing_url
        )));
    }

    if listing.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "listing_url '{}' has no host",
            config.listing_url
        )));
    }

    if !config.path_prefix.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "path_prefix must start with '/', got '{}'",
            config.path_prefix
        )));
    }

    if config.exclude_patterns.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::Validation(
            "exclude_patterns cannot contain empty patterns".to_string(),
        ));
    }

    if config.default_city.trim().is_empty() {
        return Err(ConfigError::Validation(
            "default_city cannot be empty".to_string(),
        ));
    }

    if parse_utc_offset(&config.utc_offset).is_none() {
        return Err(ConfigError::Validation(format!(
            "utc_offset must look like '+10:00', got '{}'",
            config.utc_offset
        )));
    }

    Ok(())
}

/// Validates run bounds
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.max_links_per_run < 1 {
        return Err(ConfigError::Validation(format!(
            "max_links_per_run must be >= 1, got {}",
            config.max_links_per_run
        )));
    }

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 64, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.run_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "run_timeout_secs must be >= 1 when set".to_string(),
        ));
    }

    if config.description_max_length < 1 {
        return Err(ConfigError::Validation(
            "description_max_length must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Upper bound for `stale_after_hours`: one hundred years
const MAX_STALE_AFTER_HOURS: u64 = 24 * 365 * 100;

fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.stale_after_hours < 1 {
        return Err(ConfigError::Validation(
            "stale_after_hours must be >= 1".to_string(),
        ));
    }

    if config.stale_after_hours > MAX_STALE_AFTER_HOURS {
        return Err(ConfigError::Validation(format!(
            "stale_after_hours must be <= {} (got {})",
            MAX_STALE_AFTER_HOURS, config.stale_after_hours
        )));
    }

    Ok(())
}

fn validate_schedule_config(config: &ScheduleConfig) -> Result<(), ConfigError> {
    if config.interval_minutes < 1 {
        return Err(ConfigError::Validation(
            "interval_minutes must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| ConfigError::Validation(format!("Invalid email format: '{}'", email)))?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
