use super::{types::Config, ConfigError};

/// Validate configuration.
///
/// The token is only checked when `require_token` is set. A CSV import reads
/// public release and marketplace data, which Discogs serves without one.
pub fn validate_config(config: &Config, require_token: bool) -> Result<(), ConfigError> {
    if require_token && config.discogs.token.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "discogs.token is required (set DISCOGS_TOKEN)".to_string(),
        ));
    }

    let currency = config.discogs.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::ValidationError(format!(
            "discogs.currency must be a 3-letter code, got '{}'",
            config.discogs.currency
        )));
    }

    if config.rate_limit.min_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "rate_limit.min_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.rate_limit.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "rate_limit.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.fetcher.workers == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher.workers must be at least 1".to_string(),
        ));
    }

    Ok(())
}
