use super::{
    types::{AuthMethod, Config},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - TMDB API key is set
/// - ApiKey auth has a key
/// - Harvest sizes and staleness window are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.tmdb.api_key.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "tmdb.api_key must be set".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().is_none_or(str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when using api_key auth method".to_string(),
        ));
    }

    // Harvest validation
    let harvest = &config.harvest;
    for (name, value) in [
        ("harvest.batch_size", harvest.batch_size),
        ("harvest.page_size", harvest.page_size),
        ("harvest.max_cache_size", harvest.max_cache_size),
        ("harvest.staleness_hours", harvest.staleness_hours as usize),
    ] {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be 0",
                name
            )));
        }
    }

    if harvest.cache_key.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "harvest.cache_key cannot be empty".to_string(),
        ));
    }

    Ok(())
}
