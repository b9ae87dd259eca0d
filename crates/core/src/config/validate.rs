use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Area limits are positive, finite and ordered
/// - Job time limits are ordered and concurrency is non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    let limits = &config.limits;
    if !(limits.max_bbox_area_deg2.is_finite() && limits.max_bbox_area_deg2 > 0.0) {
        return Err(invalid("limits.max_bbox_area_deg2 must be a positive number"));
    }
    if !(limits.min_bbox_area_deg2.is_finite() && limits.min_bbox_area_deg2 >= 0.0) {
        return Err(invalid("limits.min_bbox_area_deg2 must be a non-negative number"));
    }
    if limits.min_bbox_area_deg2 > limits.max_bbox_area_deg2 {
        return Err(invalid(
            "limits.min_bbox_area_deg2 cannot exceed limits.max_bbox_area_deg2",
        ));
    }

    if !(config.overpass.tile_area_deg2.is_finite() && config.overpass.tile_area_deg2 > 0.0) {
        return Err(invalid("overpass.tile_area_deg2 must be a positive number"));
    }
    if config.overpass.max_concurrent_fetches == 0 {
        return Err(invalid("overpass.max_concurrent_fetches cannot be 0"));
    }

    if config.storage.artifact_filename.is_empty()
        || config.storage.artifact_filename.contains(['/', '\\'])
    {
        return Err(invalid("storage.artifact_filename must be a plain file name"));
    }
    if config.storage.download_chunk_bytes == 0 {
        return Err(invalid("storage.download_chunk_bytes cannot be 0"));
    }

    let jobs = &config.jobs;
    if jobs.hard_time_limit_secs == 0 {
        return Err(invalid("jobs.hard_time_limit_secs cannot be 0"));
    }
    if jobs.soft_time_limit_secs > jobs.hard_time_limit_secs {
        return Err(invalid(
            "jobs.soft_time_limit_secs cannot exceed jobs.hard_time_limit_secs",
        ));
    }
    if jobs.max_concurrent_jobs == 0 {
        return Err(invalid("jobs.max_concurrent_jobs cannot be 0"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_inverted_area_limits_fails() {
        let mut config = Config::default();
        config.limits.min_bbox_area_deg2 = 5.0;
        config.limits.max_bbox_area_deg2 = 4.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_nan_tile_area_fails() {
        let mut config = Config::default();
        config.overpass.tile_area_deg2 = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_soft_limit_above_hard_limit_fails() {
        let mut config = Config::default();
        config.jobs.soft_time_limit_secs = 700;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("soft_time_limit_secs"));
    }

    #[test]
    fn test_validate_artifact_name_with_separator_fails() {
        let mut config = Config::default();
        config.storage.artifact_filename = "../gmapsupp.img".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let mut config = Config::default();
        config.overpass.max_concurrent_fetches = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.jobs.max_concurrent_jobs = 0;
        assert!(validate_config(&config).is_err());
    }
}
