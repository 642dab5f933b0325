use super::{ConfigError, types::{Config, MAX_RETENTION_HOURS}};

/// Validate configuration
/// Currently validates:
/// - store.signing_secret is set
/// - worker.concurrency and the time limits are positive
/// - the hard time limit is not below the soft one
/// - the retention hours are positive and bounded
/// - inbox.poll_interval_secs is positive when an inbox is set
///
/// Suspicious but legal settings are reported by [`config_warnings`];
/// this function does not log them.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.store.signing_secret.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "store.signing_secret must be set".to_string(),
        ));
    }

    let worker = &config.worker;
    if worker.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "worker.concurrency cannot be 0".to_string(),
        ));
    }
    if worker.soft_time_limit_secs == 0 || worker.time_limit_secs == 0 {
        return Err(ConfigError::ValidationError(
            "worker time limits cannot be 0".to_string(),
        ));
    }
    if worker.time_limit_secs < worker.soft_time_limit_secs {
        return Err(ConfigError::ValidationError(format!(
            "worker.time_limit_secs ({}) must be >= worker.soft_time_limit_secs ({})",
            worker.time_limit_secs, worker.soft_time_limit_secs
        )));
    }

    let retention = &config.retention;
    if retention.sweep_interval_hours == 0 {
        return Err(ConfigError::ValidationError(
            "retention.sweep_interval_hours cannot be 0".to_string(),
        ));
    }
    for (name, value) in [
        ("window_hours", retention.window_hours),
        ("sweep_interval_hours", retention.sweep_interval_hours),
    ] {
        if value > MAX_RETENTION_HOURS {
            return Err(ConfigError::ValidationError(format!(
                "retention.{name} ({value}) exceeds {MAX_RETENTION_HOURS}"
            )));
        }
    }
    if config.converter.input_extension.trim_start_matches('.').is_empty() {
        return Err(ConfigError::ValidationError(
            "converter.input_extension cannot be empty".to_string(),
        ));
    }

    if config.inbox.dir.is_some() && config.inbox.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "inbox.poll_interval_secs cannot be 0".to_string(),
        ));
    }
    Ok(())
}

/// Settings that are accepted but likely to surprise.
pub fn config_warnings(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.worker.url_ttl() > config.retention.window() {
        warnings.push(format!(
            "worker.url_ttl_secs ({}) outlives retention.window_hours ({}); \
             result URLs may point at deleted objects",
            config.worker.url_ttl_secs, config.retention.window_hours
        ));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StoreConfig, WorkerConfig};
    use rstest::rstest;

    fn valid() -> Config {
        Config {
            store: StoreConfig {
                signing_secret: "s3cret".to_string(),
                ..StoreConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid()).is_ok());
        assert!(config_warnings(&valid()).is_empty());
    }

    #[test]
    fn missing_secret_fails() {
        let result = validate_config(&Config::default());
        assert!(matches!(result, Err(ConfigError::ValidationError(msg)) if msg.contains("signing_secret")));
    }

    #[rstest]
    #[case::zero_workers(WorkerConfig { concurrency: 0, ..WorkerConfig::default() })]
    #[case::zero_soft(WorkerConfig { soft_time_limit_secs: 0, ..WorkerConfig::default() })]
    #[case::hard_below_soft(WorkerConfig {
        soft_time_limit_secs: 300,
        time_limit_secs: 200,
        ..WorkerConfig::default()
    })]
    fn invalid_worker_settings_fail(#[case] worker: WorkerConfig) {
        let config = Config { worker, ..valid() };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn hard_equal_to_soft_is_allowed() {
        let mut config = valid();
        config.worker.soft_time_limit_secs = 60;
        config.worker.time_limit_secs = 60;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn url_ttl_beyond_retention_warns_but_validates() {
        let mut config = valid();
        config.worker.url_ttl_secs = 48 * 3600;

        assert!(validate_config(&config).is_ok());
        let warnings = config_warnings(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("url_ttl_secs"));
    }

    #[rstest]
    #[case::window(u64::MAX, 6)]
    #[case::interval(24, u64::MAX)]
    #[case::just_over(MAX_RETENTION_HOURS + 1, 6)]
    fn oversized_retention_hours_fail(#[case] window_hours: u64, #[case] sweep_interval_hours: u64) {
        let mut config = valid();
        config.retention.window_hours = window_hours;
        config.retention.sweep_interval_hours = sweep_interval_hours;

        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(msg)) if msg.contains("exceeds")
        ));
    }

    #[test]
    fn retention_durations_saturate_instead_of_overflowing() {
        let mut config = valid();
        config.retention.window_hours = u64::MAX;
        assert_eq!(config.retention.window(), std::time::Duration::from_secs(u64::MAX));
        // and the TTL comparison in config_warnings stays sane
        assert!(config_warnings(&config).is_empty());
    }

    #[test]
    fn inbox_needs_a_poll_interval() {
        let mut config = valid();
        config.inbox.poll_interval_secs = 0;
        // no inbox: the interval is unused
        assert!(validate_config(&config).is_ok());

        config.inbox.dir = Some("./inbox".into());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(msg)) if msg.contains("inbox")
        ));
    }
}
