use super::{types::Config, ConfigError};
use crate::profile::TargetProfile;

/// Validate configuration
/// Currently validates:
/// - Tool paths are not empty
/// - The configured profile builds
/// - Watch folder poll interval and parallelism are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let tools = [
        ("tools.ffmpeg_path", &config.tools.ffmpeg_path),
        ("tools.ffprobe_path", &config.tools.ffprobe_path),
        ("tools.sox_path", &config.tools.sox_path),
        ("tools.temp_dir", &config.tools.temp_dir),
    ];
    for (key, path) in tools {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                key
            )));
        }
    }

    TargetProfile::from_overrides(&config.profile)
        .map_err(|e| ConfigError::ValidationError(format!("profile: {}", e)))?;

    if let Some(watch) = &config.watch {
        if watch.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "watch.poll_interval_secs cannot be 0".to_string(),
            ));
        }
        if watch.max_parallel == 0 {
            return Err(ConfigError::ValidationError(
                "watch.max_parallel cannot be 0".to_string(),
            ));
        }
        if watch.input_dir == watch.output_dir {
            return Err(ConfigError::ValidationError(
                "watch.output_dir must differ from watch.input_dir".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchConfig;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_tool_path_fails() {
        let mut config = Config::default();
        config.tools.sox_path = PathBuf::new();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("sox_path")));
    }

    #[test]
    fn test_validate_invalid_profile_fails() {
        let mut config = Config::default();
        config.profile.width = Some(0);
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.starts_with("profile")));
    }

    #[test]
    fn test_validate_watch_zero_parallelism_fails() {
        let mut watch = WatchConfig::new("/in", "/out");
        watch.max_parallel = 0;
        let config = Config {
            watch: Some(watch),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_watch_zero_poll_interval_fails() {
        let mut watch = WatchConfig::new("/in", "/out");
        watch.poll_interval_secs = 0;
        let config = Config {
            watch: Some(watch),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
