//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

/// Check one vendor's polling settings.
fn check_polling(section: &str, interval_secs: u64, timeout_secs: u64) -> Result<(), ConfigError> {
    if interval_secs == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{section}.poll_interval_secs must be > 0"
        )));
    }
    if timeout_secs < interval_secs {
        return Err(ConfigError::ValidationError(format!(
            "{section}.timeout_secs must be >= {section}.poll_interval_secs"
        )));
    }
    Ok(())
}

fn check_url(section: &str, url: &str) -> Result<(), ConfigError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "{section}.base_url must be an http(s) URL, got '{url}'"
        )));
    }
    Ok(())
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        check_polling(
            "replicate",
            self.replicate.poll_interval_secs,
            self.replicate.timeout_secs,
        )?;
        check_polling(
            "stability",
            self.stability.poll_interval_secs,
            self.stability.timeout_secs,
        )?;
        check_polling(
            "piapi",
            self.piapi.poll_interval_secs,
            self.piapi.timeout_secs,
        )?;

        check_url("replicate", &self.replicate.base_url)?;
        check_url("stability", &self.stability.base_url)?;
        check_url("piapi", &self.piapi.base_url)?;

        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server.bind must not be empty".into(),
            ));
        }
        if self.server.keep_alive_secs == 0 {
            return Err(ConfigError::ValidationError(
                "server.keep_alive_secs must be > 0".into(),
            ));
        }
        if self.general.download_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "general.download_timeout_secs must be > 0".into(),
            ));
        }
        if self.general.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "general.output_dir must not be empty".into(),
            ));
        }
        Ok(())
    }
}
