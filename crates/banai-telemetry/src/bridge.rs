//! Conversion from the `[logging]` config section.

use banai_config::LoggingSection;

use crate::error::TelemetryResult;
use crate::logging::{FileRotation, LogConfig, LogFormat};

impl LogConfig {
    /// Build a log config from the `[logging]` section of `banai.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TelemetryError::ConfigError`] for an unknown format.
    pub fn from_section(section: &LoggingSection) -> TelemetryResult<Self> {
        let format: LogFormat = section.format.parse()?;
        let mut config = Self::new(section.level.clone()).with_format(format);
        config.directives.clone_from(&section.directives);
        if let Some(dir) = &section.directory {
            config = config.with_file_logging(dir.clone(), FileRotation::Daily);
        }
        Ok(config)
    }
}
