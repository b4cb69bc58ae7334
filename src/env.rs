//! Environment variable names used by this crate for convenient
//! configuration of the console sink from applications.
//!
//! These are purely helpers; the formatter and writer never read the
//! environment themselves.

use crate::record::{Level, ParseLevelError};
use std::str::FromStr;

/// Color mode: `auto`, `always` or `never`.
pub const LOG_SINK_COLOR_ENV: &str = "LOG_SINK_COLOR";

/// Minimum level that triggers a sync after writing, e.g. `error`.
pub const LOG_SINK_SYNC_LEVEL_ENV: &str = "LOG_SINK_SYNC_LEVEL";

/// Name reported with sync failures.
pub const LOG_SINK_NAME_ENV: &str = "LOG_SINK_NAME";

/// Whether to colorize output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorChoice {
    /// Colorize when the sink is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for ColorChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(ConfigError::InvalidColor(s.to_string())),
        }
    }
}

/// Error type returned when reading configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid color choice {0:?}, expected auto, always or never")]
    InvalidColor(String),

    #[error("invalid sync level: {0}")]
    InvalidLevel(#[from] ParseLevelError),
}

pub(crate) fn parse_level(s: &str) -> Result<Level, ConfigError> {
    Ok(s.parse::<Level>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_choice_parses() {
        assert_eq!("Always".parse::<ColorChoice>(), Ok(ColorChoice::Always));
        assert_eq!(" never".parse::<ColorChoice>(), Ok(ColorChoice::Never));
        assert_eq!(
            "rainbow".parse::<ColorChoice>(),
            Err(ConfigError::InvalidColor("rainbow".to_string()))
        );
    }

    #[test]
    fn level_errors_convert() {
        let err = parse_level("loud").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLevel(_)));
        assert_eq!(err.to_string(), "invalid sync level: unknown log level \"loud\"");
    }
}
