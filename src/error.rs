//! Error types for labelkit.

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Errors returned by channel operations.
///
/// Process failures never show up here: the execution bridge folds them into
/// the terminal `ExecResult` message instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("cannot send on a closed channel")]
    Closed,

    #[error("channel is full ({capacity} queued messages)")]
    Full { capacity: usize },
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load .env file: {0}")]
    DotEnv(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_closed_display() {
        let err = ChannelError::Closed;
        assert_eq!(err.to_string(), "cannot send on a closed channel");
    }

    #[test]
    fn test_channel_error_full_display() {
        let err = ChannelError::Full { capacity: 4 };
        assert!(err.to_string().contains('4'));
    }

    #[test]
    fn test_config_error_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            key: "LABELKIT_TIMEOUT_MS".to_string(),
            message: "must be a number".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("LABELKIT_TIMEOUT_MS"));
        assert!(msg.contains("must be a number"));
    }

    #[test]
    fn test_error_from_channel_error() {
        let err = Error::from(ChannelError::Closed);
        assert!(err.to_string().contains("Channel error"));
    }

    #[test]
    fn test_error_from_config_error() {
        let err = Error::from(ConfigError::DotEnv("bad line 3".to_string()));
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("bad line 3"));
    }
}
