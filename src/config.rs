//! Environment-driven defaults for the command-line front end.
//!
//! The library core never reads the environment; only the `labelkit` binary
//! calls [`Config::from_env`] and turns the result into [`ExecOptions`].
//!
//! | Variable               | Meaning                                   |
//! |------------------------|-------------------------------------------|
//! | `LABELKIT_TIMEOUT_MS`  | default timeout, `0` disables it          |
//! | `LABELKIT_KILL_SIGNAL` | signal sent on timeout (`SIGTERM`, `9`)   |
//! | `LABELKIT_SHELL`       | run commands through the shell by default |
//! | `LABELKIT_MAX_BUFFER`  | cap on captured bytes per stream          |

use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::process::{ExecOptions, KillSignal};

/// Execution defaults loaded from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub timeout: Option<Duration>,
    pub kill_signal: KillSignal,
    pub shell: bool,
    pub max_buffer: Option<usize>,
}

impl Config {
    /// Load `.env` (if present) and read the `LABELKIT_*` variables.
    pub fn from_env() -> Result<Self> {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            return Err(ConfigError::DotEnv(err.to_string()).into());
        }
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("LABELKIT_TIMEOUT_MS") {
            let millis = parse_number::<u64>("LABELKIT_TIMEOUT_MS", &raw)?;
            config.timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }
        if let Some(raw) = lookup("LABELKIT_KILL_SIGNAL") {
            config.kill_signal = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "LABELKIT_KILL_SIGNAL".to_string(),
                message: format!("unknown signal '{}'", raw.trim()),
            })?;
        }
        if let Some(raw) = lookup("LABELKIT_SHELL") {
            config.shell = parse_bool("LABELKIT_SHELL", &raw)?;
        }
        if let Some(raw) = lookup("LABELKIT_MAX_BUFFER") {
            config.max_buffer = Some(parse_number::<usize>("LABELKIT_MAX_BUFFER", &raw)?);
        }

        Ok(config)
    }

    /// Execution options seeded from this config.
    pub fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            timeout: self.timeout,
            kill_signal: self.kill_signal,
            shell: self.shell,
            max_buffer: self.max_buffer,
            ..ExecOptions::default()
        }
    }
}

fn parse_number<N: std::str::FromStr>(
    key: &str,
    raw: &str,
) -> std::result::Result<N, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a non-negative integer, got '{}'", raw.trim()),
    })
}

fn parse_bool(key: &str, raw: &str) -> std::result::Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.timeout.is_none());
        assert_eq!(config.kill_signal, KillSignal::Term);
    }

    #[test]
    fn test_reads_all_variables() {
        let config = Config::from_lookup(lookup_from(&[
            ("LABELKIT_TIMEOUT_MS", "1500"),
            ("LABELKIT_KILL_SIGNAL", "SIGKILL"),
            ("LABELKIT_SHELL", "yes"),
            ("LABELKIT_MAX_BUFFER", "65536"),
        ]))
        .unwrap();

        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.kill_signal, KillSignal::Kill);
        assert!(config.shell);
        assert_eq!(config.max_buffer, Some(65536));
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let config = Config::from_lookup(lookup_from(&[("LABELKIT_TIMEOUT_MS", "0")])).unwrap();
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("LABELKIT_TIMEOUT_MS", "soon")])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("LABELKIT_TIMEOUT_MS"));
        assert!(msg.contains("soon"));
    }

    #[test]
    fn test_invalid_signal_names_the_variable() {
        let err =
            Config::from_lookup(lookup_from(&[("LABELKIT_KILL_SIGNAL", "SIGFOO")])).unwrap_err();
        assert!(err.to_string().contains("LABELKIT_KILL_SIGNAL"));
    }

    #[test]
    fn test_invalid_bool_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("LABELKIT_SHELL", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn test_from_env_without_dotenv_file() {
        let config = Config::from_env();
        assert!(config.is_ok() || matches!(config, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_exec_options_carry_config() {
        let config = Config {
            timeout: Some(Duration::from_secs(3)),
            kill_signal: KillSignal::Int,
            shell: true,
            max_buffer: Some(10),
        };
        let options = config.exec_options();

        assert_eq!(options.timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.kill_signal, KillSignal::Int);
        assert!(options.shell);
        assert_eq!(options.max_buffer, Some(10));
        assert!(options.cwd.is_none());
    }
}
