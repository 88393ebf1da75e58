//! Options, results and signals for process execution.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Appended to stderr of the terminal message when a process times out.
pub const TIMEOUT_MARKER: &str = "process timed out";

/// An execution update.
///
/// Partial updates carry one new chunk in either `stdout` or `stderr`. The
/// terminal update carries everything captured plus the exit status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when killed by a signal, timed out or never started.
    pub code: Option<i32>,
    /// Name of the terminating signal, e.g. `"SIGTERM"`.
    pub signal: Option<String>,
}

impl ExecResult {
    /// A partial update carrying a stdout chunk.
    pub fn stdout_chunk(chunk: impl Into<String>) -> Self {
        Self {
            stdout: chunk.into(),
            ..Self::default()
        }
    }

    /// A partial update carrying a stderr chunk.
    pub fn stderr_chunk(chunk: impl Into<String>) -> Self {
        Self {
            stderr: chunk.into(),
            ..Self::default()
        }
    }

    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Whether this terminal result was produced by the timeout.
    pub fn timed_out(&self) -> bool {
        self.code.is_none() && self.signal.is_none() && self.stderr.ends_with(TIMEOUT_MARKER)
    }
}

/// Signal sent to a process whose timeout elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum KillSignal {
    Hup,
    Int,
    Quit,
    Abrt,
    Kill,
    Segv,
    Pipe,
    Alrm,
    #[default]
    Term,
    /// Any other signal, by number.
    Other(i32),
}

impl KillSignal {
    const NAMED: [KillSignal; 9] = [
        KillSignal::Hup,
        KillSignal::Int,
        KillSignal::Quit,
        KillSignal::Abrt,
        KillSignal::Kill,
        KillSignal::Segv,
        KillSignal::Pipe,
        KillSignal::Alrm,
        KillSignal::Term,
    ];

    /// The POSIX signal number.
    pub fn number(self) -> i32 {
        match self {
            KillSignal::Hup => 1,
            KillSignal::Int => 2,
            KillSignal::Quit => 3,
            KillSignal::Abrt => 6,
            KillSignal::Kill => 9,
            KillSignal::Segv => 11,
            KillSignal::Pipe => 13,
            KillSignal::Alrm => 14,
            KillSignal::Term => 15,
            KillSignal::Other(number) => number,
        }
    }

    /// Map a signal number back to a variant.
    pub fn from_number(number: i32) -> Self {
        Self::NAMED
            .into_iter()
            .find(|signal| signal.number() == number)
            .unwrap_or(KillSignal::Other(number))
    }

    fn short_name(self) -> Option<&'static str> {
        match self {
            KillSignal::Hup => Some("HUP"),
            KillSignal::Int => Some("INT"),
            KillSignal::Quit => Some("QUIT"),
            KillSignal::Abrt => Some("ABRT"),
            KillSignal::Kill => Some("KILL"),
            KillSignal::Segv => Some("SEGV"),
            KillSignal::Pipe => Some("PIPE"),
            KillSignal::Alrm => Some("ALRM"),
            KillSignal::Term => Some("TERM"),
            KillSignal::Other(_) => None,
        }
    }
}

impl fmt::Display for KillSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.short_name() {
            Some(name) => write!(f, "SIG{}", name),
            None => write!(f, "{}", self.number()),
        }
    }
}

impl FromStr for KillSignal {
    type Err = ConfigError;

    /// Accepts `SIGTERM`, `term` or `15` style names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);

        if let Some(signal) = Self::NAMED
            .into_iter()
            .find(|signal| signal.short_name() == Some(name))
        {
            return Ok(signal);
        }

        match name.parse::<i32>() {
            Ok(number) if number > 0 => Ok(Self::from_number(number)),
            _ => Err(ConfigError::InvalidValue {
                key: "kill_signal".to_string(),
                message: format!("unknown signal '{}'", s.trim()),
            }),
        }
    }
}

/// Per-call execution options.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Working directory; inherits the caller's when unset.
    pub cwd: Option<PathBuf>,
    /// Variables set on top of the inherited environment.
    pub env: HashMap<String, String>,
    /// Run through the platform shell with command and args joined by spaces.
    pub shell: bool,
    /// Kill the process with `kill_signal` after this long.
    pub timeout: Option<Duration>,
    /// Cap on cumulative bytes kept per stream for the terminal message.
    /// Partial chunks are always forwarded in full.
    pub max_buffer: Option<usize>,
    pub kill_signal: KillSignal,
}

impl ExecOptions {
    /// Options with every field at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the command from `cwd`.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set one environment variable for the command.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Run through the platform shell.
    pub fn with_shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }

    /// Terminate the process after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cap the captured output per stream.
    pub fn with_max_buffer(mut self, bytes: usize) -> Self {
        self.max_buffer = Some(bytes);
        self
    }

    /// Signal used when the timeout elapses.
    pub fn with_kill_signal(mut self, signal: KillSignal) -> Self {
        self.kill_signal = signal;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- KillSignal ---

    #[test]
    fn test_kill_signal_defaults_to_term() {
        assert_eq!(KillSignal::default(), KillSignal::Term);
        assert_eq!(KillSignal::default().number(), 15);
    }

    #[test]
    fn test_kill_signal_parse_names() {
        assert_eq!("SIGTERM".parse::<KillSignal>().unwrap(), KillSignal::Term);
        assert_eq!("kill".parse::<KillSignal>().unwrap(), KillSignal::Kill);
        assert_eq!(" SigInt ".parse::<KillSignal>().unwrap(), KillSignal::Int);
        assert_eq!("HUP".parse::<KillSignal>().unwrap(), KillSignal::Hup);
    }

    #[test]
    fn test_kill_signal_parse_numbers() {
        assert_eq!("9".parse::<KillSignal>().unwrap(), KillSignal::Kill);
        assert_eq!("15".parse::<KillSignal>().unwrap(), KillSignal::Term);
        assert_eq!("10".parse::<KillSignal>().unwrap(), KillSignal::Other(10));
    }

    #[test]
    fn test_kill_signal_parse_rejects_garbage() {
        assert!("SIGNOPE".parse::<KillSignal>().is_err());
        assert!("-3".parse::<KillSignal>().is_err());
        assert!("".parse::<KillSignal>().is_err());

        let err = "bogus".parse::<KillSignal>().unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_kill_signal_display() {
        assert_eq!(KillSignal::Term.to_string(), "SIGTERM");
        assert_eq!(KillSignal::Segv.to_string(), "SIGSEGV");
        assert_eq!(KillSignal::Other(42).to_string(), "42");
    }

    #[test]
    fn test_kill_signal_number_round_trip() {
        for signal in KillSignal::NAMED {
            assert_eq!(KillSignal::from_number(signal.number()), signal);
        }
        assert_eq!(KillSignal::from_number(31), KillSignal::Other(31));
    }

    // --- ExecResult ---

    #[test]
    fn test_chunk_constructors() {
        let out = ExecResult::stdout_chunk("line\n");
        assert_eq!(out.stdout, "line\n");
        assert!(out.stderr.is_empty());
        assert_eq!(out.code, None);
        assert_eq!(out.signal, None);

        let err = ExecResult::stderr_chunk("oops");
        assert!(err.stdout.is_empty());
        assert_eq!(err.stderr, "oops");
    }

    #[test]
    fn test_success_and_timed_out() {
        let ok = ExecResult {
            code: Some(0),
            ..ExecResult::default()
        };
        assert!(ok.success());
        assert!(!ok.timed_out());

        let timed_out = ExecResult {
            stderr: format!("partial\n{}", TIMEOUT_MARKER),
            ..ExecResult::default()
        };
        assert!(!timed_out.success());
        assert!(timed_out.timed_out());
    }

    #[test]
    fn test_exec_result_serializes_nulls() {
        let result = ExecResult::stdout_chunk("hi");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stdout"], "hi");
        assert!(json["code"].is_null());
        assert!(json["signal"].is_null());
    }

    // --- ExecOptions ---

    #[test]
    fn test_exec_options_builder() {
        let options = ExecOptions::new()
            .with_cwd("/tmp")
            .with_env("LANG", "C")
            .with_shell(true)
            .with_timeout(Duration::from_millis(500))
            .with_max_buffer(1024)
            .with_kill_signal(KillSignal::Kill);

        assert_eq!(options.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(options.env.get("LANG").map(String::as_str), Some("C"));
        assert!(options.shell);
        assert_eq!(options.timeout, Some(Duration::from_millis(500)));
        assert_eq!(options.max_buffer, Some(1024));
        assert_eq!(options.kill_signal, KillSignal::Kill);
    }

    #[test]
    fn test_exec_options_default_has_no_timeout() {
        let options = ExecOptions::default();
        assert!(options.cwd.is_none());
        assert!(options.env.is_empty());
        assert!(!options.shell);
        assert!(options.timeout.is_none());
        assert_eq!(options.kill_signal, KillSignal::Term);
    }
}
