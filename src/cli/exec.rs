//! `labelkit exec`: run a command and stream its output.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::channel::stream;
use crate::config::Config;
use crate::process::{ExecResult, KillSignal, execute};

/// Exit status reported when the command timed out.
const TIMEOUT_EXIT_CODE: i32 = 124;

#[derive(Args, Debug, Clone)]
pub struct ExecArgs {
    /// Working directory for the command
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Extra environment variable (KEY=VALUE, repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Run through the platform shell
    #[arg(long)]
    pub shell: bool,

    /// Kill the command after this many milliseconds (0 disables)
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Signal sent on timeout (e.g. SIGTERM, KILL, 9)
    #[arg(long, value_name = "SIGNAL")]
    pub kill_signal: Option<KillSignal>,

    /// Cap on captured bytes per stream in the final result
    #[arg(long, value_name = "BYTES")]
    pub max_buffer: Option<usize>,

    /// Print the final result as JSON instead of streaming output
    #[arg(long)]
    pub json: bool,

    /// Program to run
    pub command: String,

    /// Arguments passed to the program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Parse a `KEY=VALUE` pair.
pub fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Process exit status for a terminal result.
pub fn exit_code(result: &ExecResult) -> i32 {
    match result.code {
        Some(code) => code,
        None if result.timed_out() => TIMEOUT_EXIT_CODE,
        None => 1,
    }
}

/// Run the exec command, returning the exit status to report.
pub async fn run_exec_command(args: ExecArgs, config: &Config) -> anyhow::Result<i32> {
    let mut options = config.exec_options();
    if let Some(cwd) = args.cwd {
        options.cwd = Some(cwd);
    }
    options.env.extend(args.env);
    options.shell |= args.shell;
    if let Some(millis) = args.timeout_ms {
        options.timeout = (millis > 0).then(|| Duration::from_millis(millis));
    }
    if let Some(signal) = args.kill_signal {
        options.kill_signal = signal;
    }
    if args.max_buffer.is_some() {
        options.max_buffer = args.max_buffer;
    }

    tracing::debug!(command = %args.command, args = ?args.args, ?options, "Running command");

    let mut updates = std::pin::pin!(stream(execute(args.command, args.args, options)));
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    let mut last = ExecResult::default();

    while let Some(update) = updates.next().await {
        if update.is_sentinel() {
            tracing::debug!("channel closed without a final result");
            break;
        }
        let done = update.done;
        let Some(result) = update.into_data() else {
            continue;
        };
        if done {
            last = result;
            break;
        }
        if !args.json {
            if !result.stdout.is_empty() {
                stdout.write_all(result.stdout.as_bytes()).await?;
                stdout.flush().await?;
            }
            if !result.stderr.is_empty() {
                stderr.write_all(result.stderr.as_bytes()).await?;
                stderr.flush().await?;
            }
        }
    }

    if args.json {
        let rendered = serde_json::to_string_pretty(&last)?;
        stdout.write_all(rendered.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    } else if last.code.is_none() {
        // Spawn failures and timeouts never arrive as partial chunks.
        if let Some(line) = last.stderr.lines().last() {
            stderr.write_all(format!("{}\n", line).as_bytes()).await?;
            stderr.flush().await?;
        }
    }

    let code = exit_code(&last);
    tracing::debug!(code, signal = ?last.signal, "Command finished");
    Ok(code)
}
