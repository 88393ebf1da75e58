//! Bridge from a child process to a channel of execution updates.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinSet;

use super::types::{ExecOptions, ExecResult, KillSignal, TIMEOUT_MARKER};
use crate::channel::{Channel, Producer};

/// The bridge is the only producer, so one outstanding update is enough.
const BRIDGE_CAPACITY: usize = 1;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// How long a timed-out process gets to exit before it is force-killed.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Run `command` and stream its output into a channel.
///
/// Returns immediately; the process is spawned on a Tokio task, so this must
/// be called from within a Tokio runtime. The channel receives partial
/// stdout/stderr chunks, then exactly one `done` message with the cumulative
/// output and exit status, and is closed afterwards.
///
/// Nothing is returned as an error: a failed spawn or an elapsed timeout is
/// reported in the terminal message's `stderr` with `code` and `signal` unset.
///
/// Dropping every handle to the returned channel closes it. The process then
/// runs to completion with its output discarded.
pub fn execute<I, S>(
    command: impl Into<String>,
    args: I,
    options: ExecOptions,
) -> Channel<ExecResult>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let command = command.into();
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let channel = Channel::new(BRIDGE_CAPACITY);

    let bridge = Bridge {
        channel: channel.producer(),
        latch: TerminalLatch::default(),
    };
    tokio::spawn(bridge.run(command, args, options));

    channel
}

/// Guards the single terminal message.
#[derive(Debug, Default)]
struct TerminalLatch(AtomicBool);

impl TerminalLatch {
    /// Returns `true` for the first caller only.
    fn claim(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pipe {
    Stdout,
    Stderr,
}

/// Output kept for the terminal message.
#[derive(Debug)]
struct Capture {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    limit: Option<usize>,
    truncated: bool,
}

impl Capture {
    fn new(limit: Option<usize>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn append(&mut self, pipe: Pipe, chunk: &[u8]) {
        let target = match pipe {
            Pipe::Stdout => &mut self.stdout,
            Pipe::Stderr => &mut self.stderr,
        };
        let room = self
            .limit
            .map_or(chunk.len(), |limit| limit.saturating_sub(target.len()));
        let keep = room.min(chunk.len());
        target.extend_from_slice(&chunk[..keep]);

        if keep < chunk.len() && !self.truncated {
            self.truncated = true;
            tracing::debug!(?pipe, limit = ?self.limit, "captured output truncated");
        }
    }

    fn snapshot(&self) -> ExecResult {
        ExecResult {
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            code: None,
            signal: None,
        }
    }
}

struct Bridge {
    channel: Producer<ExecResult>,
    latch: TerminalLatch,
}

impl Bridge {
    async fn run(self, command: String, args: Vec<String>, options: ExecOptions) {
        let mut child = match build_command(&command, &args, &options).spawn() {
            Ok(child) => child,
            Err(err) => {
                tracing::debug!(command = %command, error = %err, "failed to spawn process");
                let mut result = ExecResult::default();
                append_line(&mut result.stderr, &format!("{}: {}", command, err));
                self.finish(result).await;
                return;
            }
        };

        let pid = child.id();
        tracing::debug!(command = %command, ?pid, "spawned process");

        let capture = Arc::new(Mutex::new(Capture::new(options.max_buffer)));
        let mut pumps = JoinSet::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.spawn(pump(
                stdout,
                Pipe::Stdout,
                self.channel.clone(),
                Arc::clone(&capture),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.spawn(pump(
                stderr,
                Pipe::Stderr,
                self.channel.clone(),
                Arc::clone(&capture),
            ));
        }

        let exit = tokio::select! {
            biased;
            status = wait_for_exit(&mut child, &mut pumps) => Some(status),
            () = deadline(options.timeout) => None,
        };

        match exit {
            Some(status) => {
                let mut result = capture.lock().snapshot();
                match status {
                    Ok(status) => {
                        result.code = status.code();
                        result.signal = exit_signal(&status);
                    }
                    Err(err) => {
                        let reason = format!("failed to wait for process: {}", err);
                        append_line(&mut result.stderr, &reason);
                    }
                }
                tracing::debug!(
                    command = %command,
                    code = ?result.code,
                    signal = ?result.signal,
                    "process exited"
                );
                self.finish(result).await;
            }
            None => {
                tracing::debug!(
                    command = %command,
                    ?pid,
                    signal = %options.kill_signal,
                    "process timed out, terminating"
                );
                terminate(&mut child, options.kill_signal);
                pumps.shutdown().await;

                let mut result = capture.lock().snapshot();
                append_line(&mut result.stderr, TIMEOUT_MARKER);
                self.finish(result).await;

                reap(child).await;
            }
        }
    }

    /// Send the terminal message and close the channel, once.
    async fn finish(&self, result: ExecResult) {
        if !self.latch.claim() {
            tracing::trace!("terminal message already sent");
            return;
        }
        if let Err(err) = self.channel.send(result, true).await {
            tracing::debug!(error = %err, "terminal message not delivered");
        }
        self.channel.close();
    }
}

fn build_command(command: &str, args: &[String], options: &ExecOptions) -> Command {
    let mut cmd = if options.shell {
        let line = std::iter::once(command)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        let (program, flag) = shell_program();
        let mut cmd = Command::new(program);
        cmd.arg(flag).arg(line);
        cmd
    } else {
        let mut cmd = Command::new(command);
        cmd.args(args);
        cmd
    };

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    cmd.envs(&options.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

#[cfg(not(windows))]
fn shell_program() -> (&'static str, &'static str) {
    ("sh", "-c")
}

#[cfg(windows)]
fn shell_program() -> (&'static str, &'static str) {
    ("cmd", "/C")
}

/// Forward one output stream into the channel until end-of-stream.
///
/// Keeps reading after the consumer closes the channel so the child never
/// blocks on a full pipe. A multi-byte character split across reads is held
/// back until its remaining bytes arrive.
async fn pump<R>(
    mut reader: R,
    pipe: Pipe,
    channel: Producer<ExecResult>,
    capture: Arc<Mutex<Capture>>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut pending = Vec::new();
    let mut forwarding = true;
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                tracing::debug!(?pipe, error = %err, "failed to read process output");
                break;
            }
        };
        let chunk = &buf[..n];
        capture.lock().append(pipe, chunk);

        if !forwarding {
            continue;
        }
        pending.extend_from_slice(chunk);
        let complete = complete_utf8_len(&pending);
        if complete == 0 {
            continue;
        }
        let text = String::from_utf8_lossy(&pending[..complete]).into_owned();
        pending.drain(..complete);
        forwarding = forward(&channel, pipe, text).await;
    }

    if forwarding && !pending.is_empty() {
        let text = String::from_utf8_lossy(&pending).into_owned();
        forward(&channel, pipe, text).await;
    }
}

/// Send one partial update; returns `false` once the channel is closed.
async fn forward(channel: &Producer<ExecResult>, pipe: Pipe, text: String) -> bool {
    let update = match pipe {
        Pipe::Stdout => ExecResult::stdout_chunk(text),
        Pipe::Stderr => ExecResult::stderr_chunk(text),
    };
    if channel.send(update, false).await.is_err() {
        tracing::trace!(?pipe, "channel closed, no longer forwarding output");
        return false;
    }
    true
}

/// Length of `bytes` without a trailing, still incomplete UTF-8 sequence.
fn complete_utf8_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { len - back } else { len };
    }
    len
}

/// Wait for the process to exit and for both pumps to drain its output.
async fn wait_for_exit(child: &mut Child, pumps: &mut JoinSet<()>) -> io::Result<ExitStatus> {
    let status = child.wait().await;
    while let Some(joined) = pumps.join_next().await {
        if let Err(err) = joined {
            tracing::debug!(error = %err, "output pump ended abnormally");
        }
    }
    status
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

fn terminate(child: &mut Child, signal: KillSignal) {
    if let Some(pid) = child.id() {
        match deliver_signal(pid, signal) {
            Ok(()) => return,
            Err(err) => {
                tracing::warn!(
                    pid,
                    signal = %signal,
                    error = %err,
                    "failed to signal process, killing it"
                );
            }
        }
    }
    if let Err(err) = child.start_kill() {
        tracing::debug!(error = %err, "failed to kill process");
    }
}

#[cfg(unix)]
fn deliver_signal(pid: u32, signal: KillSignal) -> io::Result<()> {
    // SAFETY: kill(2) only reads its arguments; the pid belongs to a child
    // that has not been reaped yet.
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal.number()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn deliver_signal(_pid: u32, _signal: KillSignal) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signals are not supported on this platform",
    ))
}

/// Collect a terminated child so it does not linger as a zombie.
async fn reap(mut child: Child) {
    match tokio::time::timeout(KILL_GRACE, child.wait()).await {
        Ok(Ok(status)) => tracing::trace!(?status, "timed-out process reaped"),
        Ok(Err(err)) => tracing::debug!(error = %err, "failed to reap timed-out process"),
        Err(_) => {
            tracing::warn!(
                grace = ?KILL_GRACE,
                "process ignored kill signal, forcing kill"
            );
            if let Err(err) = child.kill().await {
                tracing::warn!(error = %err, "failed to force-kill process");
            }
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    status
        .signal()
        .map(|number| KillSignal::from_number(number).to_string())
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<String> {
    None
}

fn append_line(buffer: &mut String, line: &str) {
    if !buffer.is_empty() && !buffer.ends_with('\n') {
        buffer.push('\n');
    }
    buffer.push_str(line);
}
