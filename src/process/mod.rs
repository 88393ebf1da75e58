//! Streamed execution of external commands.
//!
//! [`execute`] spawns a process and returns a [`Channel`](crate::channel::Channel)
//! of [`ExecResult`] updates: partial stdout/stderr chunks as they arrive,
//! then exactly one terminal message (`done = true`) with the cumulative
//! output and exit status. Spawn failures and timeouts are reported through
//! that same terminal message, never as errors.
//!
//! ```ignore
//! let channel = execute("rg", ["--files", "locales"], ExecOptions::default());
//! let mut updates = std::pin::pin!(stream(channel));
//! while let Some(update) = updates.next().await {
//!     // partial chunks, then the final result
//! }
//! ```

mod exec;
mod types;

pub use exec::execute;
pub use types::{ExecOptions, ExecResult, KillSignal, TIMEOUT_MARKER};
