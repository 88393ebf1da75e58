//! Process-communication core for the translation label editor.
//!
//! Two building blocks carry every background job the editor runs:
//!
//! - [`Channel`]: a closable async queue with an explicit end-of-stream flag
//!   and optional backpressure.
//! - [`execute`]: spawns an external command and streams its output through a
//!   channel, finishing with exactly one terminal result.
//!
//! [`from_vec`], [`to_vec`] and [`stream`] convert between channels and the
//! usual collection and stream types.

pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod process;

pub use channel::{Channel, ChannelMessage, from_vec, stream, to_vec};
pub use config::Config;
pub use error::{ChannelError, ConfigError, Error, Result};
pub use process::{ExecOptions, ExecResult, KillSignal, execute};
