//! Closable async message channels.
//!
//! A [`Channel`] is a FIFO queue shared between one producer context and one
//! consumer loop. Producers `send` values (optionally flagging the last one as
//! `done`), consumers `receive` [`ChannelMessage`]s until they observe `done`.
//!
//! ```text
//!   producer ──send──▶ ┌──────────────────────────┐ ──receive──▶ consumer
//!                      │ queue   (<= capacity)    │
//!   parked senders ◀── │ senders (FIFO waiters)   │
//!                      │ receivers (FIFO waiters) │ ──▶ parked receivers
//!                      └──────────────────────────┘
//! ```
//!
//! The [`util`] functions convert between channels, vectors and streams.

mod channel;
mod message;
pub mod util;

pub use channel::Channel;
pub(crate) use channel::Producer;
pub use message::ChannelMessage;
pub use util::{from_vec, stream, to_vec};
