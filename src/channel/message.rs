//! Message envelope carried by a channel.

/// A value received from a [`Channel`](super::Channel).
///
/// `data` is always `Some` for messages that were sent. The terminal sentinel
/// returned by a closed and drained channel has `data: None, done: true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage<T> {
    /// The payload, absent only on the terminal sentinel.
    pub data: Option<T>,
    /// Set on the message that ends the stream.
    pub done: bool,
}

impl<T> ChannelMessage<T> {
    /// Wrap a sent value.
    pub fn new(data: T, done: bool) -> Self {
        Self {
            data: Some(data),
            done,
        }
    }

    /// The sentinel returned once a channel has nothing left to deliver.
    pub fn terminal() -> Self {
        Self {
            data: None,
            done: true,
        }
    }

    /// Whether this is the payload-less sentinel rather than a sent value.
    pub fn is_sentinel(&self) -> bool {
        self.done && self.data.is_none()
    }

    /// Take the payload out of the envelope.
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}
