//! Conversions between channels, vectors and streams.

use futures::Stream;

use super::{Channel, ChannelMessage};

/// Build a closed channel that yields `values` in order.
///
/// The channel's capacity equals the number of values, so every value is
/// queued up front; only the last one carries `done = true`. An empty input
/// gives a closed channel whose first `receive()` is the terminal sentinel.
pub fn from_vec<T>(values: Vec<T>) -> Channel<T> {
    let channel = Channel::new(values.len());
    let last = values.len().saturating_sub(1);
    for (index, value) in values.into_iter().enumerate() {
        if let Err(err) = channel.try_send(value, index == last) {
            tracing::warn!(index, error = %err, "failed to queue value");
        }
    }
    channel.close();
    channel
}

/// Drain a channel into a vector.
///
/// Stops after the first `done` message, keeping its payload. The terminal
/// sentinel of a closed channel contributes nothing, so draining a channel
/// that never received a value yields an empty vector.
pub async fn to_vec<T>(channel: &Channel<T>) -> Vec<T> {
    let mut values = Vec::new();
    loop {
        let message = channel.receive().await;
        let done = message.done;
        values.extend(message.into_data());
        if done {
            return values;
        }
    }
}

/// Expose a channel as a lazy stream of messages.
///
/// The stream yields every received message and ends right after the first
/// one with `done` set. Each call returns an independent stream over the
/// same channel.
pub fn stream<T>(channel: Channel<T>) -> impl Stream<Item = ChannelMessage<T>> {
    futures::stream::unfold(Some(channel), |channel| async move {
        let Some(channel) = channel else {
            return None;
        };
        let message = channel.receive().await;
        let next = if message.done { None } else { Some(channel) };
        Some((message, next))
    })
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_from_vec_round_trip() {
        let values = vec!["alpha", "beta", "gamma", "delta"];
        let channel = from_vec(values.clone());
        assert_eq!(to_vec(&channel).await, values);
    }

    #[tokio::test]
    async fn test_from_vec_marks_only_last_done() {
        let channel = from_vec(vec![1, 2, 3]);
        assert!(channel.is_closed());
        assert_eq!(channel.capacity(), 3);

        assert_eq!(channel.receive().await, ChannelMessage::new(1, false));
        assert_eq!(channel.receive().await, ChannelMessage::new(2, false));
        assert_eq!(channel.receive().await, ChannelMessage::new(3, true));
        assert_eq!(channel.receive().await, ChannelMessage::terminal());
    }

    #[tokio::test]
    async fn test_from_empty_vec_is_closed() {
        let channel = from_vec(Vec::<u32>::new());
        assert!(channel.is_closed());
        assert_eq!(channel.receive().await, ChannelMessage::terminal());
    }

    #[tokio::test]
    async fn test_to_vec_after_sends() {
        let channel = Channel::unbounded();
        channel.send(1, false).await.unwrap();
        channel.send(2, false).await.unwrap();
        channel.send(3, true).await.unwrap();

        assert_eq!(to_vec(&channel).await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_to_vec_on_closed_empty_channel() {
        let channel = Channel::<String>::unbounded();
        channel.close();
        assert!(to_vec(&channel).await.is_empty());
    }

    #[tokio::test]
    async fn test_to_vec_stops_at_close_without_done() {
        let channel = Channel::unbounded();
        channel.send('x', false).await.unwrap();
        channel.close();
        assert_eq!(to_vec(&channel).await, vec!['x']);
    }

    #[tokio::test]
    async fn test_to_vec_waits_for_producer() {
        let channel = Channel::new(1);
        let producer = {
            let channel = channel.clone();
            tokio::spawn(async move {
                for value in 0..10 {
                    channel.send(value, value == 9).await.unwrap();
                }
            })
        };

        assert_eq!(to_vec(&channel).await, (0..10).collect::<Vec<_>>());
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn test_stream_ends_after_done() {
        let channel = from_vec(vec!["a", "b"]);
        let messages: Vec<_> = stream(channel.clone()).collect().await;

        assert_eq!(
            messages,
            vec![ChannelMessage::new("a", false), ChannelMessage::new("b", true)]
        );
        // A fresh stream over a finished channel yields only the sentinel.
        let rest: Vec<_> = stream(channel).collect().await;
        assert_eq!(rest, vec![ChannelMessage::terminal()]);
    }

    #[tokio::test]
    async fn test_stream_yields_sentinel_when_closed_without_done() {
        let channel = Channel::unbounded();
        channel.send(10, false).await.unwrap();
        channel.close();

        let messages: Vec<_> = stream(channel).collect().await;
        assert_eq!(
            messages,
            vec![ChannelMessage::new(10, false), ChannelMessage::terminal()]
        );
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let channel = from_vec(vec![1, 2, 3]);
        let mut messages = std::pin::pin!(stream(channel.clone()));

        assert_eq!(messages.next().await, Some(ChannelMessage::new(1, false)));
        // Nothing beyond the first message has been pulled yet.
        assert_eq!(channel.len(), 2);
        assert_eq!(messages.next().await, Some(ChannelMessage::new(2, false)));
        assert_eq!(messages.next().await, Some(ChannelMessage::new(3, true)));
        assert_eq!(messages.next().await, None);
    }
}
