//! Channel implementation with explicit waiter queues.
//!
//! All state lives behind one `parking_lot::Mutex` that is only held for
//! short, non-async sections. Suspended senders and receivers park on their
//! own `oneshot` receiver, stored in FIFO order, and are woken by the
//! complementary operation or by `close()`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::message::ChannelMessage;
use crate::error::ChannelError;

/// A sender parked until the queue has room for its message.
struct PendingSend<T> {
    message: ChannelMessage<T>,
    admitted: oneshot::Sender<Result<(), ChannelError>>,
}

struct State<T> {
    queue: VecDeque<ChannelMessage<T>>,
    receivers: VecDeque<oneshot::Sender<ChannelMessage<T>>>,
    senders: VecDeque<PendingSend<T>>,
    closed: bool,
}

impl<T> State<T> {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            receivers: VecDeque::new(),
            senders: VecDeque::new(),
            closed: false,
        }
    }

    fn has_room(&self, capacity: usize) -> bool {
        capacity == 0 || (self.queue.len() < capacity && self.senders.is_empty())
    }

    /// Give `message` to the oldest parked receiver still listening.
    ///
    /// Returns the message back when nobody took it.
    fn hand_off(&mut self, mut message: ChannelMessage<T>) -> Option<ChannelMessage<T>> {
        let done = message.done;
        while let Some(receiver) = self.receivers.pop_front() {
            match receiver.send(message) {
                Ok(()) => {
                    if done {
                        self.shutdown(true);
                    }
                    return None;
                }
                Err(returned) => message = returned,
            }
        }
        Some(message)
    }

    /// Move parked senders into the queue while there is room.
    fn admit_senders(&mut self, capacity: usize) {
        while capacity == 0 || self.queue.len() < capacity {
            let Some(pending) = self.senders.pop_front() else {
                break;
            };
            // A send future dropped while parked refuses the admission, and
            // its message is withdrawn.
            if pending.admitted.send(Ok(())).is_ok() {
                self.queue.push_back(pending.message);
            }
        }
    }

    /// Put back a message whose receiver went away before reading it.
    fn requeue(&mut self, message: ChannelMessage<T>) {
        if let Some(message) = self.hand_off(message) {
            self.queue.push_front(message);
        }
    }

    /// Enter the closed state, waking every parked task.
    ///
    /// With `discard` set, anything still queued is dropped; used once a
    /// `done` message has been delivered.
    fn shutdown(&mut self, discard: bool) {
        self.closed = true;
        for receiver in self.receivers.drain(..) {
            let _ = receiver.send(ChannelMessage::terminal());
        }
        for pending in self.senders.drain(..) {
            let _ = pending.admitted.send(Err(ChannelError::Closed));
        }
        if discard && !self.queue.is_empty() {
            tracing::trace!(
                dropped = self.queue.len(),
                "discarding messages queued after done"
            );
            self.queue.clear();
        }
    }
}

struct Shared<T> {
    capacity: usize,
    state: Mutex<State<T>>,
}

impl<T> Shared<T> {
    async fn send(&self, value: T, done: bool) -> Result<(), ChannelError> {
        let admitted = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(ChannelError::Closed);
            }

            let Some(message) = state.hand_off(ChannelMessage::new(value, done)) else {
                return Ok(());
            };
            if state.has_room(self.capacity) {
                state.queue.push_back(message);
                return Ok(());
            }

            let (tx, rx) = oneshot::channel();
            state.senders.push_back(PendingSend {
                message,
                admitted: tx,
            });
            rx
        };

        admitted.await.unwrap_or(Err(ChannelError::Closed))
    }

    fn try_send(&self, value: T, done: bool) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ChannelError::Closed);
        }

        let Some(message) = state.hand_off(ChannelMessage::new(value, done)) else {
            return Ok(());
        };
        if !state.has_room(self.capacity) {
            return Err(ChannelError::Full {
                capacity: self.capacity,
            });
        }
        state.queue.push_back(message);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            tracing::trace!(queued = state.queue.len(), "closing channel");
        }
        state.shutdown(false);
    }
}

/// Closes the channel once the last [`Channel`] handle is dropped.
struct Handle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// A closable, optionally bounded async queue.
///
/// Cloning a `Channel` yields another handle to the same queue, so a producer
/// task and a consumer task can each own one. Dropping the last handle closes
/// the channel, so background producers stop as soon as nobody is listening.
///
/// # Capacity
///
/// A capacity of `k > 0` lets up to `k` messages wait in the queue; a further
/// `send` suspends until a `receive` frees a slot. A capacity of `0` means
/// **unbounded eager buffering**: `send` never suspends. This is not a
/// rendezvous channel; a zero-capacity send completes without a matching
/// receive.
///
/// # Completion
///
/// Once a message sent with `done = true` has been received, the channel is
/// closed, anything queued behind it is discarded, and every later
/// `receive()` returns [`ChannelMessage::terminal`] without blocking.
pub struct Channel<T> {
    handle: Arc<Handle<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
        }
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared();
        let state = shared.state.lock();
        f.debug_struct("Channel")
            .field("capacity", &shared.capacity)
            .field("queued", &state.queue.len())
            .field("parked_senders", &state.senders.len())
            .field("parked_receivers", &state.receivers.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T> Channel<T> {
    /// Create a channel holding at most `capacity` queued messages.
    ///
    /// `0` selects unbounded buffering (see the type-level docs).
    pub fn new(capacity: usize) -> Self {
        let shared = Arc::new(Shared {
            capacity,
            state: Mutex::new(State::new()),
        });
        Self {
            handle: Arc::new(Handle { shared }),
        }
    }

    /// Create a channel whose `send` never suspends.
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    fn shared(&self) -> &Shared<T> {
        &self.handle.shared
    }

    /// A send-only handle that does not keep the channel open.
    pub(crate) fn producer(&self) -> Producer<T> {
        Producer {
            shared: Arc::clone(&self.handle.shared),
        }
    }

    /// The configured capacity; `0` means unbounded.
    pub fn capacity(&self) -> usize {
        self.shared().capacity
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.shared().state.lock().queue.len()
    }

    /// Whether no messages are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `close()` has been called or a `done` message delivered.
    pub fn is_closed(&self) -> bool {
        self.shared().is_closed()
    }

    /// Send a value, suspending while the queue is at capacity.
    ///
    /// Parked senders are admitted in the order they parked. Fails with
    /// [`ChannelError::Closed`] if the channel is closed before the value is
    /// queued; the channel stays usable for draining.
    ///
    /// Dropping the returned future while it is parked withdraws the value.
    pub async fn send(&self, value: T, done: bool) -> Result<(), ChannelError> {
        self.shared().send(value, done).await
    }

    /// Send a value without waiting.
    ///
    /// Fails with [`ChannelError::Full`] when the queue is at capacity; the
    /// value is dropped in that case.
    pub fn try_send(&self, value: T, done: bool) -> Result<(), ChannelError> {
        self.shared().try_send(value, done)
    }

    /// Receive the next message.
    ///
    /// Suspends only while the queue is empty and the channel is open. A
    /// closed, drained channel returns [`ChannelMessage::terminal`].
    ///
    /// Cancel safe: if the future is dropped after a message was handed to it
    /// but before it was returned, the message goes back to the front of the
    /// queue.
    pub async fn receive(&self) -> ChannelMessage<T> {
        let shared = self.shared();
        let rx = {
            let mut state = shared.state.lock();
            if let Some(message) = state.queue.pop_front() {
                if message.done {
                    state.shutdown(true);
                } else {
                    state.admit_senders(shared.capacity);
                }
                return message;
            }
            if state.closed {
                return ChannelMessage::terminal();
            }

            let (tx, rx) = oneshot::channel();
            state.receivers.push_back(tx);
            rx
        };

        let mut waiter = ReceiveWaiter {
            shared,
            rx: Some(rx),
        };
        waiter.wait().await
    }

    /// Close the channel.
    ///
    /// Idempotent. Parked receivers get the terminal sentinel, parked senders
    /// fail with [`ChannelError::Closed`]. Messages already queued can still
    /// be received.
    pub fn close(&self) {
        self.shared().close();
    }
}

/// Send side of a [`Channel`] used by background producers.
///
/// Unlike a `Channel` clone it does not count as a consumer: once every
/// `Channel` handle is gone the channel closes and `send` fails with
/// [`ChannelError::Closed`].
pub(crate) struct Producer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Producer<T> {
    pub(crate) async fn send(&self, value: T, done: bool) -> Result<(), ChannelError> {
        self.shared.send(value, done).await
    }

    pub(crate) fn close(&self) {
        self.shared.close();
    }
}

/// A parked `receive()` call.
///
/// Dropping it with a delivered but unread message requeues that message.
struct ReceiveWaiter<'a, T> {
    shared: &'a Shared<T>,
    rx: Option<oneshot::Receiver<ChannelMessage<T>>>,
}

impl<T> ReceiveWaiter<'_, T> {
    async fn wait(&mut self) -> ChannelMessage<T> {
        let Some(rx) = self.rx.as_mut() else {
            return ChannelMessage::terminal();
        };
        let received = rx.await;
        self.rx = None;
        // The sender half only disappears with the channel state itself.
        received.unwrap_or_else(|_| ChannelMessage::terminal())
    }
}

impl<T> Drop for ReceiveWaiter<'_, T> {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        let mut state = self.shared.state.lock();
        rx.close();
        if let Ok(message) = rx.try_recv() {
            state.requeue(message);
        }
    }
}
