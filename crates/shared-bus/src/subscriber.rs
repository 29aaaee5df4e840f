//! # Subscriptions
//!
//! Receiving side of the transport. A `Subscription` is a lazy stream of
//! `(channel, payload)` messages that ends once the subscription is released.

use crate::channel::ChannelPattern;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The subscription was released or the broker closed.
    #[error("subscription closed")]
    Closed,
}

/// Handle identifying one subscription on a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One message as seen by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Concrete channel the message was published on.
    pub channel: String,
    /// Raw payload (a JSON envelope for bridge traffic).
    pub payload: String,
}

/// Callback a transport installs to deregister a dropped subscription.
pub type ReleaseHook = Arc<dyn Fn(SubscriptionId) + Send + Sync>;

/// A subscription handle for receiving messages.
///
/// When dropped, the subscription is removed from its transport.
pub struct Subscription {
    id: SubscriptionId,
    pattern: ChannelPattern,
    receiver: mpsc::Receiver<BusMessage>,
    release: Option<ReleaseHook>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        pattern: ChannelPattern,
        receiver: mpsc::Receiver<BusMessage>,
        release: Option<ReleaseHook>,
    ) -> Self {
        Self {
            id,
            pattern,
            receiver,
            release,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn pattern(&self) -> &ChannelPattern {
        &self.pattern
    }

    /// Receive the next message.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next matching message
    /// - `None` - The subscription was released or the broker closed
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.receiver.recv().await
    }

    /// Try to receive the next message without waiting.
    pub fn try_recv(&mut self) -> Result<Option<BusMessage>, SubscriptionError> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.id);
        }
        debug!(subscription = %self.id, pattern = %self.pattern, "Subscription dropped");
    }
}

impl Stream for Subscription {
    type Item = BusMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
