//! # Broker Transport
//!
//! The transport contract consumed by the bridge, plus an in-process broker.

use crate::channel::{ChannelPattern, WILDCARD};
use crate::subscriber::{BusMessage, ReleaseHook, Subscription, SubscriptionId};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Errors raised by transport operations themselves.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The broker connection was closed.
    #[error("broker closed")]
    Closed,

    /// Channel or pattern is not usable.
    #[error("invalid channel: {0}")]
    InvalidChannel(String),
}

/// Publish/subscribe transport shared by every request and handler.
///
/// All three operations must be safe to call concurrently over one connection.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Publish a payload to a concrete channel.
    ///
    /// # Returns
    ///
    /// The number of subscriptions the message was handed to.
    async fn publish(&self, channel: &str, payload: String) -> Result<usize, TransportError>;

    /// Subscribe to an exact channel or a `*` pattern.
    async fn subscribe(&self, pattern: &str) -> Result<Subscription, TransportError>;

    /// Release a subscription. Unknown ids are ignored.
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TransportError>;
}

struct Route {
    pattern: ChannelPattern,
    sender: mpsc::Sender<BusMessage>,
}

struct BrokerInner {
    routes: DashMap<SubscriptionId, Route>,
    next_id: AtomicU64,
    closed: AtomicBool,
    published: AtomicU64,
    dropped: AtomicU64,
    capacity: usize,
}

/// In-process broker.
///
/// Each subscription owns a bounded queue; `publish` walks the route table and
/// hands a copy to every matching subscription. A full queue drops the message
/// for that subscriber only.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// Create a broker with default per-subscription capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a broker with the given per-subscription capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                routes: DashMap::new(),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Close the broker. Every open subscription stream ends and further
    /// operations fail with [`TransportError::Closed`].
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.routes.clear();
        debug!("Broker closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.routes.len()
    }

    /// Total publish calls that reached the route table.
    pub fn messages_published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Messages lost to full subscriber queues.
    pub fn messages_dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    fn release_hook(&self) -> ReleaseHook {
        let weak: Weak<BrokerInner> = Arc::downgrade(&self.inner);
        Arc::new(move |id| {
            if let Some(inner) = weak.upgrade() {
                inner.routes.remove(&id);
            }
        })
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerTransport for InMemoryBroker {
    async fn publish(&self, channel: &str, payload: String) -> Result<usize, TransportError> {
        self.ensure_open()?;
        if channel.is_empty() || channel.contains(WILDCARD) {
            return Err(TransportError::InvalidChannel(format!(
                "cannot publish to '{channel}'"
            )));
        }

        self.inner.published.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        let mut stale = Vec::new();

        for route in self.inner.routes.iter() {
            if !route.pattern.matches(channel) {
                continue;
            }
            let message = BusMessage {
                channel: channel.to_string(),
                payload: payload.clone(),
            };
            match route.sender.try_send(message) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        channel = channel,
                        subscription = %route.key(),
                        "Subscriber queue full, message dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => stale.push(*route.key()),
            }
        }

        // Route iteration holds shard locks; removal has to wait until it ends.
        for id in stale {
            self.inner.routes.remove(&id);
        }

        if delivered == 0 {
            debug!(channel = channel, "Message published with no receivers");
        } else {
            debug!(channel = channel, receivers = delivered, "Message published");
        }

        Ok(delivered)
    }

    async fn subscribe(&self, pattern: &str) -> Result<Subscription, TransportError> {
        self.ensure_open()?;
        let pattern = ChannelPattern::new(pattern)?;

        let id = SubscriptionId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.inner.capacity);

        self.inner.routes.insert(
            id,
            Route {
                pattern: pattern.clone(),
                sender,
            },
        );

        debug!(subscription = %id, pattern = %pattern, "New subscription created");

        Ok(Subscription::new(
            id,
            pattern,
            receiver,
            Some(self.release_hook()),
        ))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TransportError> {
        if self.inner.routes.remove(&id).is_some() {
            debug!(subscription = %id, "Unsubscribed");
        }
        Ok(())
    }
}
