//! # Worker Router
//!
//! Receiver side of the bridge. One pattern subscription per event name;
//! every request is handled on its own task and answered on the success or
//! failure channel for its token.

use crate::domain::error::{BridgeError, BridgeResult};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use serde_json::Value;
use shared_bus::{
    failure_channel, request_pattern, success_channel, validate_event_name, BrokerTransport,
    BusMessage, ChannelKind, ChannelName, Envelope, Failure, Subscription, SubscriptionId,
};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Message sent back when a handler panics.
pub const HANDLER_PANIC_MESSAGE: &str = "Internal worker error";

/// Domain logic for one event name.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, data: Value) -> Result<Value, Failure>;
}

/// Adapter returned by [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure as a [`RequestHandler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, Failure>> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> RequestHandler for HandlerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, Failure>> + Send + 'static,
{
    async fn handle(&self, data: Value) -> Result<Value, Failure> {
        (self.f)(data).await
    }
}

#[derive(Debug, Default)]
pub struct WorkerStats {
    pub total_handled: AtomicU64,
    pub total_failed: AtomicU64,
    pub total_panicked: AtomicU64,
    /// Requests dropped before reaching a handler
    pub total_rejected: AtomicU64,
}

struct Registration {
    subscription: SubscriptionId,
    task: JoinHandle<()>,
}

/// Registry of handlers keyed by event name.
pub struct WorkerRouter {
    transport: Arc<dyn BrokerTransport>,
    registrations: DashMap<String, Registration>,
    shutdown_tx: watch::Sender<bool>,
    stats: Arc<WorkerStats>,
}

impl WorkerRouter {
    pub fn new(transport: Arc<dyn BrokerTransport>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            transport,
            registrations: DashMap::new(),
            shutdown_tx,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    /// Subscribe to `eventName:request:*` and dispatch every request to
    /// `handler`.
    ///
    /// # Errors
    ///
    /// - `InvalidEventName` when the name contains reserved characters
    /// - `DuplicateHandler` when the event already has a handler
    /// - `Transport` when the subscription cannot be created
    pub async fn register_handler<H>(&self, event_name: &str, handler: H) -> BridgeResult<()>
    where
        H: RequestHandler,
    {
        validate_event_name(event_name)
            .map_err(|_| BridgeError::InvalidEventName(event_name.to_string()))?;

        if self.registrations.contains_key(event_name) {
            return Err(BridgeError::DuplicateHandler(event_name.to_string()));
        }

        let subscription = self.transport.subscribe(&request_pattern(event_name)).await?;
        let subscription_id = subscription.id();

        let rejected = match self.registrations.entry(event_name.to_string()) {
            Entry::Occupied(_) => Some(subscription),
            Entry::Vacant(vacant) => {
                let task = tokio::spawn(dispatch_loop(
                    self.transport.clone(),
                    event_name.to_string(),
                    Arc::new(handler),
                    subscription,
                    self.shutdown_tx.subscribe(),
                    self.stats.clone(),
                ));
                vacant.insert(Registration {
                    subscription: subscription_id,
                    task,
                });
                None
            }
        };

        // Lost a registration race; never await while holding the entry.
        if let Some(subscription) = rejected {
            drop(subscription);
            self.transport.unsubscribe(subscription_id).await?;
            return Err(BridgeError::DuplicateHandler(event_name.to_string()));
        }

        info!(event = event_name, "Registered request handler");
        Ok(())
    }

    pub fn is_registered(&self, event_name: &str) -> bool {
        self.registrations.contains_key(event_name)
    }

    pub fn registered_events(&self) -> Vec<String> {
        let mut events: Vec<String> = self
            .registrations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        events.sort();
        events
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Stop every dispatch loop and release its subscription.
    ///
    /// Requests already handed to a handler still publish their reply.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);

        let events: Vec<String> = self
            .registrations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for event_name in events {
            let Some((_, registration)) = self.registrations.remove(&event_name) else {
                continue;
            };
            if let Err(e) = self.transport.unsubscribe(registration.subscription).await {
                warn!(event = %event_name, error = %e, "Failed to release request subscription");
            }
            if let Err(e) = registration.task.await {
                warn!(event = %event_name, error = %e, "Dispatch loop ended abnormally");
            }
        }

        info!("Worker router stopped");
    }
}

async fn dispatch_loop(
    transport: Arc<dyn BrokerTransport>,
    event_name: String,
    handler: Arc<dyn RequestHandler>,
    mut requests: Subscription,
    mut shutdown: watch::Receiver<bool>,
    stats: Arc<WorkerStats>,
) {
    debug!(event = %event_name, pattern = %requests.pattern(), "Dispatch loop started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            message = requests.recv() => match message {
                Some(message) => {
                    // No ordering between requests of one event.
                    tokio::spawn(process(
                        transport.clone(),
                        event_name.clone(),
                        handler.clone(),
                        message,
                        stats.clone(),
                    ));
                }
                None => {
                    debug!(event = %event_name, "Request subscription closed");
                    break;
                }
            },
        }
    }
}

/// Handle one request and publish its reply.
async fn process(
    transport: Arc<dyn BrokerTransport>,
    event_name: String,
    handler: Arc<dyn RequestHandler>,
    message: BusMessage,
    stats: Arc<WorkerStats>,
) {
    let Some(envelope) = accept_request(&event_name, &message) else {
        stats.total_rejected.fetch_add(1, Ordering::Relaxed);
        return;
    };
    let token = envelope.token;

    debug!(token = %token, event = %event_name, "Handling request");

    let outcome = AssertUnwindSafe(handler.handle(envelope.data))
        .catch_unwind()
        .await;

    let (channel, reply) = match outcome {
        Ok(Ok(data)) => {
            stats.total_handled.fetch_add(1, Ordering::Relaxed);
            (
                success_channel(&event_name, &token),
                Envelope::new(token.clone(), event_name.as_str(), data),
            )
        }
        Ok(Err(failure)) => {
            stats.total_failed.fetch_add(1, Ordering::Relaxed);
            debug!(token = %token, event = %event_name, failure = %failure, "Handler failed");
            (
                failure_channel(&event_name, &token),
                Envelope::failure(token.clone(), event_name.as_str(), &failure),
            )
        }
        Err(_) => {
            stats.total_panicked.fetch_add(1, Ordering::Relaxed);
            error!(token = %token, event = %event_name, "Handler panicked");
            (
                failure_channel(&event_name, &token),
                Envelope::failure(
                    token.clone(),
                    event_name.as_str(),
                    &Failure::internal(HANDLER_PANIC_MESSAGE),
                ),
            )
        }
    };

    let payload = match reply.encode() {
        Ok(payload) => payload,
        Err(e) => {
            error!(token = %token, event = %event_name, error = %e, "Failed to encode reply");
            return;
        }
    };

    if let Err(e) = transport.publish(&channel, payload).await {
        warn!(token = %token, channel = %channel, error = %e, "Failed to publish reply");
    }
}

/// Validate a request's channel and envelope. Anything off-protocol is
/// logged and dropped.
fn accept_request(event_name: &str, message: &BusMessage) -> Option<Envelope> {
    let channel = match ChannelName::parse(&message.channel) {
        Some(channel) if channel.kind == ChannelKind::Request && channel.event_name == event_name => {
            channel
        }
        _ => {
            warn!(event = event_name, channel = %message.channel, "Unexpected request channel");
            return None;
        }
    };

    let envelope = match Envelope::decode(&message.payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(
                event = event_name,
                channel = %message.channel,
                error = %e,
                "Malformed request envelope dropped"
            );
            return None;
        }
    };

    if envelope.token != channel.token || envelope.event_name != event_name {
        warn!(
            event = event_name,
            channel = %message.channel,
            token = %envelope.token,
            "Request envelope does not match its channel"
        );
        return None;
    }

    Some(envelope)
}
