//! # Request Gateway
//!
//! Sender side of the bridge. Turns publish/subscribe into a call that
//! resolves exactly once with the handler's data, its failure, or a timeout.
//!
//! ## Ordering
//!
//! ```text
//! mint token → create table entry → subscribe success/failed
//!            → publish request → await slot until deadline
//! ```
//!
//! Reply channels are subscribed before the request is published, so a
//! worker that answers immediately can never beat the subscription.

use crate::domain::config::BridgeConfig;
use crate::domain::error::{BridgeError, BridgeResult};
use crate::domain::pending::{CorrelationTable, Settlement};
use crate::domain::token::RequestToken;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use shared_bus::{
    failure_channel, request_channel, success_channel, validate_event_name, BrokerTransport,
    BusMessage, ChannelKind, ChannelName, Envelope, Failure, Subscription, SubscriptionId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Per-call options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// When false the request is published and the call returns at once.
    pub expects_response: bool,
    /// Overrides the gateway's default timeout.
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::expect_response()
    }
}

impl RequestOptions {
    pub fn expect_response() -> Self {
        Self {
            expects_response: true,
            timeout: None,
        }
    }

    pub fn fire_and_forget() -> Self {
        Self {
            expects_response: false,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Sender-side API over a shared transport.
pub struct RequestGateway {
    transport: Arc<dyn BrokerTransport>,
    table: Arc<CorrelationTable>,
    default_timeout: Duration,
}

impl RequestGateway {
    pub fn new(transport: Arc<dyn BrokerTransport>, default_timeout: Duration) -> Self {
        Self {
            transport,
            table: Arc::new(CorrelationTable::new()),
            default_timeout,
        }
    }

    pub fn from_config(transport: Arc<dyn BrokerTransport>, config: &BridgeConfig) -> Self {
        Self::new(transport, config.default_timeout())
    }

    pub fn table(&self) -> &Arc<CorrelationTable> {
        &self.table
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Publish a request and, unless told otherwise, wait for its reply.
    ///
    /// # Errors
    ///
    /// - `Failed` with the handler's `{message, errorCode}`
    /// - `Timeout` (504) when no reply arrives before the deadline
    /// - `Transport` when subscribe or publish fails
    pub async fn send_request(
        &self,
        event_name: &str,
        data: Value,
        options: RequestOptions,
    ) -> BridgeResult<Value> {
        validate_event_name(event_name)
            .map_err(|_| BridgeError::InvalidEventName(event_name.to_string()))?;

        if !options.expects_response {
            return self.publish_only(event_name, data).await;
        }

        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let token = RequestToken::new();
        let request = Envelope::new(token.to_string(), event_name, data).encode()?;

        let deadline = Instant::now() + timeout;
        let mut slot = self.table.create(token, event_name, deadline)?;
        let mut guard = PendingGuard::new(self.table.clone(), self.transport.clone(), token);

        let (success, failed) = self.subscribe_replies(event_name, token).await?;
        let ids = vec![success.id(), failed.id()];

        match self.table.attach(&token, ids) {
            Ok(()) => {
                guard.listener = Some(tokio::spawn(listen_for_reply(
                    self.table.clone(),
                    self.transport.clone(),
                    token,
                    success,
                    failed,
                )));
            }
            // Already timed out by the sweeper; nobody else owns these now.
            Err(ids) => {
                drop((success, failed));
                release(self.transport.as_ref(), ids).await;
            }
        }

        let channel = request_channel(event_name, token);
        let receivers = self.transport.publish(&channel, request).await?;
        if receivers == 0 {
            debug!(token = %token, event = event_name, "Request published with no worker listening");
        }

        let outcome = match tokio::time::timeout_at(deadline, &mut slot).await {
            Ok(outcome) => outcome,
            Err(_) => {
                if let Some(settled) = self.table.try_settle(&token, Settlement::Timeout) {
                    warn!(
                        token = %token,
                        event = event_name,
                        timeout_ms = timeout.as_millis() as u64,
                        "Request timed out"
                    );
                    release(self.transport.as_ref(), settled.subscriptions).await;
                }
                // Whoever won has already filled the slot.
                (&mut slot).await
            }
        };

        guard.disarm();

        match outcome.map_err(|_| BridgeError::Cancelled)? {
            Settlement::Success(data) => Ok(data),
            Settlement::Failure(failure) => Err(BridgeError::Failed(failure)),
            Settlement::Timeout => Err(BridgeError::Timeout {
                event_name: event_name.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Fire-and-forget: no table entry, no reply subscriptions.
    async fn publish_only(&self, event_name: &str, data: Value) -> BridgeResult<Value> {
        // The worker pattern still expects a token segment.
        let token = RequestToken::new();
        let payload = Envelope::new(token.to_string(), event_name, data).encode()?;
        let receivers = self
            .transport
            .publish(&request_channel(event_name, token), payload)
            .await?;

        debug!(
            token = %token,
            event = event_name,
            receivers = receivers,
            "Published fire-and-forget request"
        );
        Ok(Value::Null)
    }

    async fn subscribe_replies(
        &self,
        event_name: &str,
        token: RequestToken,
    ) -> BridgeResult<(Subscription, Subscription)> {
        let success = self
            .transport
            .subscribe(&success_channel(event_name, token))
            .await?;

        match self
            .transport
            .subscribe(&failure_channel(event_name, token))
            .await
        {
            Ok(failed) => Ok((success, failed)),
            Err(e) => {
                let id = success.id();
                drop(success);
                release(self.transport.as_ref(), vec![id]).await;
                Err(e.into())
            }
        }
    }

    /// Settle every overdue request with a timeout.
    ///
    /// Returns the number of requests this sweep settled.
    pub async fn sweep_expired(&self) -> usize {
        let mut settled_count = 0;

        for expired in self.table.sweep(Instant::now()) {
            if let Some(settled) = self.table.try_settle(&expired.token, Settlement::Timeout) {
                warn!(
                    token = %expired.token,
                    event = %expired.event_name,
                    overdue_ms = expired.overdue.as_millis() as u64,
                    "Sweeper timed out pending request"
                );
                release(self.transport.as_ref(), settled.subscriptions).await;
                settled_count += 1;
            }
        }

        settled_count
    }

    /// Run [`sweep_task`] in the background.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(sweep_task(self.clone(), interval))
    }
}

/// Background task that settles requests whose deadline has passed.
///
/// Backstop for the per-call deadline; runs until aborted.
pub async fn sweep_task(gateway: Arc<RequestGateway>, interval: Duration) {
    let mut sweep_interval = tokio::time::interval(interval);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep_interval.tick().await;
        let settled = gateway.sweep_expired().await;
        if settled > 0 {
            debug!(settled = settled, "Swept expired pending requests");
        }
    }
}

/// Wait for the first usable reply on either channel and settle with it.
async fn listen_for_reply(
    table: Arc<CorrelationTable>,
    transport: Arc<dyn BrokerTransport>,
    token: RequestToken,
    success: Subscription,
    failed: Subscription,
) {
    let mut replies = stream::select(success, failed);

    while let Some(message) = replies.next().await {
        let Some(outcome) = decode_reply(&token, &message) else {
            continue;
        };
        if let Some(settled) = table.try_settle(&token, outcome) {
            release(transport.as_ref(), settled.subscriptions).await;
        }
        break;
    }
}

/// Turn a reply message into a settlement. Off-protocol messages are logged
/// and dropped.
fn decode_reply(token: &RequestToken, message: &BusMessage) -> Option<Settlement> {
    let Some(channel) = ChannelName::parse(&message.channel) else {
        warn!(token = %token, channel = %message.channel, "Reply on unrecognised channel dropped");
        return None;
    };

    let envelope = match Envelope::decode(&message.payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(
                token = %token,
                channel = %message.channel,
                error = %e,
                "Malformed reply envelope dropped"
            );
            return None;
        }
    };

    if RequestToken::parse(&envelope.token).ok() != Some(*token) {
        warn!(
            token = %token,
            reply_token = %envelope.token,
            "Reply for unknown token dropped"
        );
        return None;
    }

    match channel.kind {
        ChannelKind::Success => Some(Settlement::Success(envelope.data)),
        ChannelKind::Failed => Some(Settlement::Failure(Failure::from_data(envelope.data))),
        ChannelKind::Request => {
            warn!(token = %token, channel = %message.channel, "Request seen on reply channel");
            None
        }
    }
}

async fn release(transport: &dyn BrokerTransport, subscriptions: Vec<SubscriptionId>) {
    for id in subscriptions {
        if let Err(e) = transport.unsubscribe(id).await {
            warn!(subscription = %id, error = %e, "Failed to release reply subscription");
        }
    }
}

/// Cleans up after a caller that stopped waiting (future dropped, or an
/// early error return) before the request settled.
struct PendingGuard {
    table: Arc<CorrelationTable>,
    transport: Arc<dyn BrokerTransport>,
    token: RequestToken,
    listener: Option<JoinHandle<()>>,
    armed: bool,
}

impl PendingGuard {
    fn new(
        table: Arc<CorrelationTable>,
        transport: Arc<dyn BrokerTransport>,
        token: RequestToken,
    ) -> Self {
        Self {
            table,
            transport,
            token,
            listener: None,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        let Some(subscriptions) = self.table.cancel(&self.token) else {
            return;
        };
        debug!(token = %self.token, "Pending request abandoned by caller");

        if subscriptions.is_empty() {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let transport = self.transport.clone();
            handle.spawn(async move {
                release(transport.as_ref(), subscriptions).await;
            });
        }
    }
}
