//! Correlation Table - single source of truth for settlement.
//!
//! Maps request tokens to callers waiting on a reply. Settlement is an atomic
//! check-and-remove on the map: whoever removes the entry delivers the
//! outcome, and every later attempt for the same token finds nothing.

use crate::domain::error::{BridgeError, BridgeResult};
use crate::domain::token::RequestToken;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use shared_bus::{Failure, SubscriptionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error};

/// How a pending request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Success(Value),
    Failure(Failure),
    Timeout,
}

impl Settlement {
    pub fn kind(&self) -> &'static str {
        match self {
            Settlement::Success(_) => "success",
            Settlement::Failure(_) => "failure",
            Settlement::Timeout => "timeout",
        }
    }
}

/// A request waiting for its reply
struct PendingRequest {
    event_name: String,
    created_at: Instant,
    deadline: Instant,
    /// Slot the waiting caller is suspended on
    slot: oneshot::Sender<Settlement>,
    /// Reply subscriptions to release on settlement
    subscriptions: Vec<SubscriptionId>,
}

/// Result of winning a settlement race.
#[derive(Debug)]
pub struct Settled {
    pub token: RequestToken,
    pub event_name: String,
    pub elapsed: Duration,
    /// Subscriptions the winner must release
    pub subscriptions: Vec<SubscriptionId>,
    /// False when the caller had already gone away
    pub delivered: bool,
}

/// An entry whose deadline has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired {
    pub token: RequestToken,
    pub event_name: String,
    pub overdue: Duration,
}

/// Counters for the correlation table
#[derive(Debug, Default)]
pub struct TableStats {
    pub total_registered: AtomicU64,
    pub total_succeeded: AtomicU64,
    pub total_failed: AtomicU64,
    pub total_timeouts: AtomicU64,
    /// Entries removed without settlement (caller dropped)
    pub total_cancelled: AtomicU64,
}

/// Concurrency-safe map from token to pending request.
///
/// Flow:
/// 1. Gateway mints a token and calls `create()` to get the settlement slot
/// 2. Gateway subscribes to the reply channels and `attach()`es them
/// 3. Reply listener, deadline or sweeper calls `try_settle()`
/// 4. Exactly one of them wins; the winner releases the subscriptions
#[derive(Default)]
pub struct CorrelationTable {
    pending: DashMap<RequestToken, PendingRequest>,
    stats: Arc<TableStats>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token and get the receiver its outcome will arrive on.
    ///
    /// A token already present is an invariant violation: the call is
    /// rejected and logged at error level.
    pub fn create(
        &self,
        token: RequestToken,
        event_name: &str,
        deadline: Instant,
    ) -> BridgeResult<oneshot::Receiver<Settlement>> {
        match self.pending.entry(token) {
            Entry::Occupied(_) => {
                error!(
                    token = %token,
                    event = event_name,
                    "Request token already pending"
                );
                Err(BridgeError::DuplicateToken(token))
            }
            Entry::Vacant(vacant) => {
                let (slot, receiver) = oneshot::channel();
                vacant.insert(PendingRequest {
                    event_name: event_name.to_string(),
                    created_at: Instant::now(),
                    deadline,
                    slot,
                    subscriptions: Vec::new(),
                });
                self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

                debug!(token = %token, event = event_name, "Registered pending request");
                Ok(receiver)
            }
        }
    }

    /// Record reply subscriptions against a pending token.
    ///
    /// Hands the ids back when the token has already settled so the caller
    /// can release them itself.
    pub fn attach(
        &self,
        token: &RequestToken,
        subscriptions: Vec<SubscriptionId>,
    ) -> Result<(), Vec<SubscriptionId>> {
        match self.pending.get_mut(token) {
            Some(mut request) => {
                request.subscriptions.extend(subscriptions);
                Ok(())
            }
            None => Err(subscriptions),
        }
    }

    /// Settle a token if it is still pending.
    ///
    /// Returns `Some` only for the caller that won; later attempts are
    /// silent no-ops.
    pub fn try_settle(&self, token: &RequestToken, outcome: Settlement) -> Option<Settled> {
        let Some((token, request)) = self.pending.remove(token) else {
            debug!(token = %token, outcome = outcome.kind(), "Settlement for token no longer pending");
            return None;
        };

        let counter = match &outcome {
            Settlement::Success(_) => &self.stats.total_succeeded,
            Settlement::Failure(_) => &self.stats.total_failed,
            Settlement::Timeout => &self.stats.total_timeouts,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let elapsed = request.created_at.elapsed();
        let kind = outcome.kind();
        let delivered = request.slot.send(outcome).is_ok();

        debug!(
            token = %token,
            event = %request.event_name,
            outcome = kind,
            elapsed_ms = elapsed.as_millis() as u64,
            delivered = delivered,
            "Settled pending request"
        );

        Some(Settled {
            token,
            event_name: request.event_name,
            elapsed,
            subscriptions: request.subscriptions,
            delivered,
        })
    }

    /// Every entry whose deadline is at or before `now`.
    ///
    /// Entries are left in place; the caller settles them with a timeout so
    /// the usual first-wins rule still applies.
    pub fn sweep(&self, now: Instant) -> Vec<Expired> {
        self.pending
            .iter()
            .filter(|entry| entry.deadline <= now)
            .map(|entry| Expired {
                token: *entry.key(),
                event_name: entry.event_name.clone(),
                overdue: now.saturating_duration_since(entry.deadline),
            })
            .collect()
    }

    /// Remove a token without settling it.
    ///
    /// Returns the subscriptions the caller must release, or `None` when the
    /// token had already settled.
    pub fn cancel(&self, token: &RequestToken) -> Option<Vec<SubscriptionId>> {
        let (_, request) = self.pending.remove(token)?;
        self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
        debug!(token = %token, event = %request.event_name, "Cancelled pending request");
        Some(request.subscriptions)
    }

    pub fn is_pending(&self, token: &RequestToken) -> bool {
        self.pending.contains_key(token)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &TableStats {
        &self.stats
    }
}
