//! # Correlation Under Load
//!
//! The gateway and a hand-driven responder share one broker. The responder
//! controls reply order and content, so these tests can interleave replies,
//! repeat them, arrive late, or send garbage first.

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use futures::future::join_all;
    use request_bridge::{
        handler_fn, BridgeError, RequestGateway, RequestOptions, WorkerRouter,
        HANDLER_PANIC_MESSAGE,
    };
    use serde_json::{json, Value};
    use shared_bus::{
        failure_channel, request_pattern, success_channel, BrokerTransport, Envelope,
        InMemoryBroker,
    };
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn setup(timeout_ms: u64) -> (InMemoryBroker, Arc<RequestGateway>) {
        let broker = InMemoryBroker::new();
        let gateway = Arc::new(RequestGateway::new(
            Arc::new(broker.clone()),
            Duration::from_millis(timeout_ms),
        ));
        (broker, gateway)
    }

    fn reply(token: &str, event_name: &str, data: Value) -> String {
        Envelope::new(token, event_name, data).encode().unwrap()
    }

    // =============================================================================
    // ISOLATION
    // =============================================================================

    /// Replies sent in reverse arrival order still reach their own callers.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_replies_reach_their_callers() {
        const CALLERS: u64 = 20;
        let (broker, gateway) = setup(2_000);

        let mut requests = broker.subscribe(&request_pattern("get-user")).await.unwrap();
        let responder = broker.clone();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while seen.len() < CALLERS as usize {
                let message = requests.recv().await.unwrap();
                seen.push(Envelope::decode(&message.payload).unwrap());
            }
            for envelope in seen.into_iter().rev() {
                let channel = success_channel("get-user", &envelope.token);
                let payload = reply(&envelope.token, "get-user", json!({"echo": envelope.data}));
                responder.publish(&channel, payload).await.unwrap();
            }
        });

        let calls = (0..CALLERS).map(|i| {
            let gateway = Arc::clone(&gateway);
            async move {
                let result = gateway
                    .send_request("get-user", json!({"userId": i}), RequestOptions::default())
                    .await
                    .unwrap();
                (i, result)
            }
        });

        for (i, result) in join_all(calls).await {
            assert_eq!(result, json!({"echo": {"userId": i}}));
        }
        assert_eq!(gateway.table().pending_count(), 0);
        assert_eq!(
            gateway.table().stats().total_succeeded.load(Ordering::Relaxed),
            CALLERS
        );
    }

    /// A second success and a trailing failure for a settled token change nothing.
    #[tokio::test]
    async fn test_duplicate_replies_have_no_effect() {
        let (broker, gateway) = setup(1_000);

        let mut requests = broker.subscribe(&request_pattern("put-user")).await.unwrap();
        let responder = broker.clone();
        tokio::spawn(async move {
            let message = requests.recv().await.unwrap();
            let envelope = Envelope::decode(&message.payload).unwrap();
            let token = envelope.token;

            let ok = success_channel("put-user", &token);
            let failed = failure_channel("put-user", &token);
            responder
                .publish(&ok, reply(&token, "put-user", json!("first")))
                .await
                .unwrap();
            let _ = responder
                .publish(&ok, reply(&token, "put-user", json!("second")))
                .await;
            let _ = responder
                .publish(
                    &failed,
                    reply(&token, "put-user", json!({"message": "late", "errorCode": 404})),
                )
                .await;
        });

        let result = gateway
            .send_request("put-user", json!({}), RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!("first"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stats = gateway.table().stats();
        assert_eq!(stats.total_succeeded.load(Ordering::Relaxed), 1);
        assert_eq!(stats.total_failed.load(Ordering::Relaxed), 0);
        assert_eq!(gateway.table().pending_count(), 0);
    }

    /// Garbage and foreign tokens on the reply channels are skipped.
    #[tokio::test]
    async fn test_malformed_envelopes_are_ignored() {
        let (broker, gateway) = setup(1_000);

        let mut requests = broker.subscribe(&request_pattern("get-user")).await.unwrap();
        let responder = broker.clone();
        tokio::spawn(async move {
            let message = requests.recv().await.unwrap();
            let token = Envelope::decode(&message.payload).unwrap().token;
            let channel = success_channel("get-user", &token);

            for junk in [
                "not json".to_string(),
                json!({"eventName": "get-user", "data": 1}).to_string(),
                reply("someone-else", "get-user", json!("wrong")),
            ] {
                responder.publish(&channel, junk).await.unwrap();
            }
            responder
                .publish(&channel, reply(&token, "get-user", json!("right")))
                .await
                .unwrap();
        });

        let result = gateway
            .send_request("get-user", json!({}), RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!("right"));
    }

    // =============================================================================
    // TIMEOUTS
    // =============================================================================

    #[tokio::test]
    async fn test_timeout_with_no_worker() {
        let (broker, gateway) = setup(100);

        let started = Instant::now();
        let err = timeout(
            Duration::from_secs(2),
            gateway.send_request("get-user", json!({"userId": 1}), RequestOptions::default()),
        )
        .await
        .expect("gateway must settle on its own deadline")
        .unwrap_err();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(100), "settled early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(250), "settled late: {elapsed:?}");
        assert!(matches!(err, BridgeError::Timeout { timeout_ms: 100, .. }));
        assert_eq!(err.error_code(), 504);
        assert_eq!(gateway.table().pending_count(), 0);
        assert_eq!(broker.subscriber_count(), 0);
    }

    /// A reply that lands after the deadline is dropped without reviving the entry.
    #[tokio::test]
    async fn test_late_reply_after_timeout() {
        let (broker, gateway) = setup(50);

        let mut requests = broker.subscribe(&request_pattern("get-user")).await.unwrap();
        let responder = broker.clone();
        let late = tokio::spawn(async move {
            let message = requests.recv().await.unwrap();
            let token = Envelope::decode(&message.payload).unwrap().token;
            tokio::time::sleep(Duration::from_millis(150)).await;
            responder
                .publish(
                    &success_channel("get-user", &token),
                    reply(&token, "get-user", json!("too late")),
                )
                .await
                .unwrap()
        });

        let err = gateway
            .send_request("get-user", json!({}), RequestOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        // Reply subscriptions were released, nobody receives it.
        assert_eq!(late.await.unwrap(), 0);
        assert_eq!(gateway.table().pending_count(), 0);
        assert_eq!(
            gateway.table().stats().total_timeouts.load(Ordering::Relaxed),
            1
        );
    }

    // =============================================================================
    // WORKER ROUND TRIPS
    // =============================================================================

    #[tokio::test]
    async fn test_worker_panic_becomes_internal_failure() {
        let (broker, gateway) = setup(1_000);
        let worker = WorkerRouter::new(Arc::new(broker.clone()));
        worker
            .register_handler(
                "explode",
                handler_fn(|data: Value| async move {
                    if data.get("boom").is_some() {
                        panic!("handler blew up");
                    }
                    Ok(data)
                }),
            )
            .await
            .unwrap();

        let err = gateway
            .send_request("explode", json!({"boom": true}), RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), 500);
        assert_eq!(err.message(), HANDLER_PANIC_MESSAGE);

        // The worker keeps serving after a panic.
        let calm = gateway
            .send_request("explode", json!({"calm": true}), RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(calm, json!({"calm": true}));
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_fire_and_forget_reaches_worker() {
        let (broker, gateway) = setup(1_000);
        let worker = WorkerRouter::new(Arc::new(broker.clone()));
        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
        worker
            .register_handler(
                "audit",
                handler_fn(move |data: Value| {
                    let seen_tx = seen_tx.clone();
                    async move {
                        let _ = seen_tx.send(data);
                        Ok(Value::Null)
                    }
                }),
            )
            .await
            .unwrap();

        let result = gateway
            .send_request("audit", json!({"action": "ping"}), RequestOptions::fire_and_forget())
            .await
            .unwrap();
        assert_eq!(result, Value::Null);
        assert_eq!(gateway.table().pending_count(), 0);

        let seen = timeout(Duration::from_secs(1), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen, json!({"action": "ping"}));
        worker.shutdown().await;
    }
}
