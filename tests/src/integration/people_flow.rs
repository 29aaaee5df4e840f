//! # People Flow
//!
//! HTTP request → gateway → broker → worker → repository → store, and back.
//!
//! ```text
//! Router ──oneshot──→ RequestGateway ──→ InMemoryBroker ──→ WorkerRouter
//!                                                              │
//!                                              UserRepository ←┘
//! ```

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use people_api::{build_router, AppState};
    use people_service::{
        load_seed_file, register_handlers, BootstrapOutcome, InMemoryStore, UserRepository,
    };
    use request_bridge::{RequestGateway, WorkerRouter};
    use serde_json::{json, Value};
    use shared_bus::InMemoryBroker;
    use tower::ServiceExt;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Relay {
        router: Router,
        worker: WorkerRouter,
        repository: Arc<UserRepository>,
        broker: InMemoryBroker,
    }

    async fn relay() -> Relay {
        let broker = InMemoryBroker::new();
        let repository = Arc::new(UserRepository::new(Arc::new(InMemoryStore::new())));
        let worker = WorkerRouter::new(Arc::new(broker.clone()));
        register_handlers(&worker, Arc::clone(&repository))
            .await
            .unwrap();

        let gateway = Arc::new(RequestGateway::new(
            Arc::new(broker.clone()),
            Duration::from_secs(1),
        ));
        Relay {
            router: build_router(AppState::new(gateway)),
            worker,
            repository,
            broker,
        }
    }

    async fn call(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn person(first_name: &str) -> Value {
        json!({
            "first_name": first_name,
            "last_name": "Example",
            "email": format!("{}@example.com", first_name.to_lowercase()),
            "gender": "Non-binary",
            "ip_address": "192.168.0.1"
        })
    }

    // =============================================================================
    // HTTP ROUND TRIPS
    // =============================================================================

    #[tokio::test]
    async fn test_create_on_empty_store_then_get() {
        let relay = relay().await;

        let (status, created) =
            call(&relay.router, Method::POST, "/api/people", Some(person("Robin"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["id"], json!(1));

        let (status, fetched) = call(&relay.router, Method::GET, "/api/people/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        relay.worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_unknown_user() {
        let relay = relay().await;

        let (status, body) = call(&relay.router, Method::DELETE, "/api/people/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "User not found, cannot delete"}));

        relay.worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_ids_follow_highest_after_delete() {
        let relay = relay().await;
        for name in ["Ana", "Ben", "Cal"] {
            call(&relay.router, Method::POST, "/api/people", Some(person(name))).await;
        }

        let (status, _) = call(&relay.router, Method::DELETE, "/api/people/2", None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, created) =
            call(&relay.router, Method::POST, "/api/people", Some(person("Dee"))).await;
        assert_eq!(created["id"], json!(4));

        let ids: Vec<u64> = relay
            .repository
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec![1, 3, 4]);

        relay.worker.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_get_distinct_ids() {
        let relay = relay().await;

        let calls = (0..10).map(|i| {
            let router = relay.router.clone();
            async move {
                let (status, created) = call(
                    &router,
                    Method::POST,
                    "/api/people",
                    Some(person(&format!("P{i}"))),
                )
                .await;
                assert_eq!(status, StatusCode::OK);
                created["id"].as_u64().unwrap()
            }
        });

        let mut ids = futures::future::join_all(calls).await;
        ids.sort_unstable();
        assert_eq!(ids, (1..=10).collect::<Vec<u64>>());

        relay.worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_gone_means_504() {
        let relay = relay().await;
        relay.worker.shutdown().await;

        let (status, body) = call(&relay.router, Method::GET, "/api/people/1", None).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(body["error"].as_str().unwrap().contains("timed out"));
        assert_eq!(relay.broker.subscriber_count(), 0);
    }

    // =============================================================================
    // SEEDING
    // =============================================================================

    #[tokio::test]
    async fn test_seed_is_written_once() {
        let relay = relay().await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            json!({"users": [{
                "id": 7,
                "first_name": "Seed",
                "last_name": "Record",
                "email": "seed@example.com",
                "gender": "Female",
                "ip_address": "10.9.9.9"
            }]})
        )
        .unwrap();

        let seed = load_seed_file(file.path()).await.unwrap();
        assert_eq!(
            relay.repository.bootstrap(seed.clone()).await.unwrap(),
            BootstrapOutcome::Seeded(1)
        );
        assert_eq!(
            relay.repository.bootstrap(seed).await.unwrap(),
            BootstrapOutcome::AlreadyPresent
        );

        let (status, fetched) = call(&relay.router, Method::GET, "/api/people/7", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["first_name"], json!("Seed"));

        let (_, created) =
            call(&relay.router, Method::POST, "/api/people", Some(person("Next"))).await;
        assert_eq!(created["id"], json!(8));

        relay.worker.shutdown().await;
    }
}
