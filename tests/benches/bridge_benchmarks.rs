//! # Bridge Benchmarks
//!
//! Request/reply latency through the in-process broker:
//!
//! | Path | What is measured |
//! |------|------------------|
//! | echo | Gateway → worker → gateway with a trivial handler |
//! | get-user | Same path through the people repository |
//! | fan-out | N concurrent callers sharing one broker |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use people_service::{register_handlers, InMemoryStore, NewUser, UserRepository};
use request_bridge::{handler_fn, RequestGateway, RequestOptions, WorkerRouter};
use serde_json::{json, Value};
use shared_bus::InMemoryBroker;
use tokio::runtime::Runtime;

struct Bench {
    gateway: Arc<RequestGateway>,
    _worker: WorkerRouter,
}

fn build(rt: &Runtime) -> Bench {
    rt.block_on(async {
        let broker = InMemoryBroker::new();
        let worker = WorkerRouter::new(Arc::new(broker.clone()));
        worker
            .register_handler("echo", handler_fn(|data: Value| async move { Ok(data) }))
            .await
            .unwrap();

        let repository = Arc::new(UserRepository::new(Arc::new(InMemoryStore::new())));
        repository
            .create(NewUser {
                first_name: "Bench".into(),
                last_name: "Mark".into(),
                email: "bench@example.com".into(),
                gender: "Other".into(),
                ip_address: "127.0.0.1".into(),
            })
            .await
            .unwrap();
        register_handlers(&worker, repository).await.unwrap();

        Bench {
            gateway: Arc::new(RequestGateway::new(
                Arc::new(broker),
                Duration::from_secs(5),
            )),
            _worker: worker,
        }
    })
}

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let bench = build(&rt);

    let mut group = c.benchmark_group("bridge-round-trip");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("echo", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                bench
                    .gateway
                    .send_request("echo", json!({"n": 1}), RequestOptions::default())
                    .await
                    .unwrap(),
            )
        })
    });

    group.bench_function("get-user", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                bench
                    .gateway
                    .send_request("get-user", json!({"userId": 1}), RequestOptions::default())
                    .await
                    .unwrap(),
            )
        })
    });

    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let bench = build(&rt);

    let mut group = c.benchmark_group("bridge-fan-out");
    for callers in [10u64, 100, 500] {
        group.throughput(Throughput::Elements(callers));
        group.bench_with_input(BenchmarkId::new("echo", callers), &callers, |b, &n| {
            b.to_async(&rt).iter(|| async {
                let calls = (0..n).map(|i| {
                    let gateway = Arc::clone(&bench.gateway);
                    async move {
                        gateway
                            .send_request("echo", json!({"n": i}), RequestOptions::default())
                            .await
                            .unwrap()
                    }
                });
                black_box(futures::future::join_all(calls).await)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_round_trip, bench_fan_out);
criterion_main!(benches);
