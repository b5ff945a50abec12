//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Benchmarks for the pipe server

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pipehost_service::{
    AcceptorId, ClientSession, EchoProcessor, MessageProcessor, Notification, NotificationHub,
    ServerMetrics, SessionId, SessionManager,
};
use std::hint::black_box;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

// Benchmark the default processor
fn bench_echo_processor(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let processor = EchoProcessor;

    c.bench_function("echo_process", |b| {
        b.to_async(&runtime).iter(|| async {
            let response = processor.process(SessionId::new(1), "ping").await.unwrap();
            black_box(response);
        });
    });
}

// Benchmark notification fan-out with varying subscriber counts
fn bench_notification_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("notification_publish");

    for subscribers in [0usize, 1, 8, 32].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            subscribers,
            |b, &subscribers| {
                let hub = NotificationHub::new(64);
                let receivers: Vec<_> = (0..subscribers).map(|_| hub.subscribe()).collect();
                b.iter(|| {
                    hub.publish(Notification::ClientConnected {
                        session: SessionId::new(1),
                    });
                });
                drop(receivers);
            },
        );
    }
    group.finish();
}

// Benchmark metrics updates
fn bench_metrics_updates(c: &mut Criterion) {
    let metrics = Arc::new(ServerMetrics::new());

    c.bench_function("metrics_message_received", |b| {
        b.iter(|| {
            metrics.message_received(black_box(64));
        });
    });

    c.bench_function("metrics_snapshot", |b| {
        b.iter(|| {
            black_box(metrics.snapshot());
        });
    });
}

// Benchmark session registration and teardown
fn bench_session_registry(c: &mut Criterion) {
    let manager = Arc::new(SessionManager::new(Arc::new(ServerMetrics::new())));

    c.bench_function("session_register_drop", |b| {
        b.iter(|| {
            let guard = manager.register(AcceptorId::new(0));
            black_box(guard.id());
        });
    });
}

// Benchmark one request/response exchange through a live session
fn bench_session_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let manager = Arc::new(SessionManager::new(Arc::new(ServerMetrics::new())));
    let cancel = CancellationToken::new();
    let (server, client) = duplex(8192);

    let mut session = ClientSession::new(
        manager.register(AcceptorId::new(0)),
        server,
        4096,
        Arc::new(EchoProcessor),
        NotificationHub::default(),
    );
    let session_cancel = cancel.clone();
    let task = runtime.spawn(async move { session.run(&session_cancel).await });
    let client = Arc::new(Mutex::new(client));

    c.bench_function("session_round_trip", |b| {
        b.to_async(&runtime).iter(|| {
            let client = client.clone();
            async move {
                let mut client = client.lock().await;
                client.write_all(b"ping").await.unwrap();
                let mut buf = [0u8; 128];
                let n = client.read(&mut buf).await.unwrap();
                black_box(n);
            }
        });
    });

    cancel.cancel();
    runtime.block_on(task).unwrap();
}

criterion_group!(
    benches,
    bench_echo_processor,
    bench_notification_publish,
    bench_metrics_updates,
    bench_session_registry,
    bench_session_round_trip,
);

criterion_main!(benches);
