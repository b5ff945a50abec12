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

//! End-to-end tests over the local OS channel transport

use pipehost_client::{ClientConfig, ClientError, PipeClient};
use pipehost_service::{
    FnProcessor, Notification, NotificationKind, PipeServer, ServerConfig, ServerStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Channel name unique to this process and test
fn channel(tag: &str) -> String {
    format!("pipehost-it-{}-{}", std::process::id(), tag)
}

fn config(tag: &str) -> ServerConfig {
    ServerConfig::new(channel(tag)).with_reconnect_delay(Duration::from_millis(10))
}

/// Spawn `server` and wait until its channel is bound
async fn launch(server: &Arc<PipeServer>) -> (Receiver<Notification>, JoinHandle<bool>) {
    let mut rx = server.subscribe();
    let run = server.spawn();
    next_kind(&mut rx, NotificationKind::StatusChanged).await;
    (rx, run)
}

async fn next_kind(rx: &mut Receiver<Notification>, kind: NotificationKind) -> Notification {
    timeout(Duration::from_secs(5), async {
        loop {
            let n = rx.recv().await.expect("notification stream closed");
            if n.kind() == kind {
                return n;
            }
        }
    })
    .await
    .expect("timed out waiting for notification")
}

async fn shutdown(server: &PipeServer, run: JoinHandle<bool>) {
    server.stop();
    assert!(timeout(Duration::from_secs(5), run).await.unwrap().unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ping_echo() {
    let server = Arc::new(PipeServer::new(config("ping")).unwrap());
    let (mut rx, run) = launch(&server).await;

    let mut client = PipeClient::connect(&channel("ping")).await.unwrap();
    let response = client.request("ping").await.unwrap();

    assert!(response.starts_with("Echo: ping (Received at "), "{response}");
    assert!(response.ends_with(')'));
    let clock = &response["Echo: ping (Received at ".len()..response.len() - 1];
    assert_eq!(clock.len(), 8);
    assert_eq!(clock.as_bytes()[2], b':');
    assert_eq!(clock.as_bytes()[5], b':');

    let connected = next_kind(&mut rx, NotificationKind::ClientConnected).await;
    let received = next_kind(&mut rx, NotificationKind::MessageReceived).await;
    assert_eq!(received.payload(), "ping");

    client.close().await.unwrap();
    let disconnected = next_kind(&mut rx, NotificationKind::ClientDisconnected).await;
    assert_eq!(connected.payload(), disconnected.payload());

    shutdown(&server, run).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_multiple_messages_on_one_connection() {
    let server = Arc::new(PipeServer::new(config("multi")).unwrap());
    let (_rx, run) = launch(&server).await;

    let mut client = PipeClient::connect(&channel("multi")).await.unwrap();
    for text in ["one", "two", "three"] {
        let response = client.request(text).await.unwrap();
        assert!(response.starts_with(&format!("Echo: {text} ")), "{response}");
    }
    assert_eq!(server.session_count(), 1);
    assert_eq!(server.sessions()[0].messages, 3);

    client.close().await.unwrap();
    shutdown(&server, run).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_third_client_waits_for_free_slot() {
    let server = Arc::new(PipeServer::new(config("slots").with_max_acceptors(2)).unwrap());
    let (mut rx, run) = launch(&server).await;
    let name = channel("slots");

    let mut first = PipeClient::connect(&name).await.unwrap();
    assert!(first.request("a").await.unwrap().starts_with("Echo: a "));
    let mut second = PipeClient::connect(&name).await.unwrap();
    assert!(second.request("b").await.unwrap().starts_with("Echo: b "));

    let third = tokio::spawn({
        let name = name.clone();
        async move {
            let mut client = PipeClient::connect(&name).await?;
            let response = client.request("c").await?;
            client.close().await?;
            Ok::<_, ClientError>(response)
        }
    });

    sleep(Duration::from_millis(300)).await;
    assert!(!third.is_finished());
    let busy = server.sessions();
    assert_eq!(busy.len(), 2);
    assert_ne!(busy[0].acceptor, busy[1].acceptor);
    let first_acceptor = busy[0].acceptor;

    first.close().await.unwrap();
    let response = timeout(Duration::from_secs(5), third)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(response.starts_with("Echo: c "));
    second.close().await.unwrap();

    let mut events = Vec::new();
    timeout(Duration::from_secs(5), async {
        let mut disconnects = 0;
        while disconnects < 3 {
            let n = rx.recv().await.unwrap();
            if n.kind() == NotificationKind::ClientDisconnected {
                disconnects += 1;
            }
            events.push(n);
        }
    })
    .await
    .unwrap();

    // Every peer got its own session with exactly one connect and disconnect
    let mut connected = Vec::new();
    let mut disconnected = Vec::new();
    for n in &events {
        match n {
            Notification::ClientConnected { session } => connected.push(*session),
            Notification::ClientDisconnected { session } => disconnected.push(*session),
            Notification::ErrorOccurred { .. } => panic!("unexpected {n}"),
            _ => {}
        }
    }
    assert_eq!(connected.len(), 3);
    let mut distinct = connected.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), 3);
    disconnected.sort();
    assert_eq!(distinct, disconnected);

    // The freed slot went back to waiting after its peer left
    let freed = events
        .iter()
        .position(|n| *n == Notification::ClientDisconnected { session: busy[0].id })
        .unwrap();
    assert!(events[freed..].contains(&Notification::StatusChanged(
        ServerStatus::WaitingForConnection {
            acceptor: first_acceptor
        }
    )));

    shutdown(&server, run).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_without_data_then_accept_again() {
    let server = Arc::new(PipeServer::new(config("silent")).unwrap());
    let (mut rx, run) = launch(&server).await;
    let name = channel("silent");

    let client = PipeClient::connect(&name).await.unwrap();
    next_kind(&mut rx, NotificationKind::ClientConnected).await;
    client.close().await.unwrap();
    next_kind(&mut rx, NotificationKind::ClientDisconnected).await;

    let mut again = PipeClient::connect(&name).await.unwrap();
    assert!(again.request("back").await.unwrap().starts_with("Echo: back "));
    again.close().await.unwrap();

    shutdown(&server, run).await;
    while let Ok(n) = rx.try_recv() {
        assert_ne!(n.kind(), NotificationKind::ErrorOccurred, "{n}");
    }
    assert_eq!(server.metrics().snapshot().total_errors(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_during_read_is_quiet() {
    let server = Arc::new(PipeServer::new(config("stop")).unwrap());
    let (mut rx, run) = launch(&server).await;

    let mut client = PipeClient::connect(&channel("stop")).await.unwrap();
    next_kind(&mut rx, NotificationKind::ClientConnected).await;
    while rx.try_recv().is_ok() {}

    shutdown(&server, run).await;

    let mut after_stop = Vec::new();
    while let Ok(n) = rx.try_recv() {
        after_stop.push(n);
    }
    assert_eq!(
        after_stop,
        vec![Notification::StatusChanged(ServerStatus::Stopped)]
    );
    assert_eq!(server.session_count(), 0);

    let result = client.receive().await;
    assert!(matches!(result, Err(ClientError::ConnectionClosed)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_on_same_channel() {
    let server = Arc::new(PipeServer::new(config("restart")).unwrap());
    let name = channel("restart");

    let (_rx, run) = launch(&server).await;
    shutdown(&server, run).await;

    let (_rx, run) = launch(&server).await;
    let mut client = PipeClient::connect(&name).await.unwrap();
    assert!(client.request("again").await.unwrap().starts_with("Echo: again "));
    client.close().await.unwrap();
    shutdown(&server, run).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_server_on_same_channel_fails() {
    let first = Arc::new(PipeServer::new(config("taken")).unwrap());
    let (mut first_rx, run) = launch(&first).await;
    next_kind(&mut first_rx, NotificationKind::StatusChanged).await;
    while first_rx.try_recv().is_ok() {}

    let second = PipeServer::new(config("taken")).unwrap();
    let mut rx = second.subscribe();
    assert!(!second.start().await);
    assert_eq!(rx.try_recv().unwrap().kind(), NotificationKind::ErrorOccurred);

    // The running server never notices the failed attempt
    sleep(Duration::from_millis(200)).await;
    assert!(first_rx.try_recv().is_err());
    assert_eq!(first.metrics().total_sessions(), 0);

    let mut client = PipeClient::connect(&channel("taken")).await.unwrap();
    assert!(client.request("still here").await.unwrap().starts_with("Echo: still here "));
    client.close().await.unwrap();

    shutdown(&first, run).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_custom_processor() {
    let processor = FnProcessor::new(|_, message: &str| Ok(message.to_uppercase()));
    let server = Arc::new(
        PipeServer::new(config("upper"))
            .unwrap()
            .with_processor(processor),
    );
    let (_rx, run) = launch(&server).await;

    let config = ClientConfig::new(channel("upper")).with_read_timeout(Some(Duration::from_secs(5)));
    let mut client = PipeClient::connect_with(config).await.unwrap();
    assert_eq!(client.request("shout").await.unwrap(), "SHOUT");
    client.close().await.unwrap();

    shutdown(&server, run).await;
}
