//
// Copyright 2017-2025 Hans W. Uhlig. All Rights Reserved.
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

//! Pipe server implementation
//!
//! The PipeServer is the main entry point. It owns the lifecycle of one
//! channel: binding it, launching the acceptor loops that share a single
//! cancellation token, and stopping them again.
//!
//! `start` supervises the acceptors and only returns once they have all
//! finished, which normally happens after `stop`. Hosts that need a
//! non-blocking start use [`PipeServer::spawn`].

use crate::acceptor::{AcceptorContext, ConnectionAcceptor};
use crate::manager::SessionManager;
use crate::{
    AcceptorId, EchoProcessor, LocalTransport, MessageProcessor, Notification, NotificationHub,
    PipeError, Result, ServerConfig, ServerMetrics, ServerSnapshot, ServerStatus, SessionInfo,
    Transport,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Mutable lifecycle state, guarded by one mutex so start and stop never
/// interleave halfway
#[derive(Debug, Default)]
struct Lifecycle {
    /// Incremented on every start; identifies the current run
    generation: u64,
    /// Cancellation token of the current run; present from the moment
    /// `start` begins until the run is stopped or finished
    cancel: Option<CancellationToken>,
    /// When the current run started
    started_at: Option<Instant>,
}

/// Named-channel IPC server
///
/// # Example
///
/// ```no_run
/// use pipehost_service::{PipeServer, ServerConfig};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Arc::new(PipeServer::new(ServerConfig::new("MY_APP_PIPE"))?);
///     let mut notifications = server.subscribe();
///
///     let run = server.spawn();
///     // ... serve until the host decides to shut down
///     server.stop();
///     run.await?;
///     Ok(())
/// }
/// ```
pub struct PipeServer<T: Transport = LocalTransport> {
    /// Server configuration
    config: ServerConfig,
    /// Channel transport
    transport: T,
    /// Response producer shared by all sessions
    processor: Arc<dyn MessageProcessor>,
    /// Notification surface
    notifications: NotificationHub,
    /// Session registry
    sessions: Arc<SessionManager>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// Running flag: set once the channel is bound (written only under the
    /// lifecycle lock)
    running: AtomicBool,
    /// Lifecycle state
    lifecycle: Mutex<Lifecycle>,
    /// Held for the whole of a run so a restart waits for the previous
    /// run's listener to be released
    run_lock: tokio::sync::Mutex<()>,
}

impl PipeServer<LocalTransport> {
    /// Create a server for the local OS channel transport
    ///
    /// The configuration is validated here; this is the only synchronous
    /// failure point. Nothing is bound until `start`.
    pub fn new(config: ServerConfig) -> Result<Self> {
        Self::with_transport(config, LocalTransport)
    }
}

impl<T: Transport> PipeServer<T> {
    /// Create a server on a custom transport
    pub fn with_transport(config: ServerConfig, transport: T) -> Result<Self> {
        let config = config.normalized();
        config.validate()?;
        let metrics = Arc::new(ServerMetrics::new());

        Ok(Self {
            config,
            transport,
            processor: Arc::new(EchoProcessor),
            notifications: NotificationHub::default(),
            sessions: Arc::new(SessionManager::new(metrics.clone())),
            metrics,
            running: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle::default()),
            run_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Replace the message processor (default: [`EchoProcessor`])
    pub fn with_processor(mut self, processor: impl MessageProcessor) -> Self {
        self.processor = Arc::new(processor);
        self
    }

    /// Publish through an existing hub instead of a private one
    pub fn with_notifications(mut self, notifications: NotificationHub) -> Self {
        self.notifications = notifications;
        self
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start serving the channel
    ///
    /// Binds the channel, launches `max_acceptors` accept loops and waits
    /// for all of them to finish. Returns `false` if the channel could not
    /// be bound (reported as `ErrorOccurred`), `true` otherwise. Calling
    /// `start` on a running or starting server only reports
    /// `AlreadyRunning`. A `stop` that arrives while the channel is still
    /// being bound abandons the start without any notification.
    pub async fn start(&self) -> bool {
        let (generation, cancel) = {
            let mut lifecycle = self.lock_lifecycle();
            if lifecycle.cancel.is_some() {
                drop(lifecycle);
                info!(channel = %self.config.channel_name, "Pipe server already running");
                self.notifications
                    .publish(Notification::StatusChanged(ServerStatus::AlreadyRunning));
                return true;
            }

            let cancel = CancellationToken::new();
            lifecycle.generation += 1;
            lifecycle.cancel = Some(cancel.clone());
            (lifecycle.generation, cancel)
        };
        let _run = RunGuard {
            server: self,
            generation,
        };

        let _exclusive = self.run_lock.lock().await;
        if cancel.is_cancelled() {
            return true;
        }

        let channel = &self.config.channel_name;
        let listener = match self
            .transport
            .bind(channel, self.config.max_acceptors)
            .await
        {
            Ok(listener) => Arc::new(listener),
            Err(source) => {
                let error = PipeError::Bind {
                    channel: channel.clone(),
                    source,
                };
                error!(error = %error, "Pipe server failed to start");
                self.finish_run(generation);
                self.notifications.publish(Notification::error(None, &error));
                return false;
            }
        };

        if !self.mark_started(generation, &cancel) {
            debug!(channel = %channel, "Start abandoned while binding");
            return true;
        }
        info!(
            channel = %channel,
            acceptors = self.config.max_acceptors,
            "Pipe server started"
        );

        let context = AcceptorContext {
            listener,
            processor: self.processor.clone(),
            notifications: self.notifications.clone(),
            sessions: self.sessions.clone(),
            cancel: cancel.clone(),
            buffer_size: self.config.buffer_size,
            reconnect_delay: self.config.reconnect_delay,
        };

        let mut acceptors = JoinSet::new();
        for slot in 0..self.config.max_acceptors {
            let acceptor = ConnectionAcceptor::new(AcceptorId::new(slot), context.clone());
            acceptors.spawn(acceptor.run());
        }
        drop(context);

        while let Some(result) = acceptors.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    error!(error = %e, "Acceptor panicked");
                    self.notifications
                        .publish(Notification::error(None, format!("acceptor failed: {e}")));
                }
            }
        }

        let requested = cancel.is_cancelled();
        self.finish_run(generation);
        if !requested {
            warn!("All acceptors exited without a stop request");
            self.notifications
                .publish(Notification::StatusChanged(ServerStatus::Stopped));
        }
        info!(channel = %channel, "Pipe server run finished");
        true
    }

    /// Flip to running and report `Started`, unless run `generation` was
    /// stopped while its channel was being bound
    fn mark_started(&self, generation: u64, cancel: &CancellationToken) -> bool {
        let mut lifecycle = self.lock_lifecycle();
        if lifecycle.generation != generation || cancel.is_cancelled() {
            return false;
        }
        lifecycle.started_at = Some(Instant::now());
        self.running.store(true, Ordering::SeqCst);
        self.notifications
            .publish(Notification::StatusChanged(ServerStatus::Started {
                channel: self.config.channel_name.clone(),
                acceptors: self.config.max_acceptors,
            }));
        true
    }

    /// Stop serving
    ///
    /// Reports `Stopped`, signals every acceptor and session, and returns
    /// without waiting for them to unwind. A no-op when not running; a
    /// start still binding its channel is abandoned silently.
    pub fn stop(&self) {
        let mut lifecycle = self.lock_lifecycle();
        let Some(cancel) = lifecycle.cancel.take() else {
            return;
        };
        lifecycle.started_at = None;

        if self.running.swap(false, Ordering::SeqCst) {
            info!(channel = %self.config.channel_name, "Stopping pipe server");
            self.notifications
                .publish(Notification::StatusChanged(ServerStatus::Stopped));
        } else {
            debug!(channel = %self.config.channel_name, "Cancelling pending start");
        }
        cancel.cancel();
    }

    /// Mark run `generation` as over if it is still the current one
    fn finish_run(&self, generation: u64) {
        let mut lifecycle = self.lock_lifecycle();
        if lifecycle.generation != generation {
            return;
        }
        if let Some(cancel) = lifecycle.cancel.take() {
            cancel.cancel();
        }
        lifecycle.started_at = None;
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Attach a notification subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Get the notification hub
    pub fn notifications(&self) -> &NotificationHub {
        &self.notifications
    }

    /// Get the number of active sessions
    pub fn session_count(&self) -> usize {
        self.sessions.session_count()
    }

    /// Get snapshots of all active sessions
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.sessions.sessions()
    }

    /// Get a snapshot of the server state
    pub fn snapshot(&self) -> ServerSnapshot {
        let uptime = self
            .lock_lifecycle()
            .started_at
            .map(|at| at.elapsed())
            .unwrap_or_default();

        ServerSnapshot {
            running: self.is_running(),
            channel_name: self.config.channel_name.clone(),
            max_acceptors: self.config.max_acceptors,
            active_sessions: self.sessions.session_count(),
            total_sessions: self.metrics.total_sessions(),
            uptime,
        }
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl<T: Transport> PipeServer<T> {
    /// Run `start` on a background task
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<bool> {
        let server = self.clone();
        tokio::spawn(async move { server.start().await })
    }
}

/// Ends the run if `start` is abandoned before it returns
struct RunGuard<'a, T: Transport> {
    server: &'a PipeServer<T>,
    generation: u64,
}

impl<T: Transport> Drop for RunGuard<'_, T> {
    fn drop(&mut self) {
        self.server.finish_run(self.generation);
    }
}

impl<T: Transport> std::fmt::Debug for PipeServer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeServer")
            .field("channel", &self.config.channel_name)
            .field("running", &self.is_running())
            .field("session_count", &self.session_count())
            .finish()
    }
}

// Last-resort cleanup; `stop` is the primary path
impl<T: Transport> Drop for PipeServer<T> {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("PipeServer dropped while still running");
        }
        self.stop();
    }
}
