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

//! Connection acceptor implementation
//!
//! Each acceptor owns one slot of the server's concurrency budget and serves
//! at most one peer at a time:
//!
//! ```text
//! loop {
//!     accept()  →  ClientSession::run()  →  release()  →  reconnect delay
//! }
//! ```
//!
//! Failures are reported and the loop carries on. Only cancellation ends it.

use crate::manager::SessionManager;
use crate::{
    AcceptorId, ClientSession, MessageProcessor, Notification, NotificationHub, PipeListener,
    ServerStatus, SessionEnd, is_disconnect_io,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Everything an acceptor shares with its siblings
pub struct AcceptorContext<L> {
    /// Bound channel
    pub listener: Arc<L>,
    /// Response producer
    pub processor: Arc<dyn MessageProcessor>,
    /// Notification surface
    pub notifications: NotificationHub,
    /// Session registry
    pub sessions: Arc<SessionManager>,
    /// Shared cancellation signal for this run of the server
    pub cancel: CancellationToken,
    /// Receive buffer size per session
    pub buffer_size: usize,
    /// Pause after each session before accepting again
    pub reconnect_delay: Duration,
}

impl<L> Clone for AcceptorContext<L> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
            processor: self.processor.clone(),
            notifications: self.notifications.clone(),
            sessions: self.sessions.clone(),
            cancel: self.cancel.clone(),
            buffer_size: self.buffer_size,
            reconnect_delay: self.reconnect_delay,
        }
    }
}

/// One accept loop
pub struct ConnectionAcceptor<L> {
    id: AcceptorId,
    context: AcceptorContext<L>,
}

impl<L: PipeListener> ConnectionAcceptor<L> {
    /// Create the acceptor for slot `id`
    pub fn new(id: AcceptorId, context: AcceptorContext<L>) -> Self {
        Self { id, context }
    }

    /// Get the acceptor ID
    pub fn id(&self) -> AcceptorId {
        self.id
    }

    /// Run the accept loop until the shared token is cancelled
    #[instrument(skip_all, fields(acceptor = %self.id))]
    pub async fn run(self) {
        let cancel = self.context.cancel.clone();

        while !cancel.is_cancelled() {
            self.context
                .notifications
                .publish(Notification::StatusChanged(ServerStatus::WaitingForConnection {
                    acceptor: self.id,
                }));

            let accepted = select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.context.listener.accept() => result,
            };

            match accepted {
                Ok(stream) => self.serve(stream).await,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    self.context.sessions.metrics().accept_error();
                    self.context
                        .notifications
                        .publish(Notification::error(None, format!("accept failed: {e}")));
                }
            }

            if !self.pause(&cancel).await {
                break;
            }
        }

        debug!("Accept loop terminated");
    }

    /// Serve one connected peer to completion and release the endpoint
    async fn serve(&self, stream: L::Stream) {
        let guard = self.context.sessions.register(self.id);
        let id = guard.id();
        info!(session_id = %id, "Client connected");
        self.context
            .notifications
            .publish(Notification::ClientConnected { session: id });

        let mut session = ClientSession::new(
            guard,
            stream,
            self.context.buffer_size,
            self.context.processor.clone(),
            self.context.notifications.clone(),
        );
        let end = session.run(&self.context.cancel).await;
        let (guard, stream) = session.into_parts();

        if let Err(e) = self.context.listener.release(stream).await {
            if end != SessionEnd::Cancelled && !is_disconnect_io(&e) {
                warn!(session_id = %id, error = %e, "Failed to release connection");
                guard.record_error();
                self.context
                    .notifications
                    .publish(Notification::error(Some(id), format!("disconnect failed: {e}")));
            }
        }
        drop(guard);

        if end.reports_disconnect() {
            info!(session_id = %id, %end, "Client disconnected");
            self.context
                .notifications
                .publish(Notification::ClientDisconnected { session: id });
        }
    }

    /// Wait out the reconnect delay; false if cancelled meanwhile
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = sleep(self.context.reconnect_delay) => true,
        }
    }
}

impl<L> std::fmt::Debug for ConnectionAcceptor<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionAcceptor")
            .field("id", &self.id)
            .field("cancelled", &self.context.cancel.is_cancelled())
            .finish()
    }
}
