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

//! Client session implementation
//!
//! A ClientSession drives one connected peer through a strictly sequential
//! exchange:
//! - Read up to one buffer of bytes (one read is one message)
//! - Decode as UTF-8 and report the message
//! - Ask the processor for a response
//! - Write and flush the response before reading again
//!
//! The loop observes the server's cancellation token at every suspension
//! point and never reports cancellation as an error.

use crate::manager::SessionGuard;
use crate::{MessageProcessor, Notification, NotificationHub, PipeError, Result, SessionEnd, SessionId};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace};

/// One accepted connection and its receive buffer
pub struct ClientSession<S> {
    guard: SessionGuard,
    stream: S,
    buffer: Box<[u8]>,
    processor: Arc<dyn MessageProcessor>,
    notifications: NotificationHub,
}

impl<S> ClientSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create a session for a connected stream
    pub fn new(
        guard: SessionGuard,
        stream: S,
        buffer_size: usize,
        processor: Arc<dyn MessageProcessor>,
        notifications: NotificationHub,
    ) -> Self {
        Self {
            guard,
            stream,
            buffer: vec![0u8; buffer_size.max(1)].into_boxed_slice(),
            processor,
            notifications,
        }
    }

    /// Get the session ID
    pub fn id(&self) -> SessionId {
        self.guard.id()
    }

    /// Run the session until the peer leaves, an error occurs, or `cancel`
    /// fires
    ///
    /// Errors are reported through the notification hub here; the caller
    /// only learns how the session ended.
    #[instrument(skip_all, fields(session_id = %self.guard.id()))]
    pub async fn run(&mut self, cancel: &CancellationToken) -> SessionEnd {
        match self.message_loop(cancel).await {
            Ok(end) => {
                debug!(%end, "Session loop finished");
                end
            }
            Err(PipeError::Cancelled) => SessionEnd::Cancelled,
            Err(e) if e.is_disconnect() => {
                debug!(error = %e, "Peer channel already ended");
                SessionEnd::PeerClosed
            }
            Err(e) => {
                error!(error = %e, "Session failed");
                self.guard.record_error();
                self.notifications
                    .publish(Notification::error(Some(self.guard.id()), &e));
                SessionEnd::Failed
            }
        }
    }

    async fn message_loop(&mut self, cancel: &CancellationToken) -> Result<SessionEnd> {
        let id = self.guard.id();
        loop {
            let read = select! {
                biased;
                _ = cancel.cancelled() => return Err(PipeError::Cancelled),
                result = self.stream.read(&mut self.buffer) => result?,
            };

            if read == 0 {
                return Ok(SessionEnd::PeerClosed);
            }
            self.guard.record_received(read);

            let message = String::from_utf8_lossy(&self.buffer[..read]).into_owned();
            trace!(bytes = read, "Message received");
            self.notifications.publish(Notification::MessageReceived {
                session: id,
                message: message.clone(),
            });

            let response = select! {
                biased;
                _ = cancel.cancelled() => return Err(PipeError::Cancelled),
                result = self.processor.process(id, &message) => result?,
            };

            self.respond(response.as_bytes(), cancel).await?;
        }
    }

    /// Write one response and flush it before the next read
    async fn respond(&mut self, response: &[u8], cancel: &CancellationToken) -> Result<()> {
        let stream = &mut self.stream;
        select! {
            biased;
            _ = cancel.cancelled() => return Err(PipeError::Cancelled),
            result = async {
                stream.write_all(response).await?;
                stream.flush().await
            } => result?,
        }
        self.guard.record_sent(response.len());
        trace!(bytes = response.len(), "Response sent");
        Ok(())
    }

    /// Split the session into its registration and stream for teardown
    pub fn into_parts(self) -> (SessionGuard, S) {
        (self.guard, self.stream)
    }
}

impl<S> std::fmt::Debug for ClientSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.guard.id())
            .field("buffer_size", &self.buffer.len())
            .finish()
    }
}
