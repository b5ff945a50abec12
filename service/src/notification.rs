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

//! Notification surface
//!
//! Every component of the server reports what it is doing through a shared
//! [`NotificationHub`]. Delivery is fan-out and fire-and-forget: publishing
//! never waits on a subscriber, and a subscriber that falls behind loses the
//! oldest notifications instead of slowing the server down.

use crate::types::{AcceptorId, SessionId};
use enum_kinds::EnumKind;
use std::fmt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Default number of notifications buffered per subscriber
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// Server lifecycle states reported through [`Notification::StatusChanged`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerStatus {
    /// Acceptors were launched
    Started {
        /// Channel being served
        channel: String,
        /// Number of acceptor loops
        acceptors: usize,
    },
    /// `start` was called on a running server
    AlreadyRunning,
    /// An acceptor created its endpoint and is waiting for a peer
    WaitingForConnection {
        /// The waiting acceptor
        acceptor: AcceptorId,
    },
    /// The server stopped
    Stopped,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { channel, acceptors } => {
                write!(f, "started on {channel} with {acceptors} acceptor(s)")
            }
            Self::AlreadyRunning => write!(f, "already running"),
            Self::WaitingForConnection { acceptor } => {
                write!(f, "{acceptor} waiting for connection")
            }
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Server notifications
#[derive(Clone, Debug, PartialEq, Eq, EnumKind)]
#[enum_kind(NotificationKind, derive(Hash))]
pub enum Notification {
    /// A message was read from a peer
    MessageReceived {
        /// Session the message arrived on
        session: SessionId,
        /// Decoded message text
        message: String,
    },
    /// A peer connected
    ClientConnected {
        /// The new session
        session: SessionId,
    },
    /// A peer disconnected
    ClientDisconnected {
        /// The ended session
        session: SessionId,
    },
    /// Something failed; the owning loop carried on
    ErrorOccurred {
        /// Session the error belongs to, if any
        session: Option<SessionId>,
        /// Error description
        error: String,
    },
    /// Server lifecycle change
    StatusChanged(ServerStatus),
}

impl Notification {
    /// Get the kind of this notification
    pub fn kind(&self) -> NotificationKind {
        NotificationKind::from(self)
    }

    /// Render the notification payload as text
    pub fn payload(&self) -> String {
        match self {
            Self::MessageReceived { message, .. } => message.clone(),
            Self::ClientConnected { session } | Self::ClientDisconnected { session } => {
                session.to_string()
            }
            Self::ErrorOccurred {
                session: Some(session),
                error,
            } => format!("{session}: {error}"),
            Self::ErrorOccurred {
                session: None,
                error,
            } => error.clone(),
            Self::StatusChanged(status) => status.to_string(),
        }
    }

    /// Build an error notification from anything displayable
    pub fn error(session: Option<SessionId>, error: impl fmt::Display) -> Self {
        Self::ErrorOccurred {
            session,
            error: error.to_string(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind(), self.payload())
    }
}

/// Fan-out publisher for [`Notification`]s
///
/// Cloning the hub yields another handle to the same subscriber set.
#[derive(Clone, Debug)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}

impl NotificationHub {
    /// Create a hub buffering up to `capacity` notifications per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a notification to all current subscribers
    ///
    /// Never blocks. Publishing with no subscribers is not an error.
    pub fn publish(&self, notification: Notification) {
        tracing::trace!(%notification, "Publishing notification");
        let _ = self.sender.send(notification);
    }

    /// Attach a new subscriber
    ///
    /// The receiver sees every notification published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Attach a callback subscriber
    ///
    /// The callback runs on its own task, so a slow or panicking callback
    /// only affects itself. The task ends when every hub handle is dropped
    /// or the returned handle is aborted. Must be called within a Tokio
    /// runtime.
    pub fn subscribe_with<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(notification) => callback(notification),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Notification subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Get the number of attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_notification_kind() {
        let notification = Notification::ClientConnected {
            session: SessionId::new(1),
        };
        assert_eq!(notification.kind(), NotificationKind::ClientConnected);

        let notification = Notification::StatusChanged(ServerStatus::Stopped);
        assert_eq!(notification.kind(), NotificationKind::StatusChanged);
    }

    #[test]
    fn test_notification_payload() {
        let notification = Notification::MessageReceived {
            session: SessionId::new(1),
            message: "ping".to_string(),
        };
        assert_eq!(notification.payload(), "ping");

        let notification = Notification::StatusChanged(ServerStatus::Stopped);
        assert_eq!(notification.payload(), "stopped");

        let notification = Notification::error(Some(SessionId::new(4)), "write failed");
        assert_eq!(notification.payload(), "session-4: write failed");
        assert_eq!(
            notification.to_string(),
            "[ErrorOccurred] session-4: write failed"
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = NotificationHub::default();
        assert_eq!(hub.subscriber_count(), 0);
        hub.publish(Notification::StatusChanged(ServerStatus::AlreadyRunning));
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let hub = NotificationHub::default();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        hub.publish(Notification::ClientConnected {
            session: SessionId::new(9),
        });

        let expected = Notification::ClientConnected {
            session: SessionId::new(9),
        };
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_block_publisher() {
        let hub = NotificationHub::new(4);
        let mut slow = hub.subscribe();

        for i in 0..16 {
            hub.publish(Notification::ClientConnected {
                session: SessionId::new(i),
            });
        }

        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert!(slow.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_subscribe_with_callback() {
        let hub = NotificationHub::default();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handle = hub.subscribe_with(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        hub.publish(Notification::StatusChanged(ServerStatus::Stopped));
        hub.publish(Notification::StatusChanged(ServerStatus::Stopped));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        handle.abort();
    }

    #[tokio::test]
    async fn test_panicking_callback_is_isolated() {
        let hub = NotificationHub::default();
        let handle = hub.subscribe_with(|_| panic!("subscriber failure"));
        let mut healthy = hub.subscribe();

        hub.publish(Notification::StatusChanged(ServerStatus::Stopped));
        assert!(handle.await.unwrap_err().is_panic());

        hub.publish(Notification::StatusChanged(ServerStatus::AlreadyRunning));
        assert_eq!(
            healthy.recv().await.unwrap(),
            Notification::StatusChanged(ServerStatus::Stopped)
        );
        assert_eq!(
            healthy.recv().await.unwrap(),
            Notification::StatusChanged(ServerStatus::AlreadyRunning)
        );
    }
}
