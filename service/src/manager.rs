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

//! Session manager
//!
//! The SessionManager is responsible for:
//! - Assigning session IDs
//! - Tracking the sessions that are currently being served
//! - Per-session and server-wide accounting
//!
//! Registration hands out a [`SessionGuard`]; the session stays listed until
//! the guard is dropped, on every exit path.

use crate::{AcceptorId, ServerMetrics, SessionId, SessionInfo};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Per-session counters shared between the guard and the registry
#[derive(Debug, Default)]
struct SessionCounters {
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    messages: AtomicU64,
}

/// Registry entry
#[derive(Debug)]
struct TrackedSession {
    acceptor: AcceptorId,
    connected_at: Instant,
    counters: Arc<SessionCounters>,
}

impl TrackedSession {
    fn info(&self, id: SessionId) -> SessionInfo {
        SessionInfo {
            id,
            acceptor: self.acceptor,
            connected_at: self.connected_at,
            bytes_received: self.counters.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.counters.bytes_sent.load(Ordering::Relaxed),
            messages: self.counters.messages.load(Ordering::Relaxed),
        }
    }
}

/// Session manager
#[derive(Debug)]
pub struct SessionManager {
    /// Active sessions (lock-free concurrent map)
    sessions: DashMap<SessionId, TrackedSession>,
    /// Next session ID (monotonically increasing)
    next_id: AtomicU64,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            metrics,
        }
    }

    fn next_session_id(&self) -> SessionId {
        SessionId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Register a newly connected peer served by `acceptor`
    pub fn register(self: &Arc<Self>, acceptor: AcceptorId) -> SessionGuard {
        let id = self.next_session_id();
        let counters = Arc::new(SessionCounters::default());
        let connected_at = Instant::now();

        self.sessions.insert(
            id,
            TrackedSession {
                acceptor,
                connected_at,
                counters: counters.clone(),
            },
        );
        self.metrics.session_opened();
        tracing::debug!(session_id = %id, %acceptor, "Session registered");

        SessionGuard {
            id,
            connected_at,
            counters,
            manager: self.clone(),
        }
    }

    /// Get the number of active sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Get a snapshot of one active session
    pub fn session_info(&self, id: SessionId) -> Option<SessionInfo> {
        self.sessions.get(&id).map(|entry| entry.info(id))
    }

    /// Get snapshots of all active sessions, ordered by ID
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|entry| entry.value().info(*entry.key()))
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Get the server metrics
    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }
}

/// Scoped registration of one session
///
/// Dropping the guard removes the session from the manager and records its
/// duration.
#[derive(Debug)]
pub struct SessionGuard {
    id: SessionId,
    connected_at: Instant,
    counters: Arc<SessionCounters>,
    manager: Arc<SessionManager>,
}

impl SessionGuard {
    /// Get the session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Record a message read from the peer
    pub fn record_received(&self, bytes: usize) {
        self.counters
            .bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.counters.messages.fetch_add(1, Ordering::Relaxed);
        self.manager.metrics.message_received(bytes);
    }

    /// Record a response written to the peer
    pub fn record_sent(&self, bytes: usize) {
        self.counters
            .bytes_sent
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.manager.metrics.message_sent(bytes);
    }

    /// Record a failure inside the session
    pub fn record_error(&self) {
        self.manager.metrics.session_error();
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.manager.sessions.remove(&self.id);
        self.manager
            .metrics
            .session_closed(self.connected_at.elapsed());
        tracing::debug!(session_id = %self.id, "Session released");
    }
}
