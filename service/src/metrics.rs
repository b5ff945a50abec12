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

//! Lock-free metrics for the pipe server
//!
//! Every update is mirrored to the `metrics` facade under `pipehost.*` so an
//! installed recorder sees the same numbers as [`ServerMetrics::snapshot`].

use metrics::{counter, gauge, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free server metrics
///
/// All metrics are stored as atomics and can be accessed concurrently
/// without locks. Use the `snapshot()` method to get a view of all metrics
/// at a point in time.
#[derive(Debug)]
pub struct ServerMetrics {
    // Session counts
    total_sessions: AtomicU64,
    active_sessions: AtomicU64,

    // Throughput
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,

    // Errors
    accept_errors: AtomicU64,
    session_errors: AtomicU64,

    // Timing (stored as nanoseconds)
    total_session_duration_ns: AtomicU64,

    created_at: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_sessions: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            accept_errors: AtomicU64::new(0),
            session_errors: AtomicU64::new(0),
            total_session_duration_ns: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    // Session tracking

    /// Record a peer connecting
    pub fn session_opened(&self) {
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        counter!("pipehost.sessions.total").increment(1);
        gauge!("pipehost.sessions.active").increment(1.0);
    }

    /// Record a session ending
    pub fn session_closed(&self, duration: Duration) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
        self.total_session_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        gauge!("pipehost.sessions.active").decrement(1.0);
        histogram!("pipehost.session.duration").record(duration.as_secs_f64());
    }

    /// Get the current number of active sessions
    pub fn active_sessions(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Get the total number of sessions since creation
    pub fn total_sessions(&self) -> u64 {
        self.total_sessions.load(Ordering::Relaxed)
    }

    // Throughput tracking

    /// Record a message read from a peer
    pub fn message_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        counter!("pipehost.messages.received").increment(1);
        counter!("pipehost.bytes.received").increment(bytes as u64);
    }

    /// Record a response written to a peer
    pub fn message_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        counter!("pipehost.messages.sent").increment(1);
        counter!("pipehost.bytes.sent").increment(bytes as u64);
    }

    // Error tracking

    /// Record a failure while waiting for a peer
    pub fn accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
        counter!("pipehost.errors.accept").increment(1);
    }

    /// Record a failure inside a session or its teardown
    pub fn session_error(&self) {
        self.session_errors.fetch_add(1, Ordering::Relaxed);
        counter!("pipehost.errors.session").increment(1);
    }

    // Snapshot

    /// Get a snapshot of all metrics
    ///
    /// The snapshot may not be perfectly consistent if metrics are being
    /// updated concurrently.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
            session_errors: self.session_errors.load(Ordering::Relaxed),
            uptime: self.created_at.elapsed(),
            avg_session_duration: self.average_session_duration(),
        }
    }

    fn average_session_duration(&self) -> Duration {
        let total = self.total_sessions.load(Ordering::Relaxed);
        let active = self.active_sessions.load(Ordering::Relaxed);
        let closed = total.saturating_sub(active);
        if closed == 0 {
            return Duration::ZERO;
        }
        let total_ns = self.total_session_duration_ns.load(Ordering::Relaxed);
        Duration::from_nanos(total_ns / closed)
    }
}

/// A snapshot of server metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Total sessions since creation
    pub total_sessions: u64,
    /// Current active sessions
    pub active_sessions: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Total responses sent
    pub messages_sent: u64,
    /// Total messages received
    pub messages_received: u64,
    /// Total accept failures
    pub accept_errors: u64,
    /// Total session failures
    pub session_errors: u64,
    /// Time since the metrics were created
    pub uptime: Duration,
    /// Average duration of closed sessions
    pub avg_session_duration: Duration,
}

impl MetricsSnapshot {
    /// Calculate total error count
    pub fn total_errors(&self) -> u64 {
        self.accept_errors + self.session_errors
    }

    /// Calculate messages per second (received)
    pub fn messages_received_per_sec(&self) -> f64 {
        if self.uptime.is_zero() {
            return 0.0;
        }
        self.messages_received as f64 / self.uptime.as_secs_f64()
    }
}
