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

//! Core types for the pipe server

use std::fmt;
use std::time::{Duration, Instant};

/// Unique identifier for a session (monotonically increasing, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a new session ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Index of an acceptor slot (0..max_acceptors)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AcceptorId(usize);

impl AcceptorId {
    /// Create a new acceptor ID
    pub fn new(slot: usize) -> Self {
        Self(slot)
    }

    /// Get the slot index
    pub fn slot(&self) -> usize {
        self.0
    }
}

impl fmt::Display for AcceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acceptor-{}", self.0)
    }
}

/// How a session loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closed the channel (zero-byte read or transport already ended)
    PeerClosed,
    /// Server cancellation was observed
    Cancelled,
    /// An error was reported and the session was abandoned
    Failed,
}

impl SessionEnd {
    /// Check if the peer should be reported as disconnected
    pub fn reports_disconnect(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Session information snapshot (for non-blocking queries)
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Session ID
    pub id: SessionId,
    /// Acceptor slot serving the session
    pub acceptor: AcceptorId,
    /// When the peer connected
    pub connected_at: Instant,
    /// Total bytes received from the peer
    pub bytes_received: u64,
    /// Total bytes sent to the peer
    pub bytes_sent: u64,
    /// Messages processed
    pub messages: u64,
}

impl SessionInfo {
    /// Get the session duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Server snapshot for non-blocking debug information
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    /// Whether the server is running
    pub running: bool,
    /// Channel name the server serves
    pub channel_name: String,
    /// Number of acceptor slots
    pub max_acceptors: usize,
    /// Number of active sessions
    pub active_sessions: usize,
    /// Total sessions since the server was created
    pub total_sessions: u64,
    /// Time since the current run started (zero when stopped)
    pub uptime: Duration,
}

impl fmt::Display for ServerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipeServer {{ channel: {}, running: {}, active: {}/{}, total: {}, uptime: {:?} }}",
            self.channel_name,
            self.running,
            self.active_sessions,
            self.max_acceptors,
            self.total_sessions,
            self.uptime
        )
    }
}
