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

//! Error types for the pipe server

use crate::types::SessionId;
use std::io;
use thiserror::Error;

/// Result type for operations
pub type Result<T> = std::result::Result<T, PipeError>;

/// Windows `ERROR_BROKEN_PIPE`
const ERROR_BROKEN_PIPE: i32 = 109;
/// Windows `ERROR_NO_DATA` (the pipe is being closed)
const ERROR_NO_DATA: i32 = 232;
/// Windows `ERROR_PIPE_NOT_CONNECTED`
const ERROR_PIPE_NOT_CONNECTED: i32 = 233;

/// Pipe server error types
#[derive(Debug, Error)]
pub enum PipeError {
    /// I/O error from the underlying channel
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Channel name rejected during validation
    #[error("Invalid channel name {name:?}: {reason}")]
    InvalidChannelName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Configuration rejected during validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Listening endpoint could not be created
    #[error("Failed to bind channel {channel:?}: {source}")]
    Bind {
        /// Channel that was being bound
        channel: String,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// Server is already running
    #[error("Server already running")]
    AlreadyRunning,

    /// Server is not running
    #[error("Server not running")]
    NotRunning,

    /// Message processor failed for a session
    #[error("Processor failed on {session}: {message}")]
    Processor {
        /// Session the message belonged to
        session: SessionId,
        /// Failure description
        message: String,
    },

    /// Operation was cancelled by server shutdown
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic error with a message
    #[error("{0}")]
    Other(String),
}

impl PipeError {
    /// Check if the error means the peer's end of the channel is already gone
    ///
    /// Classification uses the structured error kind and, for named pipes,
    /// the raw OS error code. The message text is never inspected.
    pub fn is_disconnect(&self) -> bool {
        match self {
            PipeError::Io(e) => is_disconnect_io(e),
            _ => false,
        }
    }

    /// Check if the error is recoverable
    ///
    /// Recoverable errors end at most one session; the owning acceptor keeps
    /// accepting new peers afterwards.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipeError::Io(_) | PipeError::Processor { .. } | PipeError::Cancelled
        )
    }

    /// Check if the error came from server setup rather than a session
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            PipeError::InvalidChannelName { .. }
                | PipeError::InvalidConfig(_)
                | PipeError::Bind { .. }
        )
    }
}

/// Check if an I/O error means the transport has already ended
pub fn is_disconnect_io(error: &io::Error) -> bool {
    if matches!(
        error.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    ) {
        return true;
    }
    matches!(
        error.raw_os_error(),
        Some(ERROR_BROKEN_PIPE | ERROR_NO_DATA | ERROR_PIPE_NOT_CONNECTED)
    ) && cfg!(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_disconnect() {
        let err = PipeError::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(err.is_disconnect());

        let err = PipeError::from(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(err.is_disconnect());

        let err = PipeError::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!err.is_disconnect());

        assert!(!PipeError::Cancelled.is_disconnect());
    }

    #[test]
    fn test_disconnect_ignores_message_text() {
        let err = io::Error::other("pipe has been ended");
        assert!(!is_disconnect_io(&err));
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(PipeError::Cancelled.is_recoverable());
        assert!(PipeError::Io(io::Error::other("boom")).is_recoverable());
        assert!(!PipeError::AlreadyRunning.is_recoverable());
        assert!(!PipeError::InvalidConfig("x".to_string()).is_recoverable());
    }

    #[test]
    fn test_error_is_setup_error() {
        let err = PipeError::InvalidChannelName {
            name: String::new(),
            reason: "must not be empty",
        };
        assert!(err.is_setup_error());
        assert!(!PipeError::NotRunning.is_setup_error());
    }

    #[test]
    fn test_error_display() {
        let err = PipeError::Processor {
            session: SessionId::new(7),
            message: "bad command".to_string(),
        };
        assert_eq!(err.to_string(), "Processor failed on session-7: bad command");

        let err = PipeError::InvalidChannelName {
            name: String::new(),
            reason: "must not be empty",
        };
        assert_eq!(err.to_string(), "Invalid channel name \"\": must not be empty");
    }
}
