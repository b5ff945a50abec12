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

//! Client error types

use std::io;
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Channel name is not usable
    #[error("Invalid channel: {0}")]
    InvalidChannel(#[from] pipehost_service::PipeError),

    /// Nobody is serving the channel
    #[error("Channel {0:?} is not being served")]
    ChannelNotFound(String),

    /// Connecting took longer than the configured timeout
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// No response arrived within the configured timeout
    #[error("Read timeout")]
    ReadTimeout,

    /// Connection closed by server
    #[error("Connection closed by server")]
    ConnectionClosed,
}

impl ClientError {
    /// Classify an I/O error raised while opening `channel`
    pub(crate) fn from_connect(channel: &str, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => {
                Self::ChannelNotFound(channel.to_string())
            }
            _ => Self::Io(error),
        }
    }

    /// Classify an I/O error raised on an open connection
    pub(crate) fn from_transfer(error: io::Error) -> Self {
        if pipehost_service::is_disconnect_io(&error) {
            Self::ConnectionClosed
        } else {
            Self::Io(error)
        }
    }
}

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;
