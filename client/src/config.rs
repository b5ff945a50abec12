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

//! Client configuration

use pipehost_service::{DEFAULT_BUFFER_SIZE, DEFAULT_CHANNEL_NAME};
use std::time::Duration;

/// Pipe client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Channel to connect to
    pub channel_name: String,

    /// Connection timeout, including waiting for a free server slot
    pub connect_timeout: Duration,

    /// Read timeout for a response (None for no timeout)
    pub read_timeout: Option<Duration>,

    /// Pause between attempts while every server instance is busy
    pub busy_retry_delay: Duration,

    /// Receive buffer size; one read is one response
    pub buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: None,
            busy_retry_delay: Duration::from_millis(50),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given channel
    pub fn new(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            ..Default::default()
        }
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the response read timeout
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the delay between attempts while the server is busy
    pub fn with_busy_retry_delay(mut self, delay: Duration) -> Self {
        self.busy_retry_delay = delay;
        self
    }

    /// Set the buffer size
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}
