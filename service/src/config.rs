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

//! Server configuration

use crate::{PipeError, Result};
use std::path::Path;
use std::time::Duration;

/// Channel name used when none is configured
pub const DEFAULT_CHANNEL_NAME: &str = "STAAD_HELPER_PIPE";

/// Size of the per-session receive buffer; one read is one message
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Pause between a session ending and the acceptor waiting again
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(100);

/// Upper bound on simultaneous listeners for one channel name
///
/// This is the named-pipe instance limit on Windows and is applied on every
/// platform so behaviour does not depend on the host.
pub const MAX_ACCEPTORS: usize = 254;

/// Server configuration
///
/// Use the builder pattern methods to customize the configuration.
///
/// # Example
///
/// ```
/// use pipehost_service::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::new("MY_APP_PIPE")
///     .with_max_acceptors(4)
///     .with_reconnect_delay(Duration::from_millis(50));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Name of the local channel to serve
    ///
    /// A plain name maps to `\\.\pipe\<name>` on Windows and to
    /// `<tmpdir>/<name>.sock` on Unix. An absolute path is used as the Unix
    /// socket path as-is.
    pub channel_name: String,

    /// Number of acceptor loops, and therefore of concurrent sessions
    pub max_acceptors: usize,

    /// Delay before an acceptor waits for its next peer
    pub reconnect_delay: Duration,

    /// Receive buffer size per session
    pub buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            max_acceptors: 1,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration for the given channel
    ///
    /// All other settings will use their default values.
    pub fn new(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            ..Default::default()
        }
    }

    /// Set the number of acceptor loops, clamped to `1..=MAX_ACCEPTORS`
    pub fn with_max_acceptors(mut self, max: usize) -> Self {
        self.max_acceptors = max.clamp(1, MAX_ACCEPTORS);
        self
    }

    /// Set the delay between a session ending and the next accept
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the per-session receive buffer size
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Bring range-limited settings into range
    ///
    /// Clamps `max_acceptors` to `1..=MAX_ACCEPTORS`, as
    /// [`ServerConfig::with_max_acceptors`] does.
    pub fn normalized(mut self) -> Self {
        self.max_acceptors = self.max_acceptors.clamp(1, MAX_ACCEPTORS);
        self
    }

    /// Validate the configuration
    ///
    /// Returns an error if the configuration is invalid. Out-of-range
    /// acceptor counts are not errors; see [`ServerConfig::normalized`].
    pub fn validate(&self) -> Result<()> {
        validate_channel_name(&self.channel_name)?;

        if self.buffer_size == 0 {
            return Err(PipeError::InvalidConfig(
                "buffer_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Check that a channel name can identify a local endpoint
pub fn validate_channel_name(name: &str) -> Result<()> {
    let reject = |reason| {
        Err(PipeError::InvalidChannelName {
            name: name.to_string(),
            reason,
        })
    };

    if name.trim().is_empty() {
        return reject("must not be empty");
    }
    if name.contains('\0') {
        return reject("must not contain NUL bytes");
    }
    if (name.contains('/') || name.contains('\\')) && !Path::new(name).is_absolute() {
        return reject("must be a plain name or an absolute path");
    }
    Ok(())
}
