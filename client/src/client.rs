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

//! Pipe client implementation

use crate::{ClientConfig, ClientError, Result};
use pipehost_service::{channel_endpoint, validate_channel_name};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, instrument};

#[cfg(unix)]
type ClientStream = tokio::net::UnixStream;

#[cfg(windows)]
type ClientStream = tokio::net::windows::named_pipe::NamedPipeClient;

/// A connection to a pipe server
///
/// # Example
///
/// ```no_run
/// use pipehost_client::PipeClient;
///
/// # async fn example() -> pipehost_client::Result<()> {
/// let mut client = PipeClient::connect("STAAD_HELPER_PIPE").await?;
/// let response = client.request("ping").await?;
/// println!("{response}");
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PipeClient {
    stream: ClientStream,
    buffer: Vec<u8>,
    config: ClientConfig,
}

impl PipeClient {
    /// Connect to `channel_name` with default settings
    pub async fn connect(channel_name: &str) -> Result<Self> {
        Self::connect_with(ClientConfig::new(channel_name)).await
    }

    /// Connect using an explicit configuration
    ///
    /// Waits (up to `connect_timeout`) while every server slot is busy.
    #[instrument(skip(config), fields(channel = %config.channel_name))]
    pub async fn connect_with(config: ClientConfig) -> Result<Self> {
        validate_channel_name(&config.channel_name)?;

        let stream = timeout(config.connect_timeout, open(&config))
            .await
            .map_err(|_| ClientError::ConnectionTimeout)??;
        debug!("Connected");

        Ok(Self {
            stream,
            buffer: vec![0u8; config.buffer_size.max(1)],
            config,
        })
    }

    /// Send one message
    pub async fn send(&mut self, message: &str) -> Result<()> {
        self.stream
            .write_all(message.as_bytes())
            .await
            .map_err(ClientError::from_transfer)?;
        self.stream.flush().await.map_err(ClientError::from_transfer)
    }

    /// Read one response
    pub async fn receive(&mut self) -> Result<String> {
        let read = match self.config.read_timeout {
            Some(limit) => timeout(limit, self.stream.read(&mut self.buffer))
                .await
                .map_err(|_| ClientError::ReadTimeout)?,
            None => self.stream.read(&mut self.buffer).await,
        }
        .map_err(ClientError::from_transfer)?;

        if read == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(String::from_utf8_lossy(&self.buffer[..read]).into_owned())
    }

    /// Send one message and wait for its response
    pub async fn request(&mut self, message: &str) -> Result<String> {
        self.send(message).await?;
        self.receive().await
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        match self.stream.shutdown().await {
            Err(e) if !pipehost_service::is_disconnect_io(&e) => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[cfg(unix)]
async fn open(config: &ClientConfig) -> Result<ClientStream> {
    let path = channel_endpoint(&config.channel_name);
    tokio::net::UnixStream::connect(&path)
        .await
        .map_err(|e| ClientError::from_connect(&config.channel_name, e))
}

#[cfg(windows)]
async fn open(config: &ClientConfig) -> Result<ClientStream> {
    use tokio::net::windows::named_pipe::ClientOptions;

    /// Windows `ERROR_PIPE_BUSY`
    const ERROR_PIPE_BUSY: i32 = 231;

    let pipe_name = channel_endpoint(&config.channel_name);
    loop {
        match ClientOptions::new().open(&pipe_name) {
            Ok(client) => return Ok(client),
            Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {
                debug!("All pipe instances busy, retrying");
            }
            Err(e) => return Err(ClientError::from_connect(&config.channel_name, e)),
        }
        tokio::time::sleep(config.busy_retry_delay).await;
    }
}
