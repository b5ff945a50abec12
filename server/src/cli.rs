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

//! Command line interface

use clap::Parser;
use pipehost_service::{DEFAULT_CHANNEL_NAME, DEFAULT_RECONNECT_DELAY, ServerConfig};
use std::time::Duration;

/// Local named-channel IPC host
#[derive(Debug, Parser)]
#[command(name = "pipehost", version, about)]
pub struct Cli {
    /// Channel to serve (or connect to with --send)
    #[arg(short, long, default_value = DEFAULT_CHANNEL_NAME)]
    pub channel: String,

    /// Number of concurrent acceptor loops
    #[arg(short, long, default_value_t = 1)]
    pub acceptors: usize,

    /// Pause between accept attempts, in milliseconds
    #[arg(long, default_value_t = DEFAULT_RECONNECT_DELAY.as_millis() as u64)]
    pub reconnect_delay_ms: u64,

    /// Log filter directive, e.g. `info` or `pipehost_service=debug`
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Act as a peer: send one message to a running server, print the response and exit
    #[arg(long, value_name = "TEXT")]
    pub send: Option<String>,
}

impl Cli {
    /// Build the server configuration from the parsed flags
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.channel.clone())
            .with_max_acceptors(self.acceptors)
            .with_reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
    }
}
