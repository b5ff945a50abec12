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

//! # Pipehost Client
//!
//! Peer-side counterpart of `pipehost-service`: connect to a named local
//! channel, send a message, read the response.
//!
//! The protocol has no framing. One write is one message and one read is
//! one response, bounded by the buffer size on both sides.
//!
//! ```no_run
//! use pipehost_client::{ClientConfig, PipeClient};
//! use std::time::Duration;
//!
//! # async fn example() -> pipehost_client::Result<()> {
//! let config = ClientConfig::new("STAAD_HELPER_PIPE")
//!     .with_read_timeout(Some(Duration::from_secs(5)));
//! let mut client = PipeClient::connect_with(config).await?;
//! assert!(client.request("ping").await?.starts_with("Echo: ping"));
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;

pub use client::PipeClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
