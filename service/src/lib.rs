//
// Copyright 2017-2025 Hans W. Uhlig. All Rights Reserved.
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

//! Named-Channel IPC Server
//!
//! This crate serves a local, named byte-stream channel (a named pipe on
//! Windows, a Unix domain socket elsewhere) with a sequential
//! request/response exchange per connected peer:
//!
//! - Up to `max_acceptors` peers are served concurrently
//! - One read is one message; each message gets exactly one response
//! - A single cancellation token stops every loop cooperatively
//! - Everything observable is published as a [`Notification`]
//!
//! # Architecture
//!
//! ```text
//! PipeServer
//!     ↓ (one per slot)
//! ConnectionAcceptor
//!     ↓ (one per peer)
//! ClientSession → MessageProcessor
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pipehost_service::{MessageProcessor, PipeServer, Result, ServerConfig, SessionId};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct Commands;
//!
//! #[async_trait]
//! impl MessageProcessor for Commands {
//!     async fn process(&self, _session: SessionId, message: &str) -> Result<String> {
//!         Ok(match message.trim() {
//!             "version" => env!("CARGO_PKG_VERSION").to_string(),
//!             other => format!("unknown command: {other}"),
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ServerConfig::new("STAAD_HELPER_PIPE").with_max_acceptors(2);
//!     let server = Arc::new(PipeServer::new(config)?.with_processor(Commands));
//!
//!     server.notifications().subscribe_with(|notification| println!("{notification}"));
//!     let run = server.spawn();
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.stop();
//!     let _ = run.await;
//!     Ok(())
//! }
//! ```

mod acceptor;
mod config;
mod error;
mod manager;
mod metrics;
mod notification;
mod processor;
mod server;
mod session;
mod transport;
mod types;

pub use acceptor::{AcceptorContext, ConnectionAcceptor};
pub use config::{
    DEFAULT_BUFFER_SIZE, DEFAULT_CHANNEL_NAME, DEFAULT_RECONNECT_DELAY, MAX_ACCEPTORS,
    ServerConfig, validate_channel_name,
};
pub use error::{PipeError, Result, is_disconnect_io};
pub use manager::{SessionGuard, SessionManager};
pub use self::metrics::{MetricsSnapshot, ServerMetrics};
pub use notification::{
    DEFAULT_NOTIFICATION_CAPACITY, Notification, NotificationHub, NotificationKind, ServerStatus,
};
pub use processor::{EchoProcessor, FnProcessor, MessageProcessor, clock_time};
pub use server::PipeServer;
pub use session::ClientSession;
pub use transport::{LocalListener, LocalTransport, PipeListener, Transport, channel_endpoint};
pub use types::{AcceptorId, ServerSnapshot, SessionEnd, SessionId, SessionInfo};
