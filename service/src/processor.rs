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

//! Message processors
//!
//! A [`MessageProcessor`] maps one inbound message to one outbound message.
//! It is the only customization point of the server: acceptors and sessions
//! never look at message content.

use crate::{Result, SessionId};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::time::SystemTime;

/// Message processor trait
///
/// # Example
///
/// ```no_run
/// use pipehost_service::{MessageProcessor, Result, SessionId};
/// use async_trait::async_trait;
///
/// struct Upper;
///
/// #[async_trait]
/// impl MessageProcessor for Upper {
///     async fn process(&self, _session: SessionId, message: &str) -> Result<String> {
///         Ok(message.to_uppercase())
///     }
/// }
/// ```
#[async_trait]
pub trait MessageProcessor: Send + Sync + 'static {
    /// Produce the response for one inbound message
    ///
    /// An error is reported as `ErrorOccurred` and ends the session.
    async fn process(&self, session: SessionId, message: &str) -> Result<String>;
}

/// Default processor: echoes the message with the time it was received
///
/// The response is `Echo: <message> (Received at HH:MM:SS)` in local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProcessor;

#[async_trait]
impl MessageProcessor for EchoProcessor {
    async fn process(&self, _session: SessionId, message: &str) -> Result<String> {
        Ok(format!(
            "Echo: {} (Received at {})",
            message,
            clock_time(SystemTime::now())
        ))
    }
}

/// Format the local wall-clock time of day of `at` as `HH:MM:SS`
pub fn clock_time(at: SystemTime) -> String {
    DateTime::<Local>::from(at).format("%H:%M:%S").to_string()
}

/// Closure-based processor
///
/// Wraps a synchronous mapping so simple dispatch tables do not need their
/// own type.
///
/// # Example
///
/// ```
/// use pipehost_service::FnProcessor;
///
/// let processor = FnProcessor::new(|_session, message: &str| match message.trim() {
///     "ping" => Ok("pong".to_string()),
///     other => Ok(format!("unknown command: {other}")),
/// });
/// ```
pub struct FnProcessor<F> {
    f: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(SessionId, &str) -> Result<String> + Send + Sync + 'static,
{
    /// Create a processor from a closure
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> MessageProcessor for FnProcessor<F>
where
    F: Fn(SessionId, &str) -> Result<String> + Send + Sync + 'static,
{
    async fn process(&self, session: SessionId, message: &str) -> Result<String> {
        (self.f)(session, message)
    }
}

impl<F> std::fmt::Debug for FnProcessor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProcessor").finish_non_exhaustive()
    }
}
