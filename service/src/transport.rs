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

//! Local channel transport
//!
//! The server talks to the operating system through two traits:
//!
//! ```text
//! Transport::bind(channel)  →  PipeListener
//! PipeListener::accept()    →  Stream (one connected peer)
//! ```
//!
//! [`LocalTransport`] is the default and maps a channel name to a named pipe
//! on Windows or a Unix domain socket elsewhere. Other transports (such as
//! in-memory ones for tests) plug in through the same traits.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// A source of listeners for a named channel
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Listener produced by a successful bind
    type Listener: PipeListener;

    /// Claim `channel_name` and prepare up to `max_instances` simultaneous
    /// listening endpoints
    ///
    /// Fails if the name is already served by someone else.
    async fn bind(&self, channel_name: &str, max_instances: usize) -> io::Result<Self::Listener>;
}

/// A bound channel that hands out one connected peer per `accept`
#[async_trait]
pub trait PipeListener: Send + Sync + 'static {
    /// Byte stream to a connected peer
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Create a fresh listening endpoint and wait for a peer to connect to it
    ///
    /// Several acceptors call this concurrently on a shared listener. The
    /// returned future must be safe to drop at any point.
    async fn accept(&self) -> io::Result<Self::Stream>;

    /// Tear down a finished connection and give its endpoint back
    ///
    /// The default shuts the stream down and drops it.
    async fn release(&self, mut stream: Self::Stream) -> io::Result<()> {
        stream.shutdown().await
    }
}

/// The operating system's local channel transport
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

#[cfg(unix)]
pub use self::unix::{UnixSocketListener as LocalListener, channel_endpoint};

#[cfg(windows)]
pub use self::windows::{NamedPipeListener as LocalListener, channel_endpoint};

#[async_trait]
impl Transport for LocalTransport {
    type Listener = LocalListener;

    async fn bind(&self, channel_name: &str, max_instances: usize) -> io::Result<Self::Listener> {
        LocalListener::bind(channel_name, max_instances)
    }
}

#[cfg(unix)]
mod unix {
    use super::PipeListener;
    use async_trait::async_trait;
    use nix::errno::Errno;
    use nix::fcntl::{Flock, FlockArg};
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::unix::fs::FileTypeExt;
    use std::path::{Path, PathBuf};
    use tokio::net::{UnixListener, UnixStream};

    /// Resolve a channel name to its socket path
    ///
    /// Absolute paths are used verbatim; plain names live in the temp
    /// directory as `<name>.sock`.
    pub fn channel_endpoint(channel_name: &str) -> PathBuf {
        let path = Path::new(channel_name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::temp_dir().join(format!("{channel_name}.sock"))
        }
    }

    /// Path of the lock file guarding `socket_path`
    fn lock_path(socket_path: &Path) -> PathBuf {
        let mut path = socket_path.as_os_str().to_os_string();
        path.push(".lock");
        PathBuf::from(path)
    }

    /// Take the exclusive ownership lock for a channel without blocking
    fn claim(socket_path: &Path) -> io::Result<Flock<File>> {
        let path = lock_path(socket_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            if errno == Errno::EWOULDBLOCK {
                io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("{} is already served", socket_path.display()),
                )
            } else {
                io::Error::from(errno)
            }
        })
    }

    /// Unix domain socket listener
    ///
    /// All acceptors share one socket; each `accept` call takes the next
    /// queued peer. Ownership of the channel is an advisory lock on
    /// `<socket>.lock`, held for the listener's lifetime. The socket file is
    /// removed on drop; the lock file stays.
    pub struct UnixSocketListener {
        listener: UnixListener,
        path: PathBuf,
        _lock: Flock<File>,
    }

    impl UnixSocketListener {
        /// Bind the socket for `channel_name`
        ///
        /// Fails with `AddrInUse` if another listener holds the channel or
        /// a non-socket file occupies the path. A socket file left behind by
        /// a listener that no longer holds the lock is replaced. The peer
        /// side of an existing socket is never contacted.
        pub fn bind(channel_name: &str, _max_instances: usize) -> io::Result<Self> {
            let path = channel_endpoint(channel_name);
            let lock = claim(&path)?;

            match std::fs::symlink_metadata(&path) {
                Ok(meta) if meta.file_type().is_socket() => {
                    tracing::debug!(path = %path.display(), "Removing stale channel socket");
                    std::fs::remove_file(&path)?;
                }
                Ok(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AddrInUse,
                        format!("{} exists and is not a socket", path.display()),
                    ));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }

            let listener = UnixListener::bind(&path)?;
            tracing::debug!(path = %path.display(), "Channel socket bound");
            Ok(Self {
                listener,
                path,
                _lock: lock,
            })
        }

        /// Get the socket path
        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl std::fmt::Debug for UnixSocketListener {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("UnixSocketListener")
                .field("path", &self.path)
                .finish_non_exhaustive()
        }
    }

    #[async_trait]
    impl PipeListener for UnixSocketListener {
        type Stream = UnixStream;

        async fn accept(&self) -> io::Result<UnixStream> {
            let (stream, _) = self.listener.accept().await?;
            Ok(stream)
        }
    }

    impl Drop for UnixSocketListener {
        fn drop(&mut self) {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove channel socket");
                }
            }
        }
    }
}

#[cfg(windows)]
mod windows {
    use super::PipeListener;
    use async_trait::async_trait;
    use std::io;
    use std::sync::{Mutex, PoisonError};
    use tokio::net::windows::named_pipe::{NamedPipeServer, ServerOptions};

    const PIPE_PREFIX: &str = r"\\.\pipe\";

    /// Resolve a channel name to its pipe path (`\\.\pipe\<name>`)
    pub fn channel_endpoint(channel_name: &str) -> String {
        if channel_name.starts_with(PIPE_PREFIX) {
            channel_name.to_string()
        } else {
            format!("{PIPE_PREFIX}{channel_name}")
        }
    }

    /// Named pipe listener
    ///
    /// Every `accept` creates a new pipe instance, up to `max_instances` at
    /// once. The first instance is created at bind time with
    /// `first_pipe_instance` so a second server on the same name fails.
    #[derive(Debug)]
    pub struct NamedPipeListener {
        pipe_name: String,
        max_instances: usize,
        pending: Mutex<Option<NamedPipeServer>>,
    }

    impl NamedPipeListener {
        /// Claim the pipe name for `channel_name`
        pub fn bind(channel_name: &str, max_instances: usize) -> io::Result<Self> {
            let pipe_name = channel_endpoint(channel_name);
            let first = ServerOptions::new()
                .first_pipe_instance(true)
                .max_instances(max_instances)
                .create(&pipe_name)?;
            tracing::debug!(pipe = %pipe_name, max_instances, "Named pipe created");

            Ok(Self {
                pipe_name,
                max_instances,
                pending: Mutex::new(Some(first)),
            })
        }

        fn next_instance(&self) -> io::Result<NamedPipeServer> {
            let pending = self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            match pending {
                Some(server) => Ok(server),
                None => ServerOptions::new()
                    .max_instances(self.max_instances)
                    .create(&self.pipe_name),
            }
        }
    }

    #[async_trait]
    impl PipeListener for NamedPipeListener {
        type Stream = NamedPipeServer;

        async fn accept(&self) -> io::Result<NamedPipeServer> {
            let server = self.next_instance()?;
            server.connect().await?;
            Ok(server)
        }

        async fn release(&self, server: NamedPipeServer) -> io::Result<()> {
            server.disconnect()
        }
    }
}
