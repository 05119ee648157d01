// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Configuration Ingestion Listener
//!
//! A raw TCP listener accepting configuration updates from a single remote
//! client at a time:
//!
//! ```text
//! Listening -> Accepted -> Parsing -> {Persisted | Rejected} -> Listening
//! ```
//!
//! A session reads the payload with one read of at most
//! [`ListenerSettings::read_buffer`] bytes, validates it as a
//! [`ConfigMessage`] and, when valid, rewrites the settings file with the
//! two payload fields. Nothing is ever sent back to the client. The
//! connection is closed when the session ends, whatever the outcome.
//!
//! Accept and read both stop as soon as the cancellation token fires, so
//! the supervisor can stop the listener while it waits for a client.

pub mod message;

pub use message::{ConfigMessage, ProtocolError};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::utility::text_file::{self, FileError};

/// Marker expected at the start of every configuration message
pub const DEFAULT_MARKER: &str = "xxxxxx";

/// Size of the single read performed per session
pub const DEFAULT_READ_BUFFER: usize = 1024;

/// Pending connections queued while a session is open
pub const LISTEN_BACKLOG: u32 = 1;

/// Pause after a transient accept failure
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Whether an `accept` failure clears up on its own: aborted handshakes,
/// interrupted calls and descriptor or memory exhaustion.
pub fn is_transient_accept_error(err: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    if matches!(
        err.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::OutOfMemory
    ) {
        return true;
    }
    // EMFILE, ENFILE, ENOMEM
    #[cfg(unix)]
    if matches!(err.raw_os_error(), Some(24 | 23 | 12)) {
        return true;
    }
    // ENOBUFS
    #[cfg(target_os = "linux")]
    if err.raw_os_error() == Some(105) {
        return true;
    }
    false
}

/// Errors that stop the listener task
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("cannot bind configuration listener to {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("listener task panicked or was aborted: {0}")]
    Join(String),
}

/// Errors confined to one configuration session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid configuration data: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("client sent nothing within {0:?}")]
    Timeout(Duration),

    #[error("session cancelled by shutdown")]
    Cancelled,

    #[error(transparent)]
    Persist(#[from] FileError),
}

/// Runtime settings of the listener
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub address: SocketAddr,
    pub marker: String,
    pub settings_file: PathBuf,
    pub read_buffer: usize,
    pub session_timeout: Duration,
    /// Persist through a temporary file and a rename instead of rewriting
    /// the settings file in place
    pub atomic_rename: bool,
}

impl ListenerSettings {
    pub fn new<P: Into<PathBuf>>(address: SocketAddr, settings_file: P) -> Self {
        Self {
            address,
            marker: DEFAULT_MARKER.to_string(),
            settings_file: settings_file.into(),
            read_buffer: DEFAULT_READ_BUFFER,
            session_timeout: Duration::from_secs(5),
            atomic_rename: false,
        }
    }
}

/// Sequential configuration listener
#[derive(Debug, Clone)]
pub struct ConfigListener {
    settings: ListenerSettings,
}

impl ConfigListener {
    pub fn new(settings: ListenerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ListenerSettings {
        &self.settings
    }

    /// Bind the listening socket with a backlog of [`LISTEN_BACKLOG`]
    pub fn bind(&self) -> Result<TcpListener, ListenerError> {
        let address = self.settings.address;
        let bind_err = |source: std::io::Error| ListenerError::Bind { address, source };

        let socket = if address.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(address).map_err(bind_err)?;
        socket.listen(LISTEN_BACKLOG).map_err(bind_err)
    }

    /// Accept and serve sessions one after the other until cancelled.
    pub async fn run(
        self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), ListenerError> {
        loop {
            debug!("Waiting for configuration client...");
            let accepted = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Configuration listener stopped");
                    return Ok(());
                }
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) if is_transient_accept_error(&e) => {
                    warn!("Accept failed, retrying in {:?}: {}", ACCEPT_BACKOFF, e);
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(ACCEPT_BACKOFF) => continue,
                    }
                }
                Err(e) => return Err(ListenerError::Accept(e)),
            };

            info!("Configuration client connected from {}", peer);
            match self.handle_session(stream, &cancel).await {
                Ok(message) => info!(
                    "Configuration from {} persisted to {:?}: channel={} value={}",
                    peer, self.settings.settings_file, message.channel, message.value
                ),
                Err(SessionError::Protocol(e)) => {
                    warn!("Invalid configuration data from {}: {}", peer, e)
                }
                Err(SessionError::Cancelled) => {
                    info!("Configuration listener stopped during a session");
                    return Ok(());
                }
                Err(e) => error!("Configuration session with {} failed: {}", peer, e),
            }
        }
    }

    /// Serve a single accepted connection.
    ///
    /// The stream is owned by the session and dropped, closing the
    /// connection, on every return path.
    pub async fn handle_session(
        &self,
        mut stream: TcpStream,
        cancel: &CancellationToken,
    ) -> Result<ConfigMessage, SessionError> {
        let mut buf = vec![0u8; self.settings.read_buffer];
        let timeout = self.settings.session_timeout;

        let read = tokio::select! {
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            read = tokio::time::timeout(timeout, stream.read(&mut buf)) => read,
        };
        let len = read
            .map_err(|_| SessionError::Timeout(timeout))?
            .map_err(SessionError::Read)?;

        let message = ConfigMessage::from_bytes(&buf[..len], &self.settings.marker)?;
        if self.settings.atomic_rename {
            text_file::replace_lines(&self.settings.settings_file, &message.lines())?;
        } else {
            text_file::write_lines(&self.settings.settings_file, &message.lines())?;
        }
        Ok(message)
    }
}

/// Handle on the background listener task
pub struct ListenerHandle {
    task: JoinHandle<Result<(), ListenerError>>,
    cancel: CancellationToken,
    local_addr: SocketAddr,
}

impl ListenerHandle {
    /// Bind the listener and spawn its accept loop.
    ///
    /// `cancel` stops the task; pass a child of the supervisor's token.
    pub fn launch(
        listener: ConfigListener,
        cancel: CancellationToken,
    ) -> Result<Self, ListenerError> {
        let socket = listener.bind()?;
        let local_addr = socket.local_addr().map_err(|source| ListenerError::Bind {
            address: listener.settings.address,
            source,
        })?;
        info!("Configuration listener bound to {}", local_addr);

        let task = tokio::spawn(listener.run(socket, cancel.clone()));
        Ok(Self {
            task,
            cancel,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the task to stop
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task result, for a task that has already finished
    pub async fn outcome(self) -> Result<(), ListenerError> {
        self.task
            .await
            .map_err(|e| ListenerError::Join(e.to_string()))?
    }

    /// Cancel the task and wait at most `timeout` for it to exit.
    ///
    /// Returns `false` when the task had to be aborted.
    pub async fn shutdown(mut self, timeout: Duration) -> bool {
        self.cancel.cancel();
        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(Ok(Err(e))) => {
                warn!("Configuration listener exited with error: {}", e);
                true
            }
            Ok(_) => true,
            Err(_) => {
                warn!("Configuration listener did not stop within {:?}, aborting", timeout);
                self.task.abort();
                false
            }
        }
    }
}
