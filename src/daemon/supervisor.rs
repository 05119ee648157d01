// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Lifecycle Supervisor
//!
//! The [`Supervisor`] starts the register store, drives the publishing loop
//! and launches the configuration listener once the first publishing cycle
//! has completed. It owns every long-lived resource of the bridge, so a
//! fault anywhere in the loop ends in the same shutdown sequence: stop the
//! store, cancel the listener, wait for it at most [`LISTENER_JOIN_TIMEOUT`].
//!
//! ## Usage
//!
//! ```no_run
//! use rust_modbus_bridge::{config::Config, daemon::Supervisor};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!     let mut supervisor = Supervisor::from_config(&config)?;
//!
//!     // Stop from another task, e.g. on SIGTERM
//!     let shutdown = supervisor.shutdown_token();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.cancel();
//!     });
//!
//!     supervisor.run().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RestartPolicy};
use crate::listener::{ConfigListener, ListenerHandle};
use crate::modbus::{ModbusStore, RegisterBank, StoreError};
use crate::publisher::{PublisherError, RegisterPublisher, SourceOutcome};

/// Longest wait for the listener task during shutdown
pub const LISTENER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Format of the timestamps in lifecycle log lines
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Faults that end the supervising loop
#[derive(Error, Debug)]
pub enum FatalServerError {
    #[error("register store failure: {0}")]
    Store(#[from] StoreError),

    #[error("register publisher failure: {0}")]
    Publisher(#[from] PublisherError),

    #[error("Modbus server task stopped unexpectedly")]
    StoreStopped,
}

fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Owner of the register store, the publisher and the listener task
pub struct Supervisor {
    store: ModbusStore,
    publisher: RegisterPublisher,
    poll_interval: Duration,
    listener: Option<ConfigListener>,
    listener_handle: Option<ListenerHandle>,
    listener_launched: bool,
    restart: RestartPolicy,
    restart_delay: Duration,
    restart_at: Option<Instant>,
    shutdown: CancellationToken,
}

impl Supervisor {
    /// Assemble a supervisor from its parts.
    ///
    /// `listener` is `None` when configuration updates over TCP are disabled.
    pub fn new(
        store: ModbusStore,
        publisher: RegisterPublisher,
        listener: Option<ConfigListener>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            publisher,
            poll_interval,
            listener,
            listener_handle: None,
            listener_launched: false,
            restart: RestartPolicy::Never,
            restart_delay: Duration::ZERO,
            restart_at: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Relaunch the listener after `delay` whenever its task ends, under
    /// [`RestartPolicy::Always`]
    pub fn with_restart_policy(mut self, restart: RestartPolicy, delay: Duration) -> Self {
        self.restart = restart;
        self.restart_delay = delay;
        self
    }

    /// Build the whole bridge from a validated configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let bank = RegisterBank::new();
        let store = ModbusStore::new(bank.clone(), config.modbus_socket_addr()?);
        let publisher = RegisterPublisher::new(bank, config.source_specs())
            .context("Invalid register layout")?;

        let listener = if config.listener.enabled {
            Some(ConfigListener::new(config.listener_settings()?))
        } else {
            None
        };

        Ok(Self::new(store, publisher, listener, config.poll_interval()).with_restart_policy(
            config.listener.restart,
            Duration::from_millis(config.listener.restart_delay_ms),
        ))
    }

    /// Token that stops [`Supervisor::run`] when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Shared register bank served over Modbus
    pub fn bank(&self) -> &RegisterBank {
        self.store.bank()
    }

    /// Address of the Modbus server, once started
    pub fn modbus_addr(&self) -> Option<SocketAddr> {
        self.store.local_addr()
    }

    /// Address of the configuration listener while its task is alive
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.listener_handle.as_ref().map(ListenerHandle::local_addr)
    }

    /// Whether the one-time listener launch has happened
    pub fn listener_launched(&self) -> bool {
        self.listener_launched
    }

    /// Run the bridge until the shutdown token is cancelled or a fatal fault
    /// occurs.
    ///
    /// The shutdown sequence runs on both paths. `Ok(())` means a requested
    /// shutdown, `Err` carries the fault that ended the loop.
    pub async fn run(&mut self) -> Result<(), FatalServerError> {
        info!("Modbus bridge starting at {}", timestamp());

        let result = self.supervise().await;
        if let Err(e) = &result {
            error!("{} fatal error: {}", timestamp(), e);
        }

        self.shutdown_sequence().await;
        result
    }

    async fn supervise(&mut self) -> Result<(), FatalServerError> {
        let address = self.store.start().await?;
        info!("Register store online at {}", address);

        loop {
            if self.shutdown.is_cancelled() {
                return Ok(());
            }

            let report = self.publisher.poll_once()?;
            for (kind, outcome) in &report.outcomes {
                if let SourceOutcome::Published(words) = outcome {
                    debug!("{} published {} registers", kind, words.len());
                }
            }

            if !self.listener_launched {
                self.listener_launched = true;
                self.launch_listener();
            }
            self.supervise_listener().await;

            if !self.store.is_running() {
                return Err(FatalServerError::StoreStopped);
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    return Ok(());
                }
                _ = time::sleep(self.poll_interval) => {}
            }
        }
    }

    fn launch_listener(&mut self) {
        let Some(listener) = self.listener.clone() else {
            info!("Configuration listener disabled");
            return;
        };

        match ListenerHandle::launch(listener, self.shutdown.child_token()) {
            Ok(handle) => {
                info!("Configuration listener launched on {}", handle.local_addr());
                self.listener_handle = Some(handle);
            }
            Err(e) => {
                error!("Configuration listener failed to start: {}", e);
                self.schedule_restart();
            }
        }
    }

    fn schedule_restart(&mut self) {
        if self.restart == RestartPolicy::Always {
            info!(
                "Configuration listener will be relaunched in {:?}",
                self.restart_delay
            );
            self.restart_at = Some(Instant::now() + self.restart_delay);
        }
    }

    /// Collect the outcome of an exited listener task and apply the restart
    /// policy.
    async fn supervise_listener(&mut self) {
        if self
            .listener_handle
            .as_ref()
            .is_some_and(ListenerHandle::is_finished)
        {
            if let Some(handle) = self.listener_handle.take() {
                match handle.outcome().await {
                    Ok(()) => warn!("Configuration listener exited"),
                    Err(e) => error!("Configuration listener exited: {}", e),
                }
                self.schedule_restart();
            }
        }

        if self.restart_at.is_some_and(|at| Instant::now() >= at) {
            self.restart_at = None;
            self.launch_listener();
        }
    }

    async fn shutdown_sequence(&mut self) {
        self.shutdown.cancel();
        self.store.stop().await;

        if let Some(handle) = self.listener_handle.take() {
            if !handle.shutdown(LISTENER_JOIN_TIMEOUT).await {
                warn!("Configuration listener abandoned");
            }
        }

        info!("{} Modbus bridge offline", timestamp());
    }
}
