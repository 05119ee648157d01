// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register store lifecycle
//!
//! [`ModbusStore`] owns the register bank and the background task running
//! the tokio-modbus TCP server in front of it.

use std::net::SocketAddr;
use std::time::Duration;

use log::{error, info, warn};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};
use tokio_util::sync::CancellationToken;

use super::modbus_server::InputRegisterService;
use super::register_bank::{RegisterBank, RegisterError};

/// Time granted to the server task to exit on [`ModbusStore::stop`]
pub const STOP_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot bind Modbus server to {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Modbus server already started")]
    AlreadyStarted,

    #[error(transparent)]
    Register(#[from] RegisterError),
}

/// Modbus TCP server in front of a [`RegisterBank`]
pub struct ModbusStore {
    bank: RegisterBank,
    address: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl ModbusStore {
    pub fn new(bank: RegisterBank, address: SocketAddr) -> Self {
        Self {
            bank,
            address,
            cancel: CancellationToken::new(),
            task: None,
            local_addr: None,
        }
    }

    /// Shared handle on the register bank
    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }

    /// Address the server is actually listening on, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Write a full range of registers, see [`RegisterBank::set_input_registers`]
    pub fn set_input_registers(&self, base: u16, values: &[u16]) -> Result<(), StoreError> {
        Ok(self.bank.set_input_registers(base, values)?)
    }

    /// Bind the Modbus address and serve the bank in a background task.
    ///
    /// Returns as soon as the socket is bound.
    pub async fn start(&mut self) -> Result<SocketAddr, StoreError> {
        if self.task.is_some() {
            return Err(StoreError::AlreadyStarted);
        }

        let listener = TcpListener::bind(self.address)
            .await
            .map_err(|source| StoreError::Bind {
                address: self.address,
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| StoreError::Bind {
                address: self.address,
                source,
            })?;
        info!("Starting Modbus server on {}", local_addr);

        let server = Server::new(listener);
        let bank = self.bank.clone();
        let cancel = self.cancel.clone();

        let task = tokio::spawn(async move {
            let shutdown = cancel.clone();
            let on_connected = move |stream, socket_addr| {
                let bank = bank.clone();
                let shutdown = shutdown.clone();
                async move {
                    accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                        if shutdown.is_cancelled() {
                            return Ok(None);
                        }
                        Ok(Some(InputRegisterService::with_shutdown(
                            bank.clone(),
                            shutdown.clone(),
                        )))
                    })
                }
            };

            let on_process_error = |err| {
                error!("Modbus server error: {err}");
            };

            tokio::select! {
                res = server.serve(&on_connected, on_process_error) => {
                    if let Err(e) = res {
                        error!("Modbus server error: {}", e);
                    }
                }
                _ = cancel.cancelled() => {}
            }
        });

        self.task = Some(task);
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Whether the server task is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop serving and wait up to [`STOP_TIMEOUT`] for the task to exit.
    ///
    /// The listening socket is closed and new connections are refused.
    /// Connections accepted earlier stay open until the client hangs up, but
    /// every request on them is answered with `ServerDeviceFailure`.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        let Some(mut task) = self.task.take() else {
            return;
        };

        info!("Shutting down Modbus server...");
        match tokio::time::timeout(STOP_TIMEOUT, &mut task).await {
            Ok(_) => info!("Modbus server shut down successfully"),
            Err(_) => {
                warn!("Modbus server shutdown timed out, forcing termination");
                task.abort();
            }
        }
    }
}

impl Drop for ModbusStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
