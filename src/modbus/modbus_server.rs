// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus service exposing the register bank
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the device that provides data,
//! while the client is the device that requests data.
//!
//! The Modbus master is the device that requests data, while the Modbus slave is the device
//! that provides data. In other words, the Modbus master is here the client and the
//! Modbus slave is here the server.
//!
//! Only function code 0x04 (Read Input Registers) is served. The bank is
//! written exclusively by the publisher; clients have read access.
//!
//! A service built with [`InputRegisterService::with_shutdown`] stops serving
//! data once its token is cancelled and answers `ServerDeviceFailure` instead.

use std::future;

use log::{debug, error};
use tokio_modbus::prelude::*;
use tokio_util::sync::CancellationToken;

use super::register_bank::RegisterBank;

/// Per-connection Modbus service reading from a shared [`RegisterBank`]
#[derive(Debug, Clone)]
pub struct InputRegisterService {
    bank: RegisterBank,
    shutdown: CancellationToken,
}

impl InputRegisterService {
    pub fn new(bank: RegisterBank) -> Self {
        Self::with_shutdown(bank, CancellationToken::new())
    }

    /// Service that refuses every request after `shutdown` is cancelled
    pub fn with_shutdown(bank: RegisterBank, shutdown: CancellationToken) -> Self {
        Self { bank, shutdown }
    }
}

impl tokio_modbus::server::Service for InputRegisterService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    /// Process a Modbus request and provide a response
    ///
    /// Any function code other than 0x04 returns an IllegalFunction exception.
    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Received Modbus request: {:?}", req);

        if self.shutdown.is_cancelled() {
            debug!("Register store stopped, refusing {:?}", req);
            return future::ready(Err(ExceptionCode::ServerDeviceFailure));
        }

        let res = match req {
            Request::ReadInputRegisters(addr, cnt) => {
                debug!(
                    "Reading {} input registers starting from address {}",
                    cnt, addr
                );
                register_read(&self.bank, addr, cnt).map(Response::ReadInputRegisters)
            }
            _ => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {req:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        };

        future::ready(res)
    }
}

/// Read `cnt` input registers from `addr`.
///
/// Returns `ExceptionCode::IllegalDataAddress` if any requested register lies
/// outside the bank.
fn register_read(bank: &RegisterBank, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
    match bank.get_input_registers(addr, cnt) {
        Some(values) => Ok(values),
        None => {
            error!(
                "Exception::IllegalDataAddress - Registers {}..{} not available",
                addr,
                u32::from(addr) + u32::from(cnt)
            );
            Err(ExceptionCode::IllegalDataAddress)
        }
    }
}
