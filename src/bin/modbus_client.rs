// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use clap::Parser;
use std::{error::Error, net::SocketAddr};
use tokio_modbus::prelude::*;

use rust_modbus_bridge::modbus::{BANK_CAPACITY, REGISTER_MAP};

/// Modbus client for reading the input registers published by the bridge
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus server address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[clap(long, default_value = "502")]
    port: u16,

    /// Starting input register address
    #[clap(long, default_value = "0")]
    input_register: u16,

    /// Number of registers to read
    #[clap(long, default_value_t = BANK_CAPACITY as u16)]
    quantity: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let socket_addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;
    println!("Connecting to Modbus server at {}", socket_addr);

    let mut ctx = tcp::connect_slave(socket_addr, Slave(1)).await?;

    println!(
        "Reading {} input registers starting at address {}",
        args.quantity, args.input_register
    );
    let response = ctx
        .read_input_registers(args.input_register, args.quantity)
        .await??;

    for (offset, word) in response.iter().enumerate() {
        let address = usize::from(args.input_register) + offset;
        let channel = REGISTER_MAP
            .get(address)
            .map(|entry| entry.channel.to_string())
            .unwrap_or_else(|| "-".to_string());
        // Words are value x 100, negative values in two's complement
        println!(
            "{:>4}  channel {:>4}  raw {:>5}  unsigned {:>9.2}  signed {:>9.2}",
            address,
            channel,
            word,
            f64::from(*word) / 100.0,
            f64::from(*word as i16) / 100.0
        );
    }

    Ok(())
}
