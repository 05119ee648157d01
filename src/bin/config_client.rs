// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::error::Error;
use std::time::Duration;

use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use rust_modbus_bridge::listener::{message::ConfigMessage, DEFAULT_MARKER};

/// Send a configuration update to the bridge listener
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Listener address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Listener port
    #[clap(long, default_value = "5000")]
    port: u16,

    /// Message marker
    #[clap(long, default_value = DEFAULT_MARKER)]
    marker: String,

    /// Channel handle to set
    channel: String,

    /// Value to set
    value: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let message = ConfigMessage {
        channel: args.channel,
        value: args.value,
    };
    let payload = message.to_payload(&args.marker);
    // Reject locally what the listener would reject
    ConfigMessage::parse(&payload, &args.marker)?;

    let target = format!("{}:{}", args.address, args.port);
    println!("Sending {:?} to {}", payload, target);

    let mut stream =
        tokio::time::timeout(Duration::from_secs(5), TcpStream::connect(&target)).await??;
    stream.write_all(payload.as_bytes()).await?;
    stream.shutdown().await?;

    println!("Sent {} bytes", payload.len());
    Ok(())
}
