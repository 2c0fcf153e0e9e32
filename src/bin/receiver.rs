use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use stp::receiver::{Outcome, Receiver, ReceiverConfig};

/// Receives a file from a sender over a custom reliable transport on loopback UDP.
#[derive(Parser, Debug)]
#[command(name = "receiver")]
struct Args {
    /// Local UDP port this receiver binds to.
    receiver_port: u16,
    /// UDP port the sender is listening on.
    sender_port: u16,
    /// Path the reassembled file is written to.
    file_received: PathBuf,
    /// Forward-path loss probability, in [0, 1].
    flp: f64,
    /// Reverse-path loss probability, in [0, 1].
    rlp: f64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(Outcome::Closed) => ExitCode::SUCCESS,
        Ok(Outcome::Reset) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("receiver: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<Outcome> {
    let args = Args::parse();

    let config = ReceiverConfig {
        receiver_port: args.receiver_port,
        sender_port: args.sender_port,
        output_path: args.file_received,
        flp: args.flp,
        rlp: args.rlp,
        log_path: PathBuf::from(format!("receiver_{}.log", args.receiver_port)),
    };

    let receiver = Receiver::new(config).context("failed to initialize receiver")?;
    let outcome = receiver.run().context("receiver connection ended in error")?;
    Ok(outcome)
}
