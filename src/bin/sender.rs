use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use stp::sender::{Outcome, Sender, SenderConfig};

/// Sends a file to a receiver over a custom reliable transport on loopback UDP.
#[derive(Parser, Debug)]
#[command(name = "sender")]
struct Args {
    /// Local UDP port this sender binds to.
    sender_port: u16,
    /// UDP port the receiver is listening on.
    receiver_port: u16,
    /// Path to the file to transfer.
    file_to_send: PathBuf,
    /// Maximum send window, in bytes.
    max_win_bytes: usize,
    /// Retransmission timeout, in milliseconds.
    rto_ms: u64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(Outcome::Finished) => ExitCode::SUCCESS,
        Ok(Outcome::Reset) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("sender: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<Outcome> {
    let args = Args::parse();

    let config = SenderConfig {
        sender_port: args.sender_port,
        receiver_port: args.receiver_port,
        file_to_send: args.file_to_send,
        max_win_bytes: args.max_win_bytes,
        rto: Duration::from_millis(args.rto_ms),
        log_path: PathBuf::from(format!("sender_{}.log", args.sender_port)),
    };

    let sender = Sender::new(config).context("failed to initialize sender")?;
    let outcome = sender.run().context("sender connection ended in error")?;
    Ok(outcome)
}
