//! End-to-end transfer over real loopback UDP sockets: a sender and a
//! receiver thread running the full protocol against each other.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::Duration;

use stp::receiver::{Outcome as ReceiverOutcome, Receiver, ReceiverConfig};
use stp::sender::{Outcome as SenderOutcome, Sender, SenderConfig};

static NEXT_PORT: AtomicU16 = AtomicU16::new(31000);

fn port_pair() -> (u16, u16) {
    let base = NEXT_PORT.fetch_add(2, Ordering::Relaxed);
    (base, base + 1)
}

fn scratch_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("stp-roundtrip-{}-{}", std::process::id(), name));
    path
}

fn run_transfer(data: Vec<u8>, max_win_bytes: usize, flp: f64, rlp: f64) -> Vec<u8> {
    let (sender_port, receiver_port) = port_pair();

    let input_path = scratch_path("input");
    let output_path = scratch_path("output");
    fs::write(&input_path, &data).unwrap();

    let receiver = Receiver::new(ReceiverConfig {
        receiver_port,
        sender_port,
        output_path: output_path.clone(),
        flp,
        rlp,
        log_path: scratch_path("receiver.log"),
    })
    .unwrap();

    let receiver_handle = thread::spawn(move || receiver.run());

    // Give the receiver a moment to bind before the sender's first SYN.
    thread::sleep(Duration::from_millis(50));

    let sender = Sender::new(SenderConfig {
        sender_port,
        receiver_port,
        file_to_send: input_path.clone(),
        max_win_bytes,
        rto: Duration::from_millis(100),
        log_path: scratch_path("sender.log"),
    })
    .unwrap();

    let sender_outcome = sender.run().unwrap();
    assert_eq!(sender_outcome, SenderOutcome::Finished);

    let receiver_outcome = receiver_handle.join().unwrap().unwrap();
    assert_eq!(receiver_outcome, ReceiverOutcome::Closed);

    let received = fs::read(&output_path).unwrap();

    let _ = fs::remove_file(&input_path);
    let _ = fs::remove_file(&output_path);

    received
}

#[test]
fn lossless_transfer_is_byte_identical() {
    let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    let received = run_transfer(data.clone(), 3000, 0.0, 0.0);
    assert_eq!(received, data);
}

#[test]
fn lossless_transfer_handles_short_final_segment() {
    let data = vec![7u8; 2500];
    let received = run_transfer(data.clone(), 2000, 0.0, 0.0);
    assert_eq!(received, data);
}

#[test]
fn lossless_transfer_survives_within_single_segment_window() {
    let data = vec![42u8; 4000];
    let received = run_transfer(data.clone(), 1000, 0.0, 0.0);
    assert_eq!(received, data);
}

#[test]
fn empty_file_round_trips_to_empty_output() {
    let received = run_transfer(Vec::new(), 3000, 0.0, 0.0);
    assert!(received.is_empty());
}

#[test]
fn lossy_channel_still_converges_to_byte_identical_file() {
    let data: Vec<u8> = (0..8000u32).map(|i| (i % 199) as u8).collect();
    let received = run_transfer(data.clone(), 4000, 0.05, 0.05);
    assert_eq!(received, data);
}
