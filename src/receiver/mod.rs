//! The receiver state machine (spec.md §4.2): LISTEN → ESTAB → FIN_WAIT →
//! CLOSED, with a side RESET_PENDING → CLOSED reachable from any
//! non-terminal phase.

mod state;

use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

pub use state::{DataOutcome, Phase, ReceiverState};

use crate::channel::Channel;
use crate::error::Error;
use crate::stats::ActionLog;
use crate::wire::{SegType, Segment};

/// Maximum segment lifetime; the receiver lingers `2 * MSL` after FIN before
/// closing, per spec.md §4.2.
const MSL: Duration = Duration::from_secs(1);

pub struct ReceiverConfig {
    pub receiver_port: u16,
    pub sender_port: u16,
    pub output_path: PathBuf,
    pub flp: f64,
    pub rlp: f64,
    pub log_path: PathBuf,
}

pub struct Receiver {
    state: Arc<Mutex<ReceiverState>>,
    terminated: Arc<AtomicBool>,
    closed: Arc<Condvar>,
    channel: Arc<Channel>,
    log: Arc<Mutex<ActionLog>>,
    output_path: PathBuf,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Closed,
    Reset,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> Result<Self, Error> {
        let receiver_addr: SocketAddr = ([127, 0, 0, 1], config.receiver_port).into();
        let sender_addr: SocketAddr = ([127, 0, 0, 1], config.sender_port).into();

        let socket = UdpSocket::bind(receiver_addr)?;
        // Bounded so the listen loop periodically rechecks `terminated`
        // instead of blocking forever in `recv_from` once the close timer
        // or a RESET has already decided to shut down.
        socket.set_read_timeout(Some(Duration::from_millis(200)))?;
        info!(%receiver_addr, %sender_addr, "receiver socket bound");

        let log = Arc::new(Mutex::new(ActionLog::create(&config.log_path)?));
        let flp_pct = crate::channel::to_percent(config.flp);
        let rlp_pct = crate::channel::to_percent(config.rlp);
        let channel = Arc::new(
            Channel::new(socket, sender_addr, log.clone()).with_loss(flp_pct, rlp_pct),
        );

        Ok(Receiver {
            state: Arc::new(Mutex::new(ReceiverState::new())),
            terminated: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(Condvar::new()),
            channel,
            log,
            output_path: config.output_path,
        })
    }

    pub fn run(&self) -> Result<Outcome, Error> {
        self.listen_loop();

        let state = self.state.lock().unwrap();
        let outcome = if state.phase == Phase::ResetPending {
            Outcome::Reset
        } else {
            Outcome::Closed
        };
        let prefix = state.assembled_prefix();
        drop(state);

        std::fs::write(&self.output_path, &prefix).map_err(|source| Error::WriteFile {
            path: self.output_path.display().to_string(),
            source,
        })?;

        {
            let mut state = self.state.lock().unwrap();
            state.stats.dropped_ack = self.channel.dropped_sends();
            state.stats.dropped_data = self.channel.dropped_data_recvs();
            state.stats.write_summary(&mut self.log.lock().unwrap());
        }

        Ok(outcome)
    }

    fn ack(&self, seqno: u16) {
        let _ = self.channel.send(&Segment::control(SegType::Ack, seqno));
    }

    /// A protocol violation or peer RESET: emit (at most) one RESET, mark
    /// the connection down, and wake anyone waiting on it.
    fn violate(&self, reason: &str) {
        warn!(reason, "protocol violation, resetting");
        self.state.lock().unwrap().phase = Phase::ResetPending;
        let _ = self.channel.send(&Segment::control(SegType::Reset, 0));
        self.terminated.store(true, Ordering::Release);
        self.closed.notify_all();
    }

    fn listen_loop(&self) {
        while !self.terminated.load(Ordering::Acquire) {
            let segment = match self.channel.recv() {
                Ok(segment) => segment,
                Err(_) => continue,
            };

            if segment.seg_type == SegType::Reset {
                warn!("received RESET, closing with buffered data");
                self.state.lock().unwrap().phase = Phase::ResetPending;
                self.terminated.store(true, Ordering::Release);
                self.closed.notify_all();
                return;
            }

            let phase = self.state.lock().unwrap().phase;

            match phase {
                Phase::Listen => {
                    if segment.seg_type == SegType::Syn {
                        // A SYN retried before establishment restarts the
                        // logging clock's origin, mirroring the reference
                        // implementation's handshake-retry behavior.
                        self.log.lock().unwrap().reset_origin();
                        let mut s = self.state.lock().unwrap();
                        s.handle_syn(segment.seqno);
                        let dsn = s.dsn;
                        drop(s);
                        self.ack(dsn);
                    } else {
                        self.violate("unexpected segment before handshake");
                        return;
                    }
                }
                Phase::Estab => match segment.seg_type {
                    SegType::Data => {
                        let outcome =
                            self.state.lock().unwrap().apply_data(segment.seqno, segment.payload);
                        if let DataOutcome::Ack(ack_seqno) = outcome {
                            self.ack(ack_seqno);
                        }
                    }
                    SegType::Fin => {
                        let ack_seqno = {
                            let mut s = self.state.lock().unwrap();
                            s.phase = Phase::FinWait;
                            segment.seqno.wrapping_add(1)
                        };
                        self.ack(ack_seqno);
                        self.spawn_close_timer(ack_seqno);
                    }
                    // A duplicate SYN or any other unexpected type is a
                    // protocol violation once established.
                    SegType::Syn | SegType::Ack | SegType::Reset => {
                        self.violate("unexpected segment in established phase");
                        return;
                    }
                },
                Phase::FinWait => match segment.seg_type {
                    SegType::Fin => {
                        // FIN retransmitted because our ACK was lost;
                        // re-acknowledge without restarting the close timer.
                        self.ack(segment.seqno.wrapping_add(1));
                    }
                    SegType::Data => {
                        self.violate("data arrived after FIN");
                        return;
                    }
                    SegType::Syn | SegType::Ack | SegType::Reset => {
                        self.violate("unexpected segment after FIN");
                        return;
                    }
                },
                Phase::ResetPending | Phase::Closed => {}
            }
        }
    }

    fn spawn_close_timer(&self, fin_ack_seqno: u16) {
        let state = self.state.clone();
        let terminated = self.terminated.clone();
        let closed = self.closed.clone();

        thread::spawn(move || {
            thread::sleep(2 * MSL);
            let mut s = state.lock().unwrap();
            if s.phase == Phase::FinWait {
                s.phase = Phase::Closed;
            }
            drop(s);
            info!(fin_ack_seqno, "closing after time-wait");
            terminated.store(true, Ordering::Release);
            closed.notify_all();
        });
    }
}
