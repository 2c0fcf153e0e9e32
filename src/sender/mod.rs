//! The sender state machine (spec.md §4.1): INIT → ESTAB_PENDING → SENDING
//! → FIN_PENDING → FINISHED → CLOSED, with a side RESET_PENDING → CLOSED
//! reachable from any non-terminal phase.

mod state;

use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::error::Error;
use crate::stats::ActionLog;
use crate::timer::{self, RetryOutcome, HANDSHAKE_ATTEMPTS};
use crate::wire::{SegType, Segment};

pub use state::{AckAction, Phase, SenderState};

pub struct SenderConfig {
    pub sender_port: u16,
    pub receiver_port: u16,
    pub file_to_send: PathBuf,
    pub max_win_bytes: usize,
    pub rto: Duration,
    pub log_path: PathBuf,
}

pub struct Sender {
    state: Arc<Mutex<SenderState>>,
    terminated: Arc<AtomicBool>,
    window_cv: Arc<Condvar>,
    channel: Arc<Channel>,
    log: Arc<Mutex<ActionLog>>,
    rto: Duration,
    file_to_send: PathBuf,
}

/// Outcome the binary uses to pick its process exit code.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Reset,
}

impl Sender {
    pub fn new(config: SenderConfig) -> Result<Self, Error> {
        let sender_addr: SocketAddr = ([127, 0, 0, 1], config.sender_port).into();
        let receiver_addr: SocketAddr = ([127, 0, 0, 1], config.receiver_port).into();

        let socket = UdpSocket::bind(sender_addr)?;
        // Bounded so the ACK listener periodically rechecks `terminated`
        // instead of blocking forever in `recv_from` once the connection
        // has already decided to shut down.
        socket.set_read_timeout(Some(Duration::from_millis(200)))?;
        info!(%sender_addr, %receiver_addr, "sender socket bound");

        let log = Arc::new(Mutex::new(ActionLog::create(&config.log_path)?));
        let channel = Arc::new(Channel::new(socket, receiver_addr, log.clone()));

        let isn = rand::thread_rng().gen_range(0..=u16::MAX);
        let state = Arc::new(Mutex::new(SenderState::new(isn, config.max_win_bytes)));

        Ok(Sender {
            state,
            terminated: Arc::new(AtomicBool::new(false)),
            window_cv: Arc::new(Condvar::new()),
            channel,
            log,
            rto: config.rto,
            file_to_send: config.file_to_send,
        })
    }

    pub fn run(&self) -> Result<Outcome, Error> {
        let listener = self.spawn_ack_listener();

        let result = match self.establish() {
            // Cancelled means the ACK listener already saw a peer RESET and
            // set `terminated` (spawn_ack_listener) — echoing another RESET
            // back would be answering a teardown with a teardown.
            RetryOutcome::Cancelled => Ok(Outcome::Reset),
            RetryOutcome::Exhausted => Ok(self.reset_and_close()),
            RetryOutcome::Progressed => {
                if self.state.lock().unwrap().phase == Phase::Sending {
                    self.read_file().map(|()| {
                        self.run_sending_phase();
                        self.finish_or_reset()
                    })
                } else {
                    Ok(self.reset_and_close())
                }
            }
        };

        if result.is_err() {
            self.reset_and_close();
        }

        self.terminated.store(true, Ordering::Release);
        self.window_cv.notify_all();
        let _ = listener.join();

        self.state.lock().unwrap().stats.write_summary(&mut self.log.lock().unwrap());

        result
    }

    /// After the SENDING phase ends, decide whether to proceed to FIN_PENDING
    /// or a protocol violation already diverted the connection to RESET.
    fn finish_or_reset(&self) -> Outcome {
        if self.terminated.load(Ordering::Acquire) {
            return Outcome::Reset;
        }
        if self.state.lock().unwrap().phase == Phase::ResetPending {
            return self.reset_and_close();
        }
        self.run_fin_phase()
    }

    fn send_control(&self, seg_type: SegType, seqno: u16) {
        let _ = self.channel.send(&Segment::control(seg_type, seqno));
    }

    /// ESTAB_PENDING: send SYN, wait `rto`, retransmit up to 3 times.
    fn establish(&self) -> RetryOutcome {
        let isn = {
            let mut s = self.state.lock().unwrap();
            s.phase = Phase::EstabPending;
            s.isn
        };
        info!(isn, "establishing connection");

        timer::bounded_retry(
            HANDSHAKE_ATTEMPTS,
            self.rto,
            &self.terminated,
            |attempt| {
                if attempt > 1 {
                    warn!(attempt, "SYN retransmission");
                }
                self.send_control(SegType::Syn, isn);
            },
            || self.state.lock().unwrap().phase != Phase::EstabPending,
        )
    }

    fn read_file(&self) -> Result<(), Error> {
        let data = std::fs::read(&self.file_to_send).map_err(|source| Error::ReadFile {
            path: self.file_to_send.display().to_string(),
            source,
        })?;

        let mut state = self.state.lock().unwrap();
        state.load_file(data);
        info!(
            file_size = state.file_size,
            segment_count = state.segment_count,
            "file loaded"
        );
        Ok(())
    }

    /// SENDING: the pipelined transmit scheduler plus one retransmission
    /// timer task per window lower bound, until the peer's cumulative ACK
    /// covers the whole file.
    fn run_sending_phase(&self) {
        if self.state.lock().unwrap().segment_count == 0 {
            // Empty file: nothing to transmit, go straight to FIN per
            // spec.md §8 boundary behavior.
            let mut state = self.state.lock().unwrap();
            state.fsn = state.dsn;
            state.phase = Phase::FinPending;
            return;
        }

        loop {
            if self.terminated.load(Ordering::Acquire) {
                return;
            }

            let (lb, ub, phase) = {
                let state = self.state.lock().unwrap();
                (state.lb, state.ub, state.phase)
            };

            if phase != Phase::Sending {
                return;
            }

            let mut progressed = false;

            for i in lb..=ub {
                if self.terminated.load(Ordering::Acquire) {
                    return;
                }

                let mut state = self.state.lock().unwrap();
                if state.phase != Phase::Sending {
                    return;
                }

                if !state.records[i].sent {
                    state.records[i].sent = true;
                    let seqno = state.seqno_of(i);
                    let payload = state.buffer[i].clone();
                    state.stats.bytes_sent += payload.len() as u64;
                    state.stats.segments_sent += 1;
                    let needs_timer = i == state.lb && !state.records[i].timer_armed;
                    if needs_timer {
                        state.records[i].timer_armed = true;
                    }
                    drop(state);

                    let _ = self.channel.send(&Segment::data(seqno, payload));
                    if needs_timer {
                        self.spawn_data_timer(i);
                    }
                    progressed = true;
                } else if i == state.lb && !state.records[i].timer_armed {
                    state.records[i].timer_armed = true;
                    drop(state);
                    self.spawn_data_timer(i);
                    progressed = true;
                }
            }

            if !progressed {
                let state = self.state.lock().unwrap();
                let _ = self
                    .window_cv
                    .wait_timeout(state, self.rto)
                    .unwrap();
            }
        }
    }

    fn spawn_data_timer(&self, pos: usize) {
        let state = self.state.clone();
        let terminated = self.terminated.clone();
        let channel = self.channel.clone();
        let rto = self.rto;

        debug!(pos, "arming retransmission timer");

        thread::spawn(move || {
            timer::unbounded_retry(
                rto,
                &terminated,
                || {
                    let s = state.lock().unwrap();
                    s.phase == Phase::Sending && !s.records[pos].acked
                },
                || {
                    let (seqno, payload) = {
                        let mut s = state.lock().unwrap();
                        if s.phase != Phase::Sending || s.records[pos].acked {
                            return;
                        }
                        s.stats.retransmits += 1;
                        (s.seqno_of(pos), s.buffer[pos].clone())
                    };
                    warn!(pos, "retransmitting data segment on timeout");
                    let _ = channel.send(&Segment::data(seqno, payload));
                },
            );
        });
    }

    /// FIN_PENDING: send FIN with the recorded FSN, wait `rto`, retransmit
    /// up to 3 times.
    fn run_fin_phase(&self) -> Outcome {
        if self.terminated.load(Ordering::Acquire) {
            return Outcome::Reset;
        }

        let fsn = self.state.lock().unwrap().fsn;
        info!(fsn, "entering finish phase");

        let outcome = timer::bounded_retry(
            HANDSHAKE_ATTEMPTS,
            self.rto,
            &self.terminated,
            |attempt| {
                if attempt > 1 {
                    warn!(attempt, "FIN retransmission");
                }
                self.send_control(SegType::Fin, fsn);
            },
            || matches!(
                self.state.lock().unwrap().phase,
                Phase::Finished | Phase::ResetPending
            ),
        );

        match outcome {
            RetryOutcome::Progressed if self.state.lock().unwrap().phase == Phase::Finished => {
                info!("connection finished");
                Outcome::Finished
            }
            RetryOutcome::Progressed => self.reset_and_close(),
            RetryOutcome::Cancelled => Outcome::Reset,
            RetryOutcome::Exhausted => self.reset_and_close(),
        }
    }

    /// RESET_PENDING: emit one RESET and stop.
    fn reset_and_close(&self) -> Outcome {
        warn!("giving up, sending RESET");
        self.state.lock().unwrap().phase = Phase::ResetPending;
        self.send_control(SegType::Reset, 0);
        Outcome::Reset
    }

    fn spawn_ack_listener(&self) -> thread::JoinHandle<()> {
        let state = self.state.clone();
        let terminated = self.terminated.clone();
        let channel = self.channel.clone();
        let window_cv = self.window_cv.clone();

        thread::spawn(move || {
            while !terminated.load(Ordering::Acquire) {
                let segment = match channel.recv() {
                    Ok(segment) => segment,
                    Err(_) => continue,
                };

                if segment.seg_type == SegType::Reset {
                    terminated.store(true, Ordering::Release);
                    state.lock().unwrap().phase = Phase::Closed;
                    window_cv.notify_all();
                    return;
                }

                let phase = state.lock().unwrap().phase;

                match phase {
                    Phase::EstabPending => {
                        let mut s = state.lock().unwrap();
                        if segment.seg_type == SegType::Ack && segment.seqno == s.dsn {
                            s.phase = Phase::Sending;
                        } else {
                            s.phase = Phase::ResetPending;
                        }
                    }
                    Phase::Sending => {
                        if segment.seg_type != SegType::Ack {
                            state.lock().unwrap().phase = Phase::ResetPending;
                            continue;
                        }

                        let action = state.lock().unwrap().apply_ack(segment.seqno);
                        match action {
                            AckAction::FastRetransmit(pos) => {
                                let (seqno, payload) = {
                                    let s = state.lock().unwrap();
                                    (s.seqno_of(pos), s.buffer[pos].clone())
                                };
                                let _ = channel.send(&Segment::data(seqno, payload));
                            }
                            AckAction::WindowSlid => window_cv.notify_all(),
                            AckAction::TransferComplete => window_cv.notify_all(),
                            AckAction::None => {}
                        }
                    }
                    Phase::FinPending => {
                        let mut s = state.lock().unwrap();
                        if segment.seg_type == SegType::Ack
                            && segment.seqno == s.fsn.wrapping_add(1)
                        {
                            s.phase = Phase::Finished;
                        } else if segment.seg_type != SegType::Ack {
                            s.phase = Phase::ResetPending;
                        }
                    }
                    Phase::Init
                    | Phase::Finished
                    | Phase::ResetPending
                    | Phase::Closed => {}
                }
            }
        })
    }
}

