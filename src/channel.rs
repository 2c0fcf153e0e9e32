//! The channel adapter (spec.md §4.4): a thin layer over a UDP socket that
//! logs every send/receive and, when configured with nonzero loss
//! probabilities, simulates datagram loss. This is test scaffolding per
//! spec.md §1/§4.4, not protocol behavior — the sender always runs with
//! `flp = rlp = 0` (it has no CLI-exposed loss parameters); only the
//! receiver is ever configured with nonzero probabilities, matching
//! `receiver.py`'s `send_msg`/`fw_listener`.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::error::Error;
use crate::stats::ActionLog;
use crate::wire::{SegType, Segment, MAX_DATAGRAM};

/// Converts a probability in `[0, 1]` to an integer percentage in `[0,
/// 100]`, as spec.md §4.4 and `receiver.py` (`int(float(flp) * 100)`) do.
pub fn to_percent(probability: f64) -> u32 {
    ((probability * 100.0).round() as i64).clamp(0, 100) as u32
}

pub struct Channel {
    socket: UdpSocket,
    peer: SocketAddr,
    flp_pct: u32,
    rlp_pct: u32,
    log: Arc<Mutex<ActionLog>>,
    dropped_sends: AtomicU64,
    dropped_data_recvs: AtomicU64,
}

impl Channel {
    pub fn new(socket: UdpSocket, peer: SocketAddr, log: Arc<Mutex<ActionLog>>) -> Self {
        Channel {
            socket,
            peer,
            flp_pct: 0,
            rlp_pct: 0,
            log,
            dropped_sends: AtomicU64::new(0),
            dropped_data_recvs: AtomicU64::new(0),
        }
    }

    /// Segments this channel failed to put on the wire due to the
    /// reverse-loss roll. A peer (like the receiver) only ever sends ACKs,
    /// so this doubles as its "ACK Segments Dropped" counter.
    pub fn dropped_sends(&self) -> u64 {
        self.dropped_sends.load(Ordering::Relaxed)
    }

    /// DATA segments dropped by the forward-loss roll on the way in,
    /// mirroring the reference implementation's `drpdata` (which counts
    /// only DATA drops, not SYN/FIN/control drops).
    pub fn dropped_data_recvs(&self) -> u64 {
        self.dropped_data_recvs.load(Ordering::Relaxed)
    }

    pub fn with_loss(mut self, flp_pct: u32, rlp_pct: u32) -> Self {
        self.flp_pct = flp_pct;
        self.rlp_pct = rlp_pct;
        self
    }

    fn rolls_below(pct: u32) -> bool {
        pct > 0 && rand::thread_rng().gen_range(0..100) < pct
    }

    /// Sends `segment`. Returns `true` if it was actually put on the wire,
    /// `false` if the reverse-loss roll silently dropped it. RESET always
    /// bypasses loss simulation (spec.md §4.4, §8 invariant 5).
    pub fn send(&self, segment: &Segment) -> Result<bool, Error> {
        let size = segment.payload.len();

        if segment.seg_type != SegType::Reset && Self::rolls_below(self.rlp_pct) {
            self.log.lock().unwrap().dropped(segment.seg_type, segment.seqno, size);
            self.dropped_sends.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }

        self.socket.send_to(&segment.encode(), self.peer)?;
        self.log.lock().unwrap().sent(segment.seg_type, segment.seqno, size);
        Ok(true)
    }

    /// Blocks for the next segment that survives the forward-loss roll.
    /// Dropped arrivals are logged and skipped transparently, exactly like
    /// `receiver.py`'s `fw_listener` loop.
    pub fn recv(&self) -> Result<Segment, Error> {
        let mut buf = [0u8; MAX_DATAGRAM];

        loop {
            let (n, _src) = self.socket.recv_from(&mut buf)?;
            let segment = Segment::decode(&buf[..n])?;
            let size = segment.payload.len();

            if segment.seg_type != SegType::Reset && Self::rolls_below(self.flp_pct) {
                self.log.lock().unwrap().dropped(segment.seg_type, segment.seqno, size);
                if segment.seg_type == SegType::Data {
                    self.dropped_data_recvs.fetch_add(1, Ordering::Relaxed);
                }
                continue;
            }

            self.log.lock().unwrap().received(segment.seg_type, segment.seqno, size);
            return Ok(segment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_conversion_matches_reference() {
        assert_eq!(to_percent(0.0), 0);
        assert_eq!(to_percent(0.5), 50);
        assert_eq!(to_percent(1.0), 100);
    }
}
