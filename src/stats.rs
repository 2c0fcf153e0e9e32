//! The log surface (spec.md §6): one `action t_ms type_name seqno size`
//! line per send/receive/drop event, followed by summary counters, written
//! to a file exactly as the original Python reference implementation does
//! via `logging.basicConfig`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::wire::SegType;

pub struct ActionLog {
    writer: BufWriter<File>,
    origin: Option<Instant>,
}

impl ActionLog {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(ActionLog {
            writer: BufWriter::new(file),
            origin: None,
        })
    }

    fn t_ms(&mut self) -> u128 {
        match self.origin {
            Some(origin) => origin.elapsed().as_millis(),
            None => {
                self.origin = Some(Instant::now());
                0
            }
        }
    }

    /// Rewinds the logging clock's origin. The receiver does this whenever
    /// a SYN arrives before the connection is established, mirroring
    /// `receiver.py`'s `self.itstamp = 0` so repeated handshake retries
    /// each restart the "time since first logged event" baseline.
    pub fn reset_origin(&mut self) {
        self.origin = None;
    }

    fn event(&mut self, action: &str, seg_type: SegType, seqno: u16, size: usize) {
        let t_ms = self.t_ms();
        let _ = writeln!(self.writer, "{action}\t{t_ms}\t{}\t{seqno}\t{size}", seg_type.name());
    }

    pub fn sent(&mut self, seg_type: SegType, seqno: u16, size: usize) {
        self.event("snd", seg_type, seqno, size);
    }

    pub fn received(&mut self, seg_type: SegType, seqno: u16, size: usize) {
        self.event("rcv", seg_type, seqno, size);
    }

    pub fn dropped(&mut self, seg_type: SegType, seqno: u16, size: usize) {
        self.event("drp", seg_type, seqno, size);
    }

    pub fn summary_line(&mut self, line: &str) {
        let _ = writeln!(self.writer, "{line}");
    }

    pub fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Sender-side counters (spec.md §6: "summary counters (bytes transferred,
/// segments sent/received, duplicates, drops, retransmits)").
#[derive(Debug, Default, Clone, Copy)]
pub struct SenderStats {
    pub bytes_sent: u64,
    pub segments_sent: u64,
    pub retransmits: u64,
    pub dup_acks: u64,
}

impl SenderStats {
    pub fn write_summary(&self, log: &mut ActionLog) {
        log.summary_line(&format!("Data Transferred: {} bytes", self.bytes_sent));
        log.summary_line(&format!("Data Segments Sent: {}", self.segments_sent));
        log.summary_line(&format!("Retransmitted Data Segments: {}", self.retransmits));
        log.summary_line(&format!("Duplicate Acknowledgements: {}", self.dup_acks));
        log.flush();
    }
}

/// Receiver-side counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReceiverStats {
    pub bytes_received: u64,
    pub segments_received: u64,
    pub duplicate_data: u64,
    pub dropped_data: u64,
    pub dropped_ack: u64,
}

impl ReceiverStats {
    pub fn write_summary(&self, log: &mut ActionLog) {
        log.summary_line(&format!("Data Received: {} bytes", self.bytes_received));
        log.summary_line(&format!("Data Segments Received: {}", self.segments_received));
        log.summary_line(&format!("Duplicate Data Segments Received: {}", self.duplicate_data));
        log.summary_line(&format!("Data Segments Dropped: {}", self.dropped_data));
        log.summary_line(&format!("ACK Segments Dropped: {}", self.dropped_ack));
        log.flush();
    }
}
