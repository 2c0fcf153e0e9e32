//! The wire codec (spec.md §4.3): a fixed 4-byte header followed by an
//! optional payload, exactly as produced by [`Segment::encode`].

use crate::error::Error;

/// Maximum payload carried by a single DATA segment.
pub const MSS: usize = 1000;

/// Header size in bytes: two 16-bit fields, `type` then `seqno`.
pub const HEADER_LEN: usize = 4;

/// Largest datagram either peer may emit or must be prepared to receive.
pub const MAX_DATAGRAM: usize = MSS + HEADER_LEN;

/// The five segment types of spec.md §3, wire-encoded as 16-bit unsigned
/// integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegType {
    Data = 0,
    Ack = 1,
    Syn = 2,
    Fin = 3,
    Reset = 4,
}

impl SegType {
    pub fn name(self) -> &'static str {
        match self {
            SegType::Data => "DATA",
            SegType::Ack => "ACK",
            SegType::Syn => "SYN",
            SegType::Fin => "FIN",
            SegType::Reset => "RESET",
        }
    }
}

impl TryFrom<u16> for SegType {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SegType::Data),
            1 => Ok(SegType::Ack),
            2 => Ok(SegType::Syn),
            3 => Ok(SegType::Fin),
            4 => Ok(SegType::Reset),
            other => Err(Error::MalformedDatagram(other as usize)),
        }
    }
}

/// A single segment: header plus payload, present only for `DATA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub seg_type: SegType,
    pub seqno: u16,
    pub payload: Vec<u8>,
}

impl Segment {
    pub fn control(seg_type: SegType, seqno: u16) -> Self {
        Segment {
            seg_type,
            seqno,
            payload: Vec::new(),
        }
    }

    pub fn data(seqno: u16, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MSS);
        Segment {
            seg_type: SegType::Data,
            seqno,
            payload,
        }
    }

    /// Packs `(type, seqno)` as two native-endian `u16`s followed by the
    /// payload. Byte order is internal to this protocol — both peers run
    /// the same binary convention, so any fixed choice is interoperable on
    /// loopback (spec.md §4.3).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&(self.seg_type as u16).to_ne_bytes());
        buf.extend_from_slice(&self.seqno.to_ne_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_LEN {
            return Err(Error::MalformedDatagram(buf.len()));
        }

        let seg_type = u16::from_ne_bytes([buf[0], buf[1]]).try_into()?;
        let seqno = u16::from_ne_bytes([buf[2], buf[3]]);
        let payload = buf[HEADER_LEN..].to_vec();

        Ok(Segment {
            seg_type,
            seqno,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_control_segment() {
        let seg = Segment::control(SegType::Syn, 42);
        let decoded = Segment::decode(&seg.encode()).unwrap();
        assert_eq!(seg, decoded);
    }

    #[test]
    fn round_trips_data_segment() {
        let seg = Segment::data(1000, vec![1, 2, 3, 4, 5]);
        let decoded = Segment::decode(&seg.encode()).unwrap();
        assert_eq!(seg, decoded);
    }

    #[test]
    fn encodes_max_payload_within_datagram_budget() {
        let seg = Segment::data(0, vec![7u8; MSS]);
        let bytes = seg.encode();
        assert_eq!(bytes.len(), MAX_DATAGRAM);
    }

    #[test]
    fn rejects_short_datagram() {
        let err = Segment::decode(&[0, 0, 1]).unwrap_err();
        assert!(matches!(err, Error::MalformedDatagram(3)));
    }

    #[test]
    fn rejects_unknown_type() {
        let mut bytes = Segment::control(SegType::Ack, 0).encode();
        bytes[0] = 9;
        bytes[1] = 0;
        assert!(Segment::decode(&bytes).is_err());
    }
}
