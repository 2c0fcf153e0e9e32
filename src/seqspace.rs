//! Sequence-number arithmetic shared by sender and receiver (spec.md §3,
//! §9: "Sequence-number inversion uses a bounded linear search over wrap
//! counts").

/// Exclusive upper bound on the wrap count `k` used when inverting a
/// sequence number back to a segment position: `k` ranges over `0..15`,
/// matching `original_source`'s `for i in range(0, 15)` exactly. Caps
/// supported file sizes at roughly `15 * 65536` bytes (~983 KB), per
/// spec.md §9.
pub const MAX_WRAP_K: i64 = 15;

const MOD: i64 = 1 << 16;

/// `(seq + delta) mod 2^16`.
pub fn wrapping_add(seq: u16, delta: u32) -> u16 {
    (((seq as u32) + delta) % (MOD as u32)) as u16
}

/// The sequence number carried by the data segment at `pos`: `(dsn +
/// 1000*pos) mod 2^16`.
pub fn seqno_for_position(dsn: u16, pos: usize) -> u16 {
    wrapping_add(dsn, (1000 * pos) as u32)
}

/// Inverts an incoming DATA segment's sequence number back to a position,
/// per spec.md §4.2: search `k in 0..15` for `(seqno + 65536k - dsn) mod
/// 1000 == 0`.
pub fn invert_data_position(seqno: u16, dsn: u16) -> Option<usize> {
    let seqno = seqno as i64;
    let dsn = dsn as i64;

    for k in 0..MAX_WRAP_K {
        let diff = seqno + MOD * k - dsn;
        if diff >= 0 && diff % 1000 == 0 {
            return Some((diff / 1000) as usize);
        }
    }

    None
}

/// Inverts an incoming ACK's sequence number back to the position it
/// covers, per spec.md §4.1. `segment_count` is `N`, the total number of
/// data segments; `file_size` is the exact byte length of the file. Returns
/// `segment_count` when the ACK signals full-file completion (the final,
/// possibly-partial segment).
pub fn invert_ack_position(seqno: u16, dsn: u16, file_size: usize, segment_count: usize) -> Option<usize> {
    let seqno = seqno as i64;
    let dsn = dsn as i64;

    for k in 0..MAX_WRAP_K {
        let diff = seqno + MOD * k - dsn;
        if diff < 0 {
            continue;
        }

        if diff as usize == file_size {
            return Some(segment_count);
        }

        if diff % 1000 == 0 {
            let pos = (diff / 1000) as usize;
            if pos <= segment_count {
                return Some(pos);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seqno_for_position_matches_spec_formula() {
        assert_eq!(seqno_for_position(100, 0), 100);
        assert_eq!(seqno_for_position(100, 3), 3100);
    }

    #[test]
    fn seqno_for_position_wraps() {
        // dsn close to the top of the space, position pushes it past 2^16.
        assert_eq!(seqno_for_position(65000, 1), (65000u32 + 1000 - 65536) as u16);
    }

    #[test]
    fn invert_data_position_recovers_simple_case() {
        let dsn = 500;
        for pos in 0..20 {
            let seqno = seqno_for_position(dsn, pos);
            assert_eq!(invert_data_position(seqno, dsn), Some(pos));
        }
    }

    #[test]
    fn invert_data_position_recovers_across_wrap() {
        let dsn = 60000;
        // position 10 -> seqno = (60000 + 10000) mod 65536 = 4464, wrapped once.
        let pos = 10;
        let seqno = seqno_for_position(dsn, pos);
        assert_eq!(invert_data_position(seqno, dsn), Some(pos));
    }

    #[test]
    fn invert_ack_position_handles_full_multiple_of_mss() {
        let dsn = 0;
        let file_size = 3000;
        let segment_count = 3;
        let seqno = wrapping_add(dsn, file_size as u32);
        assert_eq!(
            invert_ack_position(seqno, dsn, file_size, segment_count),
            Some(segment_count)
        );
    }

    #[test]
    fn invert_ack_position_handles_short_final_segment() {
        let dsn = 0;
        let file_size = 2500; // 3 segments, last is 500 bytes
        let segment_count = 3;
        let seqno = wrapping_add(dsn, file_size as u32);
        assert_eq!(
            invert_ack_position(seqno, dsn, file_size, segment_count),
            Some(segment_count)
        );
    }

    #[test]
    fn invert_ack_position_recovers_mid_window_position() {
        let dsn = 10;
        let file_size = 5000;
        let segment_count = 5;
        let seqno = seqno_for_position(dsn, 2);
        assert_eq!(
            invert_ack_position(seqno, dsn, file_size, segment_count),
            Some(2)
        );
    }
}
