//! The on-wire frame layout and its pack/parse helpers.
//!
//! A frame is an 18-byte packed little-endian header followed by `len`
//! payload bytes:
//!
//! | field  | size | meaning |
//! |--------|------|---------|
//! | magic  | 2    | constant `0xB17E` |
//! | flags  | 1    | bitfield: ACK, DATA, FIN (reserved) |
//! | hdrlen | 1    | fixed 10 = bytes from `seq` through `len` |
//! | seq    | 4    | sender sequence number, mod 2^32 |
//! | ack    | 4    | cumulative ack: next sequence expected |
//! | len    | 2    | payload length in bytes |
//! | crc32c | 4    | digest over header+payload, field zeroed during computation |
//!
//! Parse validates magic, hdrlen, checksum, and the declared length against
//! the received span; every failure is silent and leaves no side effects.

use byteorder::{ByteOrder, LittleEndian};

use crate::checksum::frame_checksum;

/// Frame identification constant.
pub const MAGIC: u16 = 0xB17E;
/// Total header size on the wire, in bytes.
pub const HEADER_SIZE: usize = 18;
/// Fixed value of the `hdrlen` field: bytes from `seq` through `len`.
pub const HDRLEN: u8 = 10;
/// Byte offset of the checksum field within the header.
const CRC_OFFSET: usize = 14;

/// Frame carries an acknowledgment number.
pub const FLAG_ACK: u8 = 0x01;
/// Frame carries payload data.
pub const FLAG_DATA: u8 = 0x02;
/// Reserved for session teardown; never set by the transports.
pub const FLAG_FIN: u8 = 0x04;

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Flag bitfield (`FLAG_ACK` | `FLAG_DATA` | `FLAG_FIN`).
    pub flags: u8,
    /// Sender sequence number.
    pub seq: u32,
    /// Cumulative acknowledgment: next sequence the sender expects.
    pub ack: u32,
    /// Payload length in bytes.
    pub len: u16,
}

impl FrameHeader {
    /// Whether the DATA flag is set.
    pub fn is_data(&self) -> bool {
        self.flags & FLAG_DATA != 0
    }

    /// Whether the ACK flag is set.
    pub fn is_ack(&self) -> bool {
        self.flags & FLAG_ACK != 0
    }
}

/// Packs a frame into `buf` and returns the total bytes written.
///
/// Returns 0 when `buf` cannot hold header plus payload or the payload
/// exceeds the 16-bit length field; nothing is written in that case.
pub fn pack(buf: &mut [u8], flags: u8, seq: u32, ack: u32, payload: &[u8]) -> usize {
    if payload.len() > usize::from(u16::MAX) {
        return 0;
    }
    let total = HEADER_SIZE + payload.len();
    if buf.len() < total {
        return 0;
    }

    LittleEndian::write_u16(&mut buf[0..2], MAGIC);
    buf[2] = flags;
    buf[3] = HDRLEN;
    LittleEndian::write_u32(&mut buf[4..8], seq);
    LittleEndian::write_u32(&mut buf[8..12], ack);
    LittleEndian::write_u16(&mut buf[12..14], payload.len() as u16);
    LittleEndian::write_u32(&mut buf[CRC_OFFSET..CRC_OFFSET + 4], 0);
    buf[HEADER_SIZE..total].copy_from_slice(payload);

    let crc = frame_checksum(&buf[..total]);
    LittleEndian::write_u32(&mut buf[CRC_OFFSET..CRC_OFFSET + 4], crc);
    total
}

/// Parses and validates the frame in `buf`, returning the header and a
/// borrow of the payload bytes.
///
/// `None` on any malformation: short span, wrong magic or hdrlen, checksum
/// mismatch, or a declared length longer than the received bytes.
pub fn parse(buf: &[u8]) -> Option<(FrameHeader, &[u8])> {
    if buf.len() < HEADER_SIZE {
        return None;
    }
    if LittleEndian::read_u16(&buf[0..2]) != MAGIC {
        return None;
    }
    if buf[3] != HDRLEN {
        return None;
    }

    let stored_crc = LittleEndian::read_u32(&buf[CRC_OFFSET..CRC_OFFSET + 4]);
    let mut scratch = buf.to_vec();
    scratch[CRC_OFFSET..CRC_OFFSET + 4].fill(0);
    if frame_checksum(&scratch) != stored_crc {
        return None;
    }

    let header = FrameHeader {
        flags: buf[2],
        seq: LittleEndian::read_u32(&buf[4..8]),
        ack: LittleEndian::read_u32(&buf[8..12]),
        len: LittleEndian::read_u16(&buf[12..14]),
    };
    let end = HEADER_SIZE + usize::from(header.len);
    if buf.len() < end {
        return None;
    }
    Some((header, &buf[HEADER_SIZE..end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(flags: u8, seq: u32, ack: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE + payload.len()];
        let n = pack(&mut buf, flags, seq, ack, payload);
        assert_eq!(n, HEADER_SIZE + payload.len());
        buf
    }

    #[test]
    fn round_trip_preserves_all_fields() {
        let frame = packed(FLAG_DATA | FLAG_ACK, 0xDEAD_BEEF, 42, b"cheeseburger");
        let (h, payload) = parse(&frame).expect("valid frame");
        assert_eq!(h.flags, FLAG_DATA | FLAG_ACK);
        assert_eq!(h.seq, 0xDEAD_BEEF);
        assert_eq!(h.ack, 42);
        assert_eq!(h.len, 12);
        assert_eq!(payload, b"cheeseburger");
    }

    #[test]
    fn ack_only_frame() {
        let frame = packed(FLAG_ACK, 0, 42, b"");
        let (h, payload) = parse(&frame).expect("valid frame");
        assert!(h.is_ack());
        assert!(!h.is_data());
        assert_eq!(h.seq, 0);
        assert_eq!(h.ack, 42);
        assert_eq!(h.len, 0);
        assert!(payload.is_empty());
    }

    #[test]
    fn any_single_bit_flip_fails_parse() {
        let frame = packed(FLAG_DATA, 7, 3, b"fries");
        for byte in 0..frame.len() {
            for bit in 0..8 {
                let mut corrupt = frame.clone();
                corrupt[byte] ^= 1 << bit;
                assert!(
                    parse(&corrupt).is_none(),
                    "flip of byte {} bit {} was accepted",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn pack_fails_on_short_buffer() {
        let mut buf = [0u8; HEADER_SIZE + 3];
        assert_eq!(pack(&mut buf, FLAG_DATA, 1, 1, b"milkshake"), 0);
        // Nothing was written.
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn parse_fails_on_truncation() {
        let frame = packed(FLAG_DATA, 1, 1, b"salad");
        assert!(parse(&frame[..HEADER_SIZE - 1]).is_none());
        assert!(parse(&frame[..frame.len() - 1]).is_none());
        assert!(parse(&[]).is_none());
    }

    #[test]
    fn parse_fails_on_wrong_magic() {
        let mut frame = packed(FLAG_DATA, 1, 1, b"x");
        frame[0] = 0x00;
        frame[1] = 0x00;
        assert!(parse(&frame).is_none());
    }

    #[test]
    fn parse_fails_on_wrong_hdrlen_even_with_valid_checksum() {
        let mut frame = packed(FLAG_DATA, 1, 1, b"x");
        frame[3] = 14;
        // Recompute the checksum so only the hdrlen check can reject it.
        frame[CRC_OFFSET..CRC_OFFSET + 4].fill(0);
        let crc = frame_checksum(&frame);
        LittleEndian::write_u32(&mut frame[CRC_OFFSET..CRC_OFFSET + 4], crc);
        assert!(parse(&frame).is_none());
    }

    #[test]
    fn checksum_covers_the_full_received_span() {
        let mut frame = packed(FLAG_DATA, 9, 2, b"pie");
        frame.push(0xEE);
        assert!(parse(&frame).is_none());
    }

    #[test]
    fn max_payload_round_trips() {
        let payload = vec![0x5au8; usize::from(u16::MAX)];
        let frame = packed(FLAG_DATA, 1, 0, &payload);
        let (h, body) = parse(&frame).expect("valid frame");
        assert_eq!(usize::from(h.len), payload.len());
        assert_eq!(body, &payload[..]);
    }

    #[test]
    fn oversized_payload_is_rejected_at_pack() {
        let payload = vec![0u8; usize::from(u16::MAX) + 1];
        let mut buf = vec![0u8; HEADER_SIZE + payload.len()];
        assert_eq!(pack(&mut buf, FLAG_DATA, 0, 0, &payload), 0);
    }
}
