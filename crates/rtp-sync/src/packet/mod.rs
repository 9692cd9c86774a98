//! RTP and RTCP wire-format deframing
//!
//! Only the pieces the synchronizer needs: the fixed RTP header and the
//! sender-info section of an RTCP Sender Report. Payload handling,
//! reassembly, and the remaining RTCP packet types are out of scope.

pub mod rtcp;

use bytes::Buf;

use crate::error::PacketError;
use crate::{RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// RTP fixed header
/// Defined in RFC 3550 Section 5.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Protocol version (always 2)
    pub version: u8,

    /// Padding flag
    pub padding: bool,

    /// Header extension flag
    pub extension: bool,

    /// Number of CSRC identifiers following the fixed header
    pub csrc_count: u8,

    /// Marker bit
    pub marker: bool,

    /// Payload type
    pub payload_type: u8,

    /// Sequence number
    pub sequence: RtpSequenceNumber,

    /// RTP timestamp (clock-rate units)
    pub timestamp: RtpTimestamp,

    /// Synchronization source identifier
    pub ssrc: RtpSsrc,
}

impl RtpHeader {
    /// Size of the fixed header in bytes, before any CSRC entries
    pub const MIN_SIZE: usize = 12;

    /// Parse the fixed header from the start of an RTP packet.
    ///
    /// CSRC entries (if any) are consumed and skipped so the buffer is left
    /// positioned at the header extension or payload.
    pub fn parse(buf: &mut impl Buf) -> Result<Self, PacketError> {
        if buf.remaining() < Self::MIN_SIZE {
            return Err(PacketError::BufferTooSmall {
                required: Self::MIN_SIZE,
                available: buf.remaining(),
            });
        }

        let first = buf.get_u8();
        let version = first >> 6;
        if version != 2 {
            return Err(PacketError::InvalidVersion(version));
        }
        let padding = (first & 0x20) != 0;
        let extension = (first & 0x10) != 0;
        let csrc_count = first & 0x0F;

        let second = buf.get_u8();
        let marker = (second & 0x80) != 0;
        let payload_type = second & 0x7F;

        let sequence = buf.get_u16();
        let timestamp = buf.get_u32();
        let ssrc = buf.get_u32();

        let csrc_len = csrc_count as usize * 4;
        if buf.remaining() < csrc_len {
            return Err(PacketError::BufferTooSmall {
                required: Self::MIN_SIZE + csrc_len,
                available: Self::MIN_SIZE + buf.remaining(),
            });
        }
        buf.advance(csrc_len);

        Ok(Self {
            version,
            padding,
            extension,
            csrc_count,
            marker,
            payload_type,
            sequence,
            timestamp,
            ssrc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    fn build_header(pt: u8, seq: u16, ts: u32, ssrc: u32) -> BytesMut {
        let mut buf = BytesMut::with_capacity(RtpHeader::MIN_SIZE);
        buf.put_u8(0x80); // version 2, no padding/extension/CSRCs
        buf.put_u8(pt);
        buf.put_u16(seq);
        buf.put_u32(ts);
        buf.put_u32(ssrc);
        buf
    }

    #[test]
    fn test_parse_fixed_header() {
        let buf = build_header(96, 4660, 0xDEAD_BEEF, 0x1234_5678);
        let header = RtpHeader::parse(&mut buf.freeze()).unwrap();

        assert_eq!(header.version, 2);
        assert!(!header.padding);
        assert!(!header.extension);
        assert_eq!(header.csrc_count, 0);
        assert!(!header.marker);
        assert_eq!(header.payload_type, 96);
        assert_eq!(header.sequence, 4660);
        assert_eq!(header.timestamp, 0xDEAD_BEEF);
        assert_eq!(header.ssrc, 0x1234_5678);
    }

    #[test]
    fn test_parse_marker_bit() {
        let mut buf = build_header(0, 0, 0, 0);
        buf[1] = 0x80 | 8; // marker set, PT 8
        let header = RtpHeader::parse(&mut buf.freeze()).unwrap();

        assert!(header.marker);
        assert_eq!(header.payload_type, 8);
    }

    #[test]
    fn test_parse_skips_csrcs() {
        let mut buf = build_header(96, 1, 100, 42);
        buf[0] = 0x80 | 2; // two CSRC entries
        buf.put_u32(0xAAAA_AAAA);
        buf.put_u32(0xBBBB_BBBB);
        buf.put_u8(0xFF); // first payload byte

        let mut data = buf.freeze();
        let header = RtpHeader::parse(&mut data).unwrap();

        assert_eq!(header.csrc_count, 2);
        assert_eq!(data.remaining(), 1);
    }

    #[test]
    fn test_parse_rejects_short_buffer() {
        let buf = build_header(96, 1, 100, 42);
        let mut short = buf.freeze().slice(0..8);

        assert_eq!(
            RtpHeader::parse(&mut short),
            Err(PacketError::BufferTooSmall {
                required: 12,
                available: 8
            })
        );
    }

    #[test]
    fn test_parse_rejects_bad_version() {
        let mut buf = build_header(96, 1, 100, 42);
        buf[0] = 0x40; // version 1

        assert_eq!(
            RtpHeader::parse(&mut buf.freeze()),
            Err(PacketError::InvalidVersion(1))
        );
    }
}
