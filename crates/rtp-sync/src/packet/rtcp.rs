//! RTCP Sender Report deframing
//!
//! RTCP arrives as compound buffers; the synchronizer only cares about the
//! first packet and only when it is a Sender Report. Everything else is
//! reported back as [`RtcpPacket::Other`] so the caller can ignore it.

use bytes::Buf;

use crate::error::ReportError;
use crate::time::NANOS_PER_SEC;
use crate::{RtpSsrc, RtpTimestamp};

/// RTCP packet type value for Sender Reports
pub const RTCP_TYPE_SR: u8 = 200;

/// NTP timestamp representation (64 bits)
/// As defined in RFC 3550
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NtpTimestamp {
    /// Seconds since January 1, 1900
    pub seconds: u32,

    /// Fraction of a second
    pub fraction: u32,
}

impl NtpTimestamp {
    /// Convert from the 64-bit wire representation
    pub fn from_u64(value: u64) -> Self {
        Self {
            seconds: (value >> 32) as u32,
            fraction: value as u32,
        }
    }

    /// Convert to the 64-bit wire representation
    pub fn to_u64(&self) -> u64 {
        (self.seconds as u64) << 32 | (self.fraction as u64)
    }

    /// Convert to nanoseconds.
    ///
    /// The value is a Q32.32 fixed-point second count; the conversion
    /// `raw * 1e9 / 2^32` is done in 128-bit arithmetic so no precision is
    /// lost. The result always fits: 2^32 seconds is about 4.3e18 ns.
    pub fn to_nanos(&self) -> u64 {
        ((self.to_u64() as u128 * NANOS_PER_SEC as u128) >> 32) as u64
    }
}

/// Sender-info section of an RTCP Sender Report
/// Defined in RFC 3550 Section 6.4.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpSenderInfo {
    /// SSRC of the sender
    pub ssrc: RtpSsrc,

    /// Wall-clock time when this report was sent
    pub ntp: NtpTimestamp,

    /// The same instant expressed on the sender's RTP clock
    pub rtp_timestamp: RtpTimestamp,

    /// Sender's packet count
    pub packet_count: u32,

    /// Sender's octet count
    pub octet_count: u32,
}

/// First packet of a compound RTCP buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcpPacket {
    /// A Sender Report with its sender-info section
    SenderReport(RtcpSenderInfo),

    /// Any other RTCP packet type (carried so callers can log it)
    Other(u8),
}

/// RTCP common header size in bytes
const HEADER_SIZE: usize = 4;

/// Sender-info section size in bytes (SSRC + NTP + RTP ts + counts)
const SENDER_INFO_SIZE: usize = 24;

/// Parse the first packet of a compound RTCP buffer.
///
/// Sender Reports yield their sender-info section; other packet types are
/// not parsed further. Report blocks trailing the sender info are left in
/// the buffer.
pub fn parse_first_packet(buf: &mut impl Buf) -> Result<RtcpPacket, ReportError> {
    if buf.remaining() < HEADER_SIZE {
        return Err(ReportError::BufferTooSmall {
            required: HEADER_SIZE,
            available: buf.remaining(),
        });
    }

    let first = buf.get_u8();
    let version = first >> 6;
    if version != 2 {
        return Err(ReportError::InvalidVersion(version));
    }

    let packet_type = buf.get_u8();
    let _length = buf.get_u16();

    if packet_type != RTCP_TYPE_SR {
        return Ok(RtcpPacket::Other(packet_type));
    }

    if buf.remaining() < SENDER_INFO_SIZE {
        return Err(ReportError::BufferTooSmall {
            required: HEADER_SIZE + SENDER_INFO_SIZE,
            available: HEADER_SIZE + buf.remaining(),
        });
    }

    let ssrc = buf.get_u32();
    let ntp = NtpTimestamp {
        seconds: buf.get_u32(),
        fraction: buf.get_u32(),
    };
    let rtp_timestamp = buf.get_u32();
    let packet_count = buf.get_u32();
    let octet_count = buf.get_u32();

    Ok(RtcpPacket::SenderReport(RtcpSenderInfo {
        ssrc,
        ntp,
        rtp_timestamp,
        packet_count,
        octet_count,
    }))
}
