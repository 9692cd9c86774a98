use thiserror::Error;

/// Errors from [`RtpSynchronizer::configure`](crate::RtpSynchronizer::configure)
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Clock rate must be strictly positive
    #[error("clock-rate {0} not allowed, must be > 0")]
    InvalidClockRate(i32),

    /// The synchronizer handles a single payload type, set exactly once
    #[error("already configured, only one payload type allowed")]
    AlreadyConfigured,
}

/// Errors from processing an RTP data packet
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// Packet SSRC does not match the source this synchronizer is bound to
    #[error("invalid SSRC {found}, not matching with {expected}")]
    SenderMismatch {
        /// SSRC bound from the first packet
        expected: u32,
        /// SSRC carried by the rejected packet
        found: u32,
    },

    /// Payload type differs from the configured one
    #[error("unknown payload type {found}, expected {expected}")]
    UnknownPayloadType {
        /// Configured payload type
        expected: u8,
        /// Payload type carried by the rejected packet
        found: u8,
    },

    /// No payload type / clock rate configured yet
    #[error("no payload format configured")]
    NotConfigured,

    /// Sorted delivery was promised but this packet went backwards on the
    /// RTP timeline. The synchronizer has fallen back to unsorted mode and
    /// still produced a best-effort result, carried here.
    #[error("unsorted RTP packet received when expecting sorted, moving to unsorted mode")]
    OutOfOrder {
        /// Best-effort presentation timestamp computed for the packet
        pts: u64,
    },

    /// Buffer too short to hold an RTP header
    #[error("RTP buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Minimum number of bytes required
        required: usize,
        /// Number of bytes available
        available: usize,
    },

    /// RTP version field is not 2
    #[error("invalid RTP version: {0}")]
    InvalidVersion(u8),
}

/// Errors from deframing an RTCP buffer
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    /// Buffer too short for an RTCP packet header or Sender Report body
    #[error("RTCP buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Minimum number of bytes required
        required: usize,
        /// Number of bytes available
        available: usize,
    },

    /// RTCP version field is not 2
    #[error("invalid RTCP version: {0}")]
    InvalidVersion(u8),
}
