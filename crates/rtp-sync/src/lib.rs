//! RTP timestamp synchronization
//!
//! RTP carries media samples on a per-stream, wrapping 32-bit clock with no
//! absolute time reference. This crate converts that timeline into a shared
//! presentation timeline so that several streams from the same session (for
//! example one audio and one video stream) can be played in lock-step.
//!
//! The central type is [`RtpSynchronizer`]: one instance per media source
//! (one SSRC). Feed it RTCP Sender Reports as they arrive on the control
//! stream and RTP packets as they arrive on the data stream, from any mix of
//! threads, and it produces a corrected presentation timestamp for every
//! packet:
//!
//! - before the first Sender Report arrives, timestamps are interpolated
//!   from the first packet seen;
//! - afterwards, they are anchored to the wall-clock mapping carried in the
//!   reports, including clock drift between consecutive reports.
//!
//! ```
//! use rtp_sync::RtpSynchronizer;
//!
//! let sync = RtpSynchronizer::new(false, None);
//! sync.configure(96, 90_000)?;
//!
//! // No Sender Report yet: the first packet defines the reference point.
//! let pts = sync.process_packet(0x1234, 96, 1_000, 500_000)?;
//! assert_eq!(pts, 500_000);
//!
//! // 90_000 ticks at 90 kHz is exactly one second later.
//! let pts = sync.process_packet(0x1234, 96, 91_000, 0)?;
//! assert_eq!(pts, 500_000 + 1_000_000_000);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod ext_ts;
pub mod packet;
pub mod stats;
pub mod sync;
pub mod time;

pub use error::{ConfigError, PacketError, ReportError};
pub use ext_ts::ExtendedTimestamp;
pub use packet::rtcp::{NtpTimestamp, RtcpPacket, RtcpSenderInfo};
pub use packet::RtpHeader;
pub use stats::{CsvStatsWriter, StatsSink, SyncStats};
pub use sync::RtpSynchronizer;

/// RTP synchronization source identifier
pub type RtpSsrc = u32;

/// RTP timestamp (32 bits, wraps at the stream's clock rate)
pub type RtpTimestamp = u32;

/// RTP sequence number
pub type RtpSequenceNumber = u16;
