//! RTP timestamp synchronizer
//!
//! One [`RtpSynchronizer`] per media source (one SSRC). RTCP Sender Reports
//! and RTP data packets for that source can be fed concurrently from
//! independent threads; all state transitions are serialized by one mutex,
//! taken exactly once per public call.
//!
//! Until the first Sender Report arrives, presentation timestamps are
//! interpolated from the first packet seen. Afterwards they are anchored to
//! the report's wall-clock mapping: the local arrival time of the first
//! report, shifted by the NTP drift between the first and the most recent
//! report, then by the RTP-clock distance between the packet and the most
//! recent report.

use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::error::{ConfigError, PacketError, ReportError};
use crate::ext_ts::ExtendedTimestamp;
use crate::packet::rtcp::{self, NtpTimestamp, RtcpPacket};
use crate::packet::RtpHeader;
use crate::stats::{StatsSink, SyncStats};
use crate::time::ticks_to_nanos;
use crate::{RtpSsrc, RtpTimestamp};

/// Payload type and clock rate, set exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PayloadFormat {
    payload_type: u8,
    clock_rate: i32,
}

/// Wall-clock anchor taken from the first Sender Report, never overwritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClockAnchor {
    ntp_time_ns: u64,
    local_time_ns: u64,
}

/// Correlation data from the most recent Sender Report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastReport {
    ext_ts: u64,
    ntp_time_ns: u64,
}

/// Reference point for pre-anchor interpolation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InterpolationBase {
    ext_ts: u64,
    pts_ns: u64,
}

/// Last accepted packet while sorted delivery holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SortedLast {
    ext_ts: u64,
    pts_ns: u64,
}

/// Delivery-order contract. Sorted mode can only ever move to unsorted;
/// there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedMode {
    Sorted(Option<SortedLast>),
    Unsorted,
}

struct SyncState {
    mode: FeedMode,
    ssrc: Option<RtpSsrc>,
    format: Option<PayloadFormat>,
    // Shared by RTP and RTCP input: Sender Reports carry a timestamp on the
    // same wrapping clock as the data packets.
    ext_ts: ExtendedTimestamp,
    anchor: Option<ClockAnchor>,
    last_report: Option<LastReport>,
    interpolate: Option<InterpolationBase>,
    interpolate_logged: bool,
}

/// Maps one source's wrapping RTP timeline onto the presentation timeline.
///
/// See the [crate docs](crate) for the overall model and an example.
pub struct RtpSynchronizer {
    state: Mutex<SyncState>,
    stats: Option<Arc<dyn StatsSink>>,
}

impl RtpSynchronizer {
    /// Create a synchronizer.
    ///
    /// With `feed_sorted` the caller promises to deliver RTP packets in
    /// non-decreasing timestamp order; the synchronizer then suppresses
    /// duplicate timestamps and guarantees non-decreasing output, falling
    /// back to unsorted mode if the promise is broken. A `stats` sink, if
    /// given, receives one [`SyncStats`] record per processed packet.
    pub fn new(feed_sorted: bool, stats: Option<Arc<dyn StatsSink>>) -> Self {
        let mode = if feed_sorted {
            FeedMode::Sorted(None)
        } else {
            FeedMode::Unsorted
        };

        Self {
            state: Mutex::new(SyncState {
                mode,
                ssrc: None,
                format: None,
                ext_ts: ExtendedTimestamp::new(),
                anchor: None,
                last_report: None,
                interpolate: None,
                interpolate_logged: false,
            }),
            stats,
        }
    }

    /// Set the payload type and clock rate this synchronizer accepts.
    ///
    /// Exactly one payload type is handled per instance, so this succeeds
    /// at most once.
    pub fn configure(&self, payload_type: u8, clock_rate: i32) -> Result<(), ConfigError> {
        if clock_rate <= 0 {
            error!(clock_rate, "clock-rate <= 0 not allowed");
            return Err(ConfigError::InvalidClockRate(clock_rate));
        }

        let mut state = self.state.lock();

        if state.format.is_some() {
            error!("only one payload type allowed");
            return Err(ConfigError::AlreadyConfigured);
        }

        state.format = Some(PayloadFormat {
            payload_type,
            clock_rate,
        });

        Ok(())
    }

    /// Feed the sender-info of an RTCP Sender Report.
    ///
    /// `arrival_time_ns` is the local time the report was received at; the
    /// first report's arrival becomes the wall-clock anchor, and every
    /// report updates the most recent correlation.
    pub fn process_sender_report(
        &self,
        rtp_ts: RtpTimestamp,
        ntp: NtpTimestamp,
        arrival_time_ns: u64,
    ) {
        let ntp_time_ns = ntp.to_nanos();

        let mut state = self.state.lock();

        let ext_ts = state.ext_ts.next(rtp_ts);

        if state.anchor.is_none() {
            debug!(ntp_time_ns, arrival_time_ns, "sender report received: stop interpolating pts");
            state.anchor = Some(ClockAnchor {
                ntp_time_ns,
                local_time_ns: arrival_time_ns,
            });
        }

        state.last_report = Some(LastReport { ext_ts, ntp_time_ns });
    }

    /// Feed a raw compound RTCP buffer.
    ///
    /// Only the first packet is inspected; anything that is not a Sender
    /// Report is ignored without touching synchronization state.
    pub fn process_rtcp_buffer(&self, buf: &[u8], arrival_time_ns: u64) -> Result<(), ReportError> {
        let mut buf = buf;
        match rtcp::parse_first_packet(&mut buf)? {
            RtcpPacket::SenderReport(info) => {
                debug!(
                    ssrc = info.ssrc,
                    rtp_ts = info.rtp_timestamp,
                    ntp_time_ns = info.ntp.to_nanos(),
                    arrival_time_ns,
                    "process rtcp sender report"
                );
                self.process_sender_report(info.rtp_timestamp, info.ntp, arrival_time_ns);
            }
            RtcpPacket::Other(packet_type) => {
                debug!(packet_type, "ignore rtcp packet");
            }
        }
        Ok(())
    }

    /// Compute the presentation timestamp for one RTP data packet.
    ///
    /// `pts_orig_ns` is the timestamp the packet arrived with; it seeds the
    /// interpolation reference while no Sender Report has been received and
    /// is replaced by the synchronized value afterwards. On
    /// [`PacketError::OutOfOrder`] the synchronizer has already downgraded
    /// to unsorted mode and the error carries a usable best-effort result.
    pub fn process_packet(
        &self,
        ssrc: RtpSsrc,
        payload_type: u8,
        rtp_ts: RtpTimestamp,
        pts_orig_ns: u64,
    ) -> Result<u64, PacketError> {
        self.process_packet_inner(ssrc, payload_type, rtp_ts, pts_orig_ns, None)
    }

    /// Feed a raw RTP packet buffer.
    ///
    /// Parses the fixed header for SSRC, payload type, and timestamp, then
    /// runs the same path as [`Self::process_packet`]. `dts_ns` is the local
    /// arrival time; it only flows into the stats record.
    pub fn process_rtp_buffer(
        &self,
        buf: &[u8],
        pts_orig_ns: u64,
        dts_ns: Option<u64>,
    ) -> Result<u64, PacketError> {
        let mut buf = buf;
        let header = RtpHeader::parse(&mut buf)?;
        self.process_packet_inner(
            header.ssrc,
            header.payload_type,
            header.timestamp,
            pts_orig_ns,
            dts_ns,
        )
    }

    fn process_packet_inner(
        &self,
        ssrc: RtpSsrc,
        payload_type: u8,
        rtp_ts: RtpTimestamp,
        pts_orig_ns: u64,
        dts_ns: Option<u64>,
    ) -> Result<u64, PacketError> {
        let mut state = self.state.lock();

        // The first packet binds the source identity.
        match state.ssrc {
            None => state.ssrc = Some(ssrc),
            Some(expected) if expected != ssrc => {
                error!(ssrc, expected, "invalid SSRC, not matching");
                return Err(PacketError::SenderMismatch {
                    expected,
                    found: ssrc,
                });
            }
            Some(_) => {}
        }

        let format = match state.format {
            Some(format) => format,
            None => {
                error!(ssrc, payload_type, "no payload format configured");
                return Err(PacketError::NotConfigured);
            }
        };
        if payload_type != format.payload_type {
            error!(
                payload_type,
                expected = format.payload_type,
                "unknown payload type"
            );
            return Err(PacketError::UnknownPayloadType {
                expected: format.payload_type,
                found: payload_type,
            });
        }

        let ext_ts = state.ext_ts.next(rtp_ts);

        let mut out_of_order = false;
        if let FeedMode::Sorted(Some(last)) = state.mode {
            if ext_ts < last.ext_ts {
                warn!(
                    ssrc,
                    rtp_ts,
                    ext_ts,
                    last_ext_ts = last.ext_ts,
                    "received an unsorted rtp packet when expecting sorted, moving to unsorted mode"
                );
                state.mode = FeedMode::Unsorted;
                out_of_order = true;
            } else if ext_ts == last.ext_ts {
                // Same timestamp as the previous packet: reuse its result.
                let record =
                    self.capture_stats(&state, ssrc, format.clock_rate, pts_orig_ns, last.pts_ns, dts_ns, ext_ts);
                drop(state);
                self.record_stats(record);
                return Ok(last.pts_ns);
            }
        }

        let mut pts = match (state.anchor, state.last_report) {
            (Some(anchor), Some(report)) => {
                let (base, wrap) =
                    apply_ntp_drift(anchor.local_time_ns, anchor.ntp_time_ns, report.ntp_time_ns);
                apply_rtp_drift(base, report.ext_ts, ext_ts, format.clock_rate, wrap)
            }
            _ => {
                if !state.interpolate_logged {
                    debug!(
                        ssrc,
                        payload_type, "sender report not received yet: interpolating pts"
                    );
                    state.interpolate_logged = true;
                }

                match state.interpolate {
                    None => {
                        state.interpolate = Some(InterpolationBase {
                            ext_ts,
                            pts_ns: pts_orig_ns,
                        });
                        pts_orig_ns
                    }
                    Some(base) => {
                        apply_rtp_drift(base.pts_ns, base.ext_ts, ext_ts, format.clock_rate, Wrap::None)
                    }
                }
            }
        };

        if let FeedMode::Sorted(ref mut last_slot) = state.mode {
            if let Some(last) = *last_slot {
                if pts < last.pts_ns {
                    warn!(
                        ssrc,
                        rtp_ts,
                        ext_ts,
                        last_pts = last.pts_ns,
                        pts,
                        "fix pts not increasing monotonically, pinned to last"
                    );
                    pts = last.pts_ns;
                }
            }
            *last_slot = Some(SortedLast { ext_ts, pts_ns: pts });
        }

        let record =
            self.capture_stats(&state, ssrc, format.clock_rate, pts_orig_ns, pts, dts_ns, ext_ts);
        drop(state);
        self.record_stats(record);

        if out_of_order {
            Err(PacketError::OutOfOrder { pts })
        } else {
            Ok(pts)
        }
    }

    /// Snapshot the stats record while the lock is still held. Returns
    /// `None` when no sink is attached so the snapshot costs nothing.
    fn capture_stats(
        &self,
        state: &SyncState,
        ssrc: RtpSsrc,
        clock_rate: i32,
        pts_orig_ns: u64,
        pts_ns: u64,
        dts_ns: Option<u64>,
        rtp_ext_ts: u64,
    ) -> Option<SyncStats> {
        self.stats.as_ref()?;

        let entry_time_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        Some(SyncStats {
            entry_time_ns,
            thread: format!("{:?}", thread::current().id()),
            ssrc,
            clock_rate,
            pts_orig_ns,
            pts_ns,
            dts_ns,
            rtp_ext_ts,
            last_sr_ntp_ns: state.last_report.map(|r| r.ntp_time_ns),
            last_sr_ext_ts: state.last_report.map(|r| r.ext_ts),
        })
    }

    /// Deliver a captured record to the sink, outside the critical section.
    fn record_stats(&self, record: Option<SyncStats>) {
        if let (Some(sink), Some(record)) = (self.stats.as_ref(), record) {
            sink.record(&record);
        }
    }
}

/// Which side of the representable range an intermediate result fell off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wrap {
    None,
    Up,
    Down,
}

/// Shift `pts` by the wall-clock drift between the anchor report and the
/// most recent one.
///
/// The raw addition is allowed to wrap; the returned flag tells the
/// RTP-domain step which side of the representable range the true value
/// lies on, so the two steps share one saturation decision instead of each
/// clamping independently.
fn apply_ntp_drift(pts: u64, anchor_ntp_ns: u64, last_ntp_ns: u64) -> (u64, Wrap) {
    if last_ntp_ns > anchor_ntp_ns {
        let diff = last_ntp_ns - anchor_ntp_ns;
        let wrap = if diff > u64::MAX - pts { Wrap::Up } else { Wrap::None };
        (pts.wrapping_add(diff), wrap)
    } else if last_ntp_ns < anchor_ntp_ns {
        let diff = anchor_ntp_ns - last_ntp_ns;
        let wrap = if pts < diff { Wrap::Down } else { Wrap::None };
        (pts.wrapping_sub(diff), wrap)
    } else {
        (pts, Wrap::None)
    }
}

/// Shift `pts` by the RTP-clock distance between `base_ext_ts` and
/// `ext_ts`, honoring a wrap flag carried over from the NTP step.
///
/// A wrapped intermediate value recovers when this step moves it back
/// across the range boundary; otherwise the result clamps to the boundary
/// that was crossed.
fn apply_rtp_drift(pts: u64, base_ext_ts: u64, ext_ts: u64, clock_rate: i32, wrap: Wrap) -> u64 {
    if ext_ts > base_ext_ts {
        let diff = ticks_to_nanos(ext_ts - base_ext_ts, clock_rate);
        match wrap {
            Wrap::Up => {
                warn!("pts wrapped up, clamping to maximum");
                u64::MAX
            }
            Wrap::Down if diff < u64::MAX - pts => {
                warn!("pts wrapped down, clamping to 0");
                0
            }
            Wrap::None if diff > u64::MAX - pts => {
                warn!("rtp diff exceeds remaining range, clamping to maximum");
                u64::MAX
            }
            // A wrapped-down value recovers once the forward step crosses
            // back over the boundary.
            _ => pts.wrapping_add(diff),
        }
    } else if ext_ts < base_ext_ts {
        let diff = ticks_to_nanos(base_ext_ts - ext_ts, clock_rate);
        match wrap {
            Wrap::Down => {
                warn!("pts wrapped down, clamping to 0");
                0
            }
            Wrap::Up if diff < pts => {
                warn!("pts wrapped up, clamping to maximum");
                u64::MAX
            }
            Wrap::None if diff > pts => {
                warn!("rtp diff greater than base pts, clamping to 0");
                0
            }
            _ => pts.wrapping_sub(diff),
        }
    } else {
        match wrap {
            Wrap::Down => {
                warn!("pts wrapped down, clamping to 0");
                0
            }
            Wrap::Up => {
                warn!("pts wrapped up, clamping to maximum");
                u64::MAX
            }
            Wrap::None => pts,
        }
    }
}
