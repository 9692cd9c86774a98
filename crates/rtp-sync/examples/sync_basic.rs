//! Basic synchronizer usage
//!
//! Simulates one video source: a few packets arrive before any RTCP Sender
//! Report (interpolated timestamps), then a report anchors the timeline and
//! later packets follow the sender's wall clock.

use rtp_sync::{CsvStatsWriter, NtpTimestamp, RtpSynchronizer, StatsSink};
use std::sync::Arc;
use tracing::info;

const NANOS_PER_SEC: u64 = 1_000_000_000;
const VIDEO_PT: u8 = 96;
const VIDEO_CLOCK_RATE: i32 = 90_000;
const SSRC: u32 = 0x1234_5678;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    // CSV recording is optional; set RTP_SYNC_STATS_PATH to enable it
    let stats = CsvStatsWriter::from_env("video").map(|w| Arc::new(w) as Arc<dyn StatsSink>);

    let sync = RtpSynchronizer::new(true, stats);
    sync.configure(VIDEO_PT, VIDEO_CLOCK_RATE)?;

    // Packets arriving before the first Sender Report: interpolated from
    // the first one's original pts.
    for i in 0..3u32 {
        let rtp_ts = 1_000 + i * 3_000; // one packet per 33ms frame
        let pts = sync.process_packet(SSRC, VIDEO_PT, rtp_ts, i as u64 * 33_333_333)?;
        info!(rtp_ts, pts, "interpolated");
    }

    // The first Sender Report correlates the RTP clock with the sender's
    // wall clock; its local arrival time anchors the timeline.
    let arrival = 10 * NANOS_PER_SEC;
    sync.process_sender_report(
        10_000,
        NtpTimestamp {
            seconds: 3_900_000_000,
            fraction: 0,
        },
        arrival,
    );

    // From here on, timestamps are anchored.
    for i in 0..3u32 {
        let rtp_ts = 10_000 + i * 3_000;
        let pts = sync.process_packet(SSRC, VIDEO_PT, rtp_ts, 0)?;
        info!(rtp_ts, pts, "anchored");
    }

    Ok(())
}
