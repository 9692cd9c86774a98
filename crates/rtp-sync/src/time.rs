//! Clock-rate and time conversions
//!
//! RTP timestamps count ticks of a codec clock; presentation timestamps are
//! nanosecond counts. Conversions between the two must be exact rational
//! arithmetic so that repeated scaling never accumulates drift.

/// Nanoseconds per second
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Convert a tick count at the given clock rate to nanoseconds.
///
/// Computes `ticks * 1e9 / clock_rate` with full-width intermediate
/// arithmetic, saturating at `u64::MAX` when the result is not
/// representable. `clock_rate` must be > 0; callers validate it at
/// configuration time.
pub fn ticks_to_nanos(ticks: u64, clock_rate: i32) -> u64 {
    debug_assert!(clock_rate > 0);

    let nanos = ticks as u128 * NANOS_PER_SEC as u128 / clock_rate as u128;
    u64::try_from(nanos).unwrap_or(u64::MAX)
}

/// Typical clock rates for common codecs
pub mod clock_rates {
    /// G.711, G.726, G.729 (8kHz)
    pub const AUDIO_8KHZ: i32 = 8000;

    /// G.722 (16kHz)
    pub const AUDIO_16KHZ: i32 = 16000;

    /// Opus, AAC (48kHz)
    pub const AUDIO_48KHZ: i32 = 48000;

    /// Typical video clock rate (90kHz)
    pub const VIDEO_90KHZ: i32 = 90000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_to_nanos_exact() {
        // One second at each standard rate
        assert_eq!(ticks_to_nanos(8_000, clock_rates::AUDIO_8KHZ), NANOS_PER_SEC);
        assert_eq!(ticks_to_nanos(48_000, clock_rates::AUDIO_48KHZ), NANOS_PER_SEC);
        assert_eq!(ticks_to_nanos(90_000, clock_rates::VIDEO_90KHZ), NANOS_PER_SEC);

        // 125ms = 1000 samples at 8kHz
        assert_eq!(ticks_to_nanos(1_000, 8_000), 125_000_000);

        // Sub-tick rounding truncates: 1 tick at 90kHz is 11111.11... ns
        assert_eq!(ticks_to_nanos(1, 90_000), 11_111);
    }

    #[test]
    fn test_ticks_to_nanos_no_intermediate_overflow() {
        // u64::MAX ticks would overflow a 64-bit multiply by 1e9; the
        // result saturates instead of wrapping.
        assert_eq!(ticks_to_nanos(u64::MAX, 8_000), u64::MAX);

        // A tick count whose conversion still fits at 8kHz
        let ticks = u64::MAX / NANOS_PER_SEC * 8_000;
        assert!(ticks_to_nanos(ticks, 8_000) < u64::MAX);
    }
}
