//! Extended RTP timestamps
//!
//! RTP timestamps are 32 bits and wrap roughly every 13 hours at 90kHz (and
//! much faster at audio rates). [`ExtendedTimestamp`] unwraps a stream of
//! raw samples into an unbounded 64-bit count so later arithmetic never has
//! to reason about the wrap boundary.

use tracing::warn;

const WRAP_SPAN: u64 = 1 << 32;
const HALF_SPAN: u64 = 1 << 31;

/// Running unwrap state for one 32-bit wrapping clock.
///
/// Both the RTP data stream and the RTCP Sender Reports of a source sample
/// the same clock, so one tracker instance is shared between them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtendedTimestamp {
    ext: Option<u64>,
}

impl ExtendedTimestamp {
    /// Create a tracker with no sample seen yet
    pub fn new() -> Self {
        Self { ext: None }
    }

    /// Last extended value produced, if any sample has been seen
    pub fn last(&self) -> Option<u64> {
        self.ext
    }

    /// Fold the next raw sample into the extended timeline.
    ///
    /// The first sample becomes the extended value as-is. Each subsequent
    /// sample keeps the wrap count of the previous extended value when the
    /// raw value is within half the 32-bit range of it, otherwise the wrap
    /// count moves by one in whichever direction yields the value nearest
    /// the previous one; an exact half-range tie advances forward.
    pub fn next(&mut self, raw: u32) -> u64 {
        let result = match self.ext {
            None => raw as u64,
            Some(prev) => {
                // Candidate with the same wrap count as the previous value
                let mut result = (prev & !(WRAP_SPAN - 1)) + raw as u64;

                if result < prev {
                    if prev - result >= HALF_SPAN {
                        // Raw value far below the previous one: the clock
                        // wrapped forward.
                        result += WRAP_SPAN;
                    }
                } else if result - prev > HALF_SPAN {
                    if result >= WRAP_SPAN {
                        // Far above: a backward jump across the boundary.
                        result -= WRAP_SPAN;
                    } else {
                        warn!(
                            raw,
                            prev_ext = prev,
                            "cannot unwrap backward jump below zero, keeping forward value"
                        );
                    }
                }

                result
            }
        };

        self.ext = Some(result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_is_taken_verbatim() {
        let mut ts = ExtendedTimestamp::new();
        assert_eq!(ts.last(), None);
        assert_eq!(ts.next(0x8000_1234), 0x8000_1234);
        assert_eq!(ts.last(), Some(0x8000_1234));
    }

    #[test]
    fn test_monotonic_without_wrap() {
        let mut ts = ExtendedTimestamp::new();
        for raw in [0u32, 160, 320, 10_000, 0x7000_0000] {
            assert_eq!(ts.next(raw), raw as u64);
        }
    }

    #[test]
    fn test_forward_wraparound() {
        let mut ts = ExtendedTimestamp::new();
        assert_eq!(ts.next(0xFFFF_FFF0), 0xFFFF_FFF0);
        // 32 ticks later on the wrapped clock
        assert_eq!(ts.next(0x0000_0010), 0x1_0000_0010);
        // and the timeline keeps going from there
        assert_eq!(ts.next(0x0000_0020), 0x1_0000_0020);
    }

    #[test]
    fn test_double_wraparound() {
        let mut ts = ExtendedTimestamp::new();
        ts.next(0xFFFF_FFFF);
        assert_eq!(ts.next(100), 0x1_0000_0000 + 100);
        ts.next(0xFFFF_FFFF);
        assert_eq!(ts.next(50), 0x2_0000_0000 + 50);
    }

    #[test]
    fn test_small_backward_jump_keeps_wrap_count() {
        let mut ts = ExtendedTimestamp::new();
        ts.next(1_000);
        assert_eq!(ts.next(900), 900);
    }

    #[test]
    fn test_backward_jump_across_boundary() {
        let mut ts = ExtendedTimestamp::new();
        ts.next(0xFFFF_FFF0);
        ts.next(0x10); // wraps forward to 0x1_0000_0010
        // A late packet from before the wrap comes back in
        assert_eq!(ts.next(0xFFFF_FFE0), 0xFFFF_FFE0);
    }

    #[test]
    fn test_half_range_tie_advances_forward() {
        let mut ts = ExtendedTimestamp::new();
        ts.next(0x8000_0000);
        // Exactly 2^31 away in both directions; the forward candidate wins.
        assert_eq!(ts.next(0), 0x1_0000_0000);
    }

    #[test]
    fn test_unresolvable_backward_jump_stays_forward() {
        let mut ts = ExtendedTimestamp::new();
        ts.next(0x10);
        // Far above with wrap count zero: nothing to unwrap into
        assert_eq!(ts.next(0xFFFF_FFF0), 0xFFFF_FFF0);
    }
}
