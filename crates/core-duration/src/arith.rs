//! Wrap-around clock arithmetic.

/// Minutes in one day; every clock value lives in `[0, MINUTES_PER_DAY)`.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Elapsed minutes from `start` to `end` on a 24h clock.
///
/// * `start > end`: the range crossed midnight, result is
///   `(MINUTES_PER_DAY - start) + end`.
/// * `start == end`: a full day (`MINUTES_PER_DAY`). This is a deliberate
///   special case for all-day entries such as `0000-0000`, not a zero-length
///   range.
/// * otherwise `end - start`.
///
/// [`crate::parse_range`] does not range check its tokens, so `start` may
/// exceed `MINUTES_PER_DAY` (`2400`, `0975`); the subtraction saturates so such
/// input can never underflow.
pub fn elapsed(start: u32, end: u32) -> u32 {
    if start > end {
        MINUTES_PER_DAY.saturating_sub(start) + end
    } else if start == end {
        MINUTES_PER_DAY
    } else {
        end - start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_range() {
        assert_eq!(elapsed(9 * 60, 10 * 60 + 30), 90);
    }

    #[test]
    fn crosses_midnight() {
        // 2200-0130
        assert_eq!(elapsed(22 * 60, 90), 210);
    }

    #[test]
    fn equal_endpoints_are_a_full_day() {
        assert_eq!(elapsed(0, 0), MINUTES_PER_DAY);
        assert_eq!(elapsed(615, 615), MINUTES_PER_DAY);
    }
}
