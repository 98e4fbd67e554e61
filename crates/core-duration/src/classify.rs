//! Line classification.
//!
//! Order of tests matters and mirrors how schedule files are written:
//! 1. comment prefix (`#`), always skipped;
//! 2. a `-` makes the line a range candidate; if either clock token fails to
//!    parse the line is `Unparseable` (it is never reconsidered as a
//!    boundary);
//! 3. a `.` makes the line a section boundary (`14.3`, `1.12.`);
//! 4. anything else, blank lines included, is `Unparseable`.
//!
//! No whitespace is stripped for the shape tests. Individual clock tokens are
//! trimmed so `0900 - 1000` and CRLF documents still parse.

/// Marker that starts a comment line.
pub const COMMENT_PREFIX: char = '#';

/// Start/end clock values in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    pub start: u32,
    pub end: u32,
}

impl TimeRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Wrap-around duration of this range (see [`crate::elapsed`]).
    pub fn minutes(&self) -> u32 {
        crate::elapsed(self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// `HHMM-HHMM`.
    Range(TimeRange),
    /// Date-like section separator; closes the running section.
    Boundary,
    /// `#...`, ignored entirely.
    Comment,
    /// Blank or free-form text, including malformed ranges. Contributes nothing.
    Unparseable,
}

/// Classify a single line of document text.
pub fn classify(line: &str) -> LineClass {
    if line.starts_with(COMMENT_PREFIX) {
        return LineClass::Comment;
    }
    if line.contains('-') {
        return match parse_range(line) {
            Some(range) => LineClass::Range(range),
            None => LineClass::Unparseable,
        };
    }
    if line.contains('.') {
        return LineClass::Boundary;
    }
    LineClass::Unparseable
}

/// Parse the first two `-` separated clock tokens of `line`.
///
/// Returns `None` when the line has no `-` or a token fails integer parsing.
/// Token values are not range checked: `2400` is the end of the day and
/// counts as 1440 minutes.
pub fn parse_range(line: &str) -> Option<TimeRange> {
    let mut tokens = line.split('-');
    let start = parse_clock(tokens.next()?)?;
    let end = parse_clock(tokens.next()?)?;
    Some(TimeRange::new(start, end))
}

/// `HHMM` -> minutes since midnight: `token[0..2] * 60 + token[2..]`.
fn parse_clock(token: &str) -> Option<u32> {
    let token = token.trim();
    let hours: u32 = token.get(..2)?.parse().ok()?;
    let minutes: u32 = token.get(2..)?.parse().ok()?;
    hours.checked_mul(60)?.checked_add(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_wins_over_range_shape() {
        assert_eq!(classify("#0900-1000"), LineClass::Comment);
        assert_eq!(classify("# 14.3"), LineClass::Comment);
    }

    #[test]
    fn range_line_parses_minutes() {
        assert_eq!(
            classify("0900-1130"),
            LineClass::Range(TimeRange::new(540, 690))
        );
    }

    #[test]
    fn range_tokens_tolerate_padding_and_crlf() {
        assert_eq!(
            parse_range("0900 - 1000\r"),
            Some(TimeRange::new(540, 600))
        );
    }

    #[test]
    fn extra_tokens_are_ignored() {
        assert_eq!(
            parse_range("0900-1000-1100"),
            Some(TimeRange::new(540, 600))
        );
    }

    #[test]
    fn boundary_line() {
        assert_eq!(classify("14.3"), LineClass::Boundary);
        assert_eq!(classify("Mo 1.12."), LineClass::Boundary);
    }

    #[test]
    fn malformed_token_is_unparseable_not_boundary() {
        assert_eq!(classify("09xx-1000"), LineClass::Unparseable);
        assert_eq!(classify("09.00-10.00"), LineClass::Unparseable);
        assert_eq!(parse_range("0900-"), None);
    }

    #[test]
    fn until_midnight_counts_as_end_of_day() {
        let range = parse_range("2200-2400").unwrap();
        assert_eq!(range, TimeRange::new(1320, 1440));
        assert_eq!(range.minutes(), 120);
    }

    #[test]
    fn integer_tokens_are_taken_as_written() {
        // 0960 reads as 9h + 60m.
        assert_eq!(parse_range("0845-0960"), Some(TimeRange::new(525, 600)));
    }

    #[test]
    fn blank_and_prose_are_unparseable() {
        assert_eq!(classify(""), LineClass::Unparseable);
        assert_eq!(classify("standup notes"), LineClass::Unparseable);
    }

    #[test]
    fn multibyte_token_does_not_panic() {
        assert_eq!(parse_range("0é00-1000"), None);
    }
}
