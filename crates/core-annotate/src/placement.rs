//! Label anchoring.
//!
//! A planned label arrives with a raw anchor two lines below the last range
//! line (one line when that range line ends the document). Placement turns it
//! into a concrete line and decides whether the line is free:
//!
//! * not at document end (and raw anchor past line 1): anchor moves up one
//!   line onto the blank separator that conventionally follows a section;
//! * the inspected line is the anchor itself, or the line before it at
//!   document end; a non-empty inspected line means the slot is occupied;
//! * occupied slots request a newline (column 0 of the anchor, or the end of
//!   the last range line at document end). The label is not rendered in that
//!   cycle: the insertion shifts the text it would be attached to.

use core_duration::{LineSource, PlannedLabel};
use core_text::Position;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub text: String,
    pub anchor_line: usize,
    pub at_end: bool,
    /// Where a newline must be inserted before this label can render.
    pub insert_at: Option<Position>,
}

pub fn place<L: LineSource + ?Sized>(lines: &L, planned: &PlannedLabel) -> Placement {
    let mut anchor = planned.raw_anchor;
    if !planned.at_end && anchor > 1 {
        anchor -= 1;
    }
    let inspected = if planned.at_end {
        anchor.saturating_sub(1)
    } else {
        anchor
    };
    let inspected_text = lines.line(inspected);
    let insert_at = match inspected_text.as_deref() {
        Some(text) if !text.is_empty() => Some(if planned.at_end {
            Position::new(inspected, text.len())
        } else {
            Position::new(anchor, 0)
        }),
        _ => None,
    };
    Placement {
        text: planned.text.clone(),
        anchor_line: anchor,
        at_end: planned.at_end,
        insert_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_duration::{LabelTemplate, LineWindow, scan_window};
    use pretty_assertions::assert_eq;

    fn placements(lines: &[&str]) -> Vec<Placement> {
        let report = scan_window(
            lines,
            LineWindow::whole(lines.len()),
            &LabelTemplate::default(),
        );
        report.labels.iter().map(|p| place(lines, p)).collect()
    }

    #[test]
    fn blank_separator_takes_label() {
        let got = placements(&["0900-1000", "1000-1130", "", "14.3"]);
        assert_eq!(
            got,
            vec![Placement {
                text: "[2h 30m]".into(),
                anchor_line: 2,
                at_end: false,
                insert_at: None,
            }]
        );
    }

    #[test]
    fn boundary_directly_after_range_requests_room() {
        let got = placements(&["0900-1000", "1000-1130", "14.3", ""]);
        assert_eq!(got[0].anchor_line, 2);
        assert_eq!(got[0].insert_at, Some(Position::new(2, 0)));
    }

    #[test]
    fn document_end_inserts_after_last_range() {
        let got = placements(&["#note", "0900-1700"]);
        assert_eq!(
            got,
            vec![Placement {
                text: "[8h 0m]".into(),
                anchor_line: 2,
                at_end: true,
                insert_at: Some(Position::new(1, 9)),
            }]
        );
    }

    #[test]
    fn trailing_blank_line_is_free() {
        let got = placements(&["#note", "0900-1700", ""]);
        assert_eq!(got[0].anchor_line, 2);
        assert!(!got[0].at_end);
        assert_eq!(got[0].insert_at, None);
    }

    #[test]
    fn anchor_past_document_is_free() {
        let lines = ["0900-1000", "1000-1100"];
        let planned = PlannedLabel {
            text: "[1h 0m]".into(),
            total_minutes: 60,
            raw_anchor: 9,
            at_end: false,
        };
        let p = place(&lines[..], &planned);
        assert_eq!(p.anchor_line, 8);
        assert_eq!(p.insert_at, None);
    }
}
