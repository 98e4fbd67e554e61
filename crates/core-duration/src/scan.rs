//! Window scan: accumulate section totals over a line window and plan where
//! each label belongs.
//!
//! Planning is pure; deciding whether an anchor is occupied and requesting
//! room for it is the coordinator's job (`core-annotate::placement`).
//!
//! Anchor contract:
//! * a section closed by a boundary line plans `raw_anchor = last_range + 2`
//!   with `at_end = false`;
//! * the still-open section at the end of the window plans `last_range + 1`
//!   when that range line is the last line of the document (`at_end = true`),
//!   otherwise `last_range + 2`.

use crate::classify::{LineClass, classify};
use crate::label::LabelTemplate;
use std::borrow::Cow;

/// Read access to document lines (without line terminators).
pub trait LineSource {
    fn line_count(&self) -> usize;
    fn line(&self, idx: usize) -> Option<Cow<'_, str>>;
}

impl<S: AsRef<str>> LineSource for [S] {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line(&self, idx: usize) -> Option<Cow<'_, str>> {
        self.get(idx).map(|s| Cow::Borrowed(s.as_ref()))
    }
}

/// Inclusive line window `[first, last]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineWindow {
    pub first: usize,
    pub last: usize,
}

impl LineWindow {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }

    /// Window covering every line of a `line_count` long document.
    pub fn whole(line_count: usize) -> Self {
        Self::new(0, line_count.saturating_sub(1))
    }
}

/// Running section total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accumulator {
    total_minutes: u32,
    last_range_line: usize,
}

impl Accumulator {
    pub fn new(first_line: usize) -> Self {
        Self {
            total_minutes: 0,
            last_range_line: first_line,
        }
    }

    pub fn add(&mut self, line: usize, minutes: u32) {
        self.total_minutes = self.total_minutes.saturating_add(minutes);
        self.last_range_line = line;
    }

    pub fn total(&self) -> u32 {
        self.total_minutes
    }

    pub fn last_range_line(&self) -> usize {
        self.last_range_line
    }

    /// Return the current total and reset it to zero. `last_range_line` is
    /// kept: it only moves forward when another range line is seen.
    pub fn take(&mut self) -> u32 {
        std::mem::take(&mut self.total_minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLabel {
    pub text: String,
    pub total_minutes: u32,
    pub raw_anchor: usize,
    pub at_end: bool,
}

/// Per-scan counters, logged by the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub lines_scanned: usize,
    pub range_lines: usize,
    pub comment_lines: usize,
    pub boundaries: usize,
    pub unparseable_lines: usize,
    pub window_minutes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub labels: Vec<PlannedLabel>,
    pub summary: ScanSummary,
}

/// Scan `window` of `source` and plan one label per closed section plus at
/// most one trailing label for the open section.
///
/// The window end is clamped to the last document line; an empty document or a
/// window starting past the end yields an empty report. Sections with a zero
/// total never produce a label.
pub fn scan_window<L: LineSource + ?Sized>(
    source: &L,
    window: LineWindow,
    template: &LabelTemplate,
) -> ScanReport {
    let mut report = ScanReport::default();
    let line_count = source.line_count();
    if line_count == 0 || window.first >= line_count {
        return report;
    }
    let last = window.last.min(line_count - 1);
    let mut acc = Accumulator::new(window.first);

    for idx in window.first..=last {
        let Some(text) = source.line(idx) else {
            break;
        };
        report.summary.lines_scanned += 1;
        match classify(&text) {
            LineClass::Comment => report.summary.comment_lines += 1,
            LineClass::Range(range) => {
                let minutes = range.minutes();
                report.summary.range_lines += 1;
                report.summary.window_minutes =
                    report.summary.window_minutes.saturating_add(minutes);
                acc.add(idx, minutes);
            }
            LineClass::Boundary => {
                report.summary.boundaries += 1;
                let total = acc.take();
                if total > 0 {
                    report.labels.push(PlannedLabel {
                        text: template.render(total),
                        total_minutes: total,
                        raw_anchor: acc.last_range_line() + 2,
                        at_end: false,
                    });
                }
            }
            LineClass::Unparseable => report.summary.unparseable_lines += 1,
        }
    }

    let total = acc.take();
    if total > 0 {
        let last_range = acc.last_range_line();
        let at_end = line_count <= last_range + 1;
        report.labels.push(PlannedLabel {
            text: template.render(total),
            total_minutes: total,
            raw_anchor: if at_end {
                last_range + 1
            } else {
                last_range + 2
            },
            at_end,
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan(lines: &[&str]) -> ScanReport {
        scan_window(
            lines,
            LineWindow::whole(lines.len()),
            &LabelTemplate::default(),
        )
    }

    #[test]
    fn closed_section_plans_two_below_last_range() {
        let report = scan(&["0900-1000", "1000-1130", "14.3", ""]);
        assert_eq!(
            report.labels,
            vec![PlannedLabel {
                text: "[2h 30m]".into(),
                total_minutes: 150,
                raw_anchor: 3,
                at_end: false,
            }]
        );
        assert_eq!(report.summary.boundaries, 1);
    }

    #[test]
    fn trailing_section_at_document_end() {
        let report = scan(&["#note", "0900-1700"]);
        assert_eq!(
            report.labels,
            vec![PlannedLabel {
                text: "[8h 0m]".into(),
                total_minutes: 480,
                raw_anchor: 2,
                at_end: true,
            }]
        );
    }

    #[test]
    fn trailing_section_not_at_document_end() {
        let report = scan(&["0900-1000", ""]);
        assert_eq!(report.labels.len(), 1);
        assert_eq!(report.labels[0].raw_anchor, 2);
        assert!(!report.labels[0].at_end);
    }

    #[test]
    fn comment_and_boundary_only_yields_nothing() {
        let report = scan(&["# plan", "14.3"]);
        assert!(report.labels.is_empty());
        assert_eq!(report.summary.window_minutes, 0);
    }

    #[test]
    fn malformed_token_skipped_and_scan_continues() {
        let report = scan(&["09xx-1000", "1000-1100", "15.3"]);
        assert_eq!(report.labels.len(), 1);
        assert_eq!(report.labels[0].text, "[1h 0m]");
        assert_eq!(report.summary.unparseable_lines, 1);
    }

    #[test]
    fn each_boundary_closes_its_own_section() {
        let lines = [
            "14.3",
            "0800-0900",
            "",
            "15.3",
            "0900-0930",
            "1000-1015",
            "",
            "16.3",
        ];
        let report = scan(&lines);
        let texts: Vec<_> = report.labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["[1h 0m]", "[0h 45m]"]);
        assert_eq!(report.labels[0].raw_anchor, 3);
        assert_eq!(report.labels[1].raw_anchor, 7);
    }

    #[test]
    fn until_midnight_range_closes_with_its_section() {
        let report = scan(&["2200-2400", "", "1.1"]);
        assert_eq!(report.labels.len(), 1);
        assert_eq!(report.labels[0].text, "[2h 0m]");
        assert_eq!(report.labels[0].raw_anchor, 2);
    }

    #[test]
    fn window_end_clamped_to_document() {
        let lines = ["0900-1000", "x"];
        let report = scan_window(
            &lines[..],
            LineWindow::new(0, 40),
            &LabelTemplate::default(),
        );
        assert_eq!(report.summary.lines_scanned, 2);
        assert_eq!(report.labels.len(), 1);
    }

    #[test]
    fn window_past_end_is_empty() {
        let lines = ["0900-1000"];
        let report = scan_window(&lines[..], LineWindow::new(5, 9), &LabelTemplate::default());
        assert_eq!(report, ScanReport::default());
    }

    #[test]
    fn partial_window_only_counts_visible_lines() {
        let lines = ["0800-0900", "0900-1000", "1000-1100", "17.3"];
        let report = scan_window(&lines[..], LineWindow::new(1, 3), &LabelTemplate::default());
        assert_eq!(report.labels[0].text, "[2h 0m]");
    }

    #[test]
    fn accumulator_take_keeps_last_line() {
        let mut acc = Accumulator::new(4);
        acc.add(6, 30);
        assert_eq!(acc.take(), 30);
        assert_eq!(acc.total(), 0);
        assert_eq!(acc.last_range_line(), 6);
    }
}
