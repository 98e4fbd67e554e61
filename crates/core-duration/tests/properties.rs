//! Property tests for wrap-around arithmetic and scan determinism.

use core_duration::{LabelTemplate, LineWindow, MINUTES_PER_DAY, elapsed, format, scan_window};
use proptest::prelude::*;

fn clock(minutes: u32) -> String {
    format!("{:02}{:02}", minutes / 60, minutes % 60)
}

proptest! {
    #[test]
    fn elapsed_within_day(start in 0u32..MINUTES_PER_DAY, end in 0u32..MINUTES_PER_DAY) {
        let d = elapsed(start, end);
        prop_assert!(d <= MINUTES_PER_DAY);
        prop_assert_eq!(d == MINUTES_PER_DAY, start == end);
    }

    #[test]
    fn elapsed_lands_on_end(start in 0u32..MINUTES_PER_DAY, end in 0u32..MINUTES_PER_DAY) {
        prop_assume!(start != end);
        prop_assert_eq!((elapsed(start, end) + start) % MINUTES_PER_DAY, end);
    }

    #[test]
    fn format_splits_hours_and_minutes(total in 0u32..100_000) {
        prop_assert_eq!(format(total), format!("[{}h {}m]", total / 60, total % 60));
    }

    #[test]
    fn scan_is_idempotent(ranges in proptest::collection::vec((0u32..MINUTES_PER_DAY, 0u32..MINUTES_PER_DAY), 0..12), boundary_every in 1usize..5) {
        let mut lines = Vec::new();
        for (i, (s, e)) in ranges.iter().enumerate() {
            lines.push(format!("{}-{}", clock(*s), clock(*e)));
            if i % boundary_every == 0 {
                lines.push(String::new());
                lines.push("1.1".to_string());
            }
        }
        let template = LabelTemplate::default();
        let window = LineWindow::whole(lines.len());
        let first = scan_window(&lines[..], window, &template);
        let second = scan_window(&lines[..], window, &template);
        prop_assert_eq!(&first, &second);
        let planned: u32 = first.labels.iter().map(|l| l.total_minutes).sum();
        prop_assert_eq!(planned, first.summary.window_minutes);
    }
}
