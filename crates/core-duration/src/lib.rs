//! Duration engine: pure schedule-line arithmetic.
//!
//! Everything in this crate is a function of its inputs. Line text goes in,
//! classifications, minute totals and planned labels come out; no timers, no
//! host access and no retained state between calls. The view coordinator
//! (`core-annotate`) re-runs [`scan_window`] over the whole visible window on
//! every debounce expiry; there is no incremental diff state.
//!
//! Document line grammar (informal):
//!
//! ```text
//! comment_line   ::= "#" ...
//! range_line     ::= HHMM "-" HHMM      ; e.g. "0900-1130"
//! boundary_line  ::= <non-range text containing "."> ; e.g. "14.3"
//! blank_line     ::= ""
//! ```

mod arith;
mod classify;
mod label;
mod scan;

pub use arith::{MINUTES_PER_DAY, elapsed};
pub use classify::{COMMENT_PREFIX, LineClass, TimeRange, classify, parse_range};
pub use label::{DEFAULT_TEMPLATE, LabelTemplate, TemplateError, format};
pub use scan::{
    Accumulator, LineSource, LineWindow, PlannedLabel, ScanReport, ScanSummary, scan_window,
};
