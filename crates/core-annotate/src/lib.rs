//! View coordinator: keeps duration labels in sync with what a view shows.
//!
//! One [`Coordinator`] serves every view of a host editor. Each view gets a
//! session (created on its first event, dropped on close) holding two
//! deadline timers and the currently applied annotation set.
//!
//! Session lifecycle:
//!
//! ```text
//! Idle --change/scroll--> Debouncing --expiry--> [scan + place + commit] --> Idle
//!                              ^  |                         |
//!                  re-arm on   +--+                         | newline inserted
//!                  each event                               v
//!                                                       Settling --expiry--> [scan + place + commit]
//! ```
//!
//! Invariants:
//! * at most one recompute deadline and one settle deadline per view; arming
//!   replaces the previous deadline;
//! * the applied annotation set always comes from exactly one completed cycle
//!   (new labels are attached in full before the old set is disposed);
//! * a cycle that needs room for a label inserts newlines instead of
//!   rendering, then waits in `Settling`; change notifications arriving in that
//!   window are treated as echoes of the insertion and only extend it;
//! * at most `max_insert_cycles` consecutive cycles may insert; after that the
//!   labels render where they are.

mod annotation;
mod coordinator;
mod host;
mod placement;
mod timer;

pub use annotation::{Annotation, AnnotationSet};
pub use coordinator::{Coordinator, CoordinatorSettings, CycleFlags, CycleOutcome, SessionPhase};
pub use host::{EditorHost, HostError, HostLines, LabelHandle, LabelSpec, LabelStyle};
pub use placement::{Placement, place};
pub use timer::DeadlineTimer;
