//! Per-view sessions, debounce scheduling and the scan/place/commit cycle.

use crate::annotation::{Annotation, AnnotationSet};
use crate::host::{EditorHost, HostLines, LabelSpec, LabelStyle};
use crate::placement::{Placement, place};
use crate::timer::DeadlineTimer;
use core_config::{Config, Timing};
use core_duration::{LabelTemplate, LineWindow, ScanSummary, scan_window};
use core_events::{ViewId, VisibleRange};
use core_text::Position;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub timing: Timing,
    pub template: LabelTemplate,
    pub style: LabelStyle,
    pub max_insert_cycles: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            template: LabelTemplate::default(),
            style: LabelStyle::default(),
            max_insert_cycles: 3,
        }
    }
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timing: config.effective_timing(),
            template: config.label_template(),
            style: LabelStyle::from_config(&config.file.style),
            max_insert_cycles: config.max_insert_cycles(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    /// Recompute deadline pending.
    Debouncing,
    /// Waiting for a self-inserted newline to settle.
    Settling,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CycleFlags: u8 {
        /// A new annotation set was committed.
        const RENDERED = 1;
        /// Newlines were requested; the commit was skipped.
        const INSERTED = 2;
        /// Room was needed but the insert streak is exhausted; rendered in place.
        const CAPPED = 4;
        /// Host could not serve the cycle; the previous set is still applied.
        const ABORTED = 8;
    }
}

/// Result of one scan/place/commit cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub view: ViewId,
    pub flags: CycleFlags,
    /// Labels applied after the cycle.
    pub labels: usize,
    pub insertions: usize,
    pub generation: u64,
    pub summary: ScanSummary,
}

impl CycleOutcome {
    fn new(view: ViewId, generation: u64) -> Self {
        Self {
            view,
            flags: CycleFlags::empty(),
            labels: 0,
            insertions: 0,
            generation,
            summary: ScanSummary::default(),
        }
    }

    pub fn rendered(&self) -> bool {
        self.flags.contains(CycleFlags::RENDERED)
    }
}

#[derive(Debug)]
struct ViewSession {
    recompute: DeadlineTimer,
    settle: DeadlineTimer,
    applied: AnnotationSet,
    /// Consecutive cycles that ended in an insertion.
    insert_streak: u32,
    absorbed_echoes: u64,
}

impl ViewSession {
    fn new(timing: Timing) -> Self {
        Self {
            recompute: DeadlineTimer::new(timing.recompute),
            settle: DeadlineTimer::new(timing.settle),
            applied: AnnotationSet::default(),
            insert_streak: 0,
            absorbed_echoes: 0,
        }
    }

    fn phase(&self) -> SessionPhase {
        if self.settle.is_armed() {
            SessionPhase::Settling
        } else if self.recompute.is_armed() {
            SessionPhase::Debouncing
        } else {
            SessionPhase::Idle
        }
    }
}

/// Drives duration labels for every open view of one host.
#[derive(Debug)]
pub struct Coordinator {
    settings: CoordinatorSettings,
    sessions: HashMap<ViewId, ViewSession>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(CoordinatorSettings::default())
    }
}

impl Coordinator {
    pub fn new(settings: CoordinatorSettings) -> Self {
        Self {
            settings,
            sessions: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Document text of `view` changed.
    pub fn on_content_changed(&mut self, view: ViewId, now: Instant) -> SessionPhase {
        self.notify(view, now, "content")
    }

    /// `view` scrolled or resized. The range itself is re-read from the host
    /// when the cycle runs.
    pub fn on_visible_range_changed(
        &mut self,
        view: ViewId,
        range: VisibleRange,
        now: Instant,
    ) -> SessionPhase {
        trace!(target: "annotate.timer", view = view.0, first = range.first, last = range.last, "visible_range_changed");
        self.notify(view, now, "scroll")
    }

    fn notify(&mut self, view: ViewId, now: Instant, cause: &'static str) -> SessionPhase {
        let timing = self.settings.timing;
        let session = self.sessions.entry(view).or_insert_with(|| {
            debug!(target: "annotate.timer", view = view.0, "session_created");
            ViewSession::new(timing)
        });
        if session.settle.is_armed() {
            // Echo of our own insertion (or input racing it): extend the settle window only.
            session.settle.arm(now);
            session.absorbed_echoes += 1;
            trace!(target: "annotate.timer", view = view.0, cause, absorbed = session.absorbed_echoes, "settle_extended");
            return SessionPhase::Settling;
        }
        session.insert_streak = 0;
        let rearmed = session.recompute.is_armed();
        session.recompute.arm(now);
        trace!(target: "annotate.timer", view = view.0, cause, rearmed, "recompute_armed");
        SessionPhase::Debouncing
    }

    /// Drop the session of a closed view and dispose its labels. Returns
    /// false if the view had no session.
    pub fn on_view_closed<H: EditorHost + ?Sized>(&mut self, host: &mut H, view: ViewId) -> bool {
        let Some(mut session) = self.sessions.remove(&view) else {
            return false;
        };
        let labels = session.applied.take_all();
        debug!(target: "annotate.timer", view = view.0, labels = labels.len(), "session_closed");
        dispose_all(host, view, labels);
        true
    }

    /// Run every cycle whose timer is due at `now`, in view order.
    pub fn poll<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        now: Instant,
    ) -> Vec<CycleOutcome> {
        let mut due: Vec<(ViewId, &'static str)> = Vec::new();
        for (view, session) in self.sessions.iter_mut() {
            if session.settle.poll_expired(now) {
                due.push((*view, "settle"));
            } else if session.recompute.poll_expired(now) {
                due.push((*view, "recompute"));
            }
        }
        due.sort_unstable_by_key(|(view, _)| *view);
        due.into_iter()
            .map(|(view, trigger)| self.cycle(host, view, now, trigger))
            .collect()
    }

    /// Run a cycle for `view` immediately, cancelling its pending timers.
    /// A view the host does not know aborts without creating a session.
    pub fn run_now<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        view: ViewId,
        now: Instant,
    ) -> CycleOutcome {
        if host.visible_range(view).is_none() {
            warn!(target: "annotate.cycle", view = view.0, "run_now_unknown_view");
            let mut outcome = CycleOutcome::new(view, 0);
            outcome.flags |= CycleFlags::ABORTED;
            return outcome;
        }
        let timing = self.settings.timing;
        let session = self
            .sessions
            .entry(view)
            .or_insert_with(|| ViewSession::new(timing));
        session.recompute.cancel();
        session.settle.cancel();
        self.cycle(host, view, now, "manual")
    }

    /// Earliest pending deadline across all sessions.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.sessions
            .values()
            .flat_map(|s| [s.recompute.deadline(), s.settle.deadline()])
            .flatten()
            .min()
    }

    pub fn phase(&self, view: ViewId) -> Option<SessionPhase> {
        self.sessions.get(&view).map(ViewSession::phase)
    }

    pub fn applied(&self, view: ViewId) -> Option<&AnnotationSet> {
        self.sessions.get(&view).map(|s| &s.applied)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn cycle<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        view: ViewId,
        now: Instant,
        trigger: &'static str,
    ) -> CycleOutcome {
        let settings = &self.settings;
        let Some(session) = self.sessions.get_mut(&view) else {
            let mut outcome = CycleOutcome::new(view, 0);
            outcome.flags |= CycleFlags::ABORTED;
            return outcome;
        };
        let span = tracing::debug_span!(target: "annotate.cycle", "cycle", view = view.0, trigger);
        let _e = span.enter();
        run_cycle(settings, session, host, view, now)
    }
}

fn run_cycle<H: EditorHost + ?Sized>(
    settings: &CoordinatorSettings,
    session: &mut ViewSession,
    host: &mut H,
    view: ViewId,
    now: Instant,
) -> CycleOutcome {
    let mut outcome = CycleOutcome::new(view, session.applied.generation());
    let Some(range) = host.visible_range(view) else {
        warn!(target: "annotate.cycle", view = view.0, "visible_range_unavailable");
        outcome.flags |= CycleFlags::ABORTED;
        return outcome;
    };

    let placements: Vec<Placement> = {
        let lines = HostLines::new(&*host, view);
        let report = scan_window(
            &lines,
            LineWindow::new(range.first, range.last),
            &settings.template,
        );
        outcome.summary = report.summary;
        report.labels.iter().map(|p| place(&lines, p)).collect()
    };
    debug!(
        target: "annotate.scan",
        view = view.0,
        first = range.first,
        last = range.last,
        lines = outcome.summary.lines_scanned,
        ranges = outcome.summary.range_lines,
        unparseable = outcome.summary.unparseable_lines,
        minutes = outcome.summary.window_minutes,
        labels = placements.len(),
        "scan_complete"
    );

    let mut inserts: Vec<Position> = placements.iter().filter_map(|p| p.insert_at).collect();
    if !inserts.is_empty() {
        if session.insert_streak < settings.max_insert_cycles {
            // Bottom-up so earlier positions stay valid while inserting.
            inserts.sort_unstable_by(|a, b| b.cmp(a));
            inserts.dedup();
            for at in &inserts {
                match host.insert_text(view, *at, "\n") {
                    Ok(()) => outcome.insertions += 1,
                    Err(err) => {
                        warn!(target: "annotate.commit", view = view.0, line = at.line, %err, "insert_failed")
                    }
                }
            }
            session.insert_streak += 1;
            session.recompute.cancel();
            session.settle.arm(now);
            outcome.flags |= CycleFlags::INSERTED;
            outcome.labels = session.applied.len();
            debug!(
                target: "annotate.commit",
                view = view.0,
                insertions = outcome.insertions,
                streak = session.insert_streak,
                "commit_deferred"
            );
            return outcome;
        }
        warn!(target: "annotate.commit", view = view.0, streak = session.insert_streak, "insert_streak_capped");
        outcome.flags |= CycleFlags::CAPPED;
    }

    let last_line = host.line_count(view).unwrap_or(0).saturating_sub(1);
    let mut next = Vec::with_capacity(placements.len());
    for p in placements {
        let line = p.anchor_line.min(last_line);
        let spec = LabelSpec {
            text: p.text,
            style: settings.style.clone(),
        };
        match host.attach_label(view, line, &spec) {
            Ok(handle) => next.push(Annotation {
                anchor_line: line,
                text: spec.text,
                handle,
            }),
            Err(err) => {
                warn!(target: "annotate.commit", view = view.0, line, %err, "attach_failed");
                dispose_all(host, view, next);
                outcome.flags |= CycleFlags::ABORTED;
                outcome.labels = session.applied.len();
                return outcome;
            }
        }
    }
    let previous = session.applied.replace(next);
    let disposed = previous.len();
    dispose_all(host, view, previous);
    session.insert_streak = 0;
    outcome.flags |= CycleFlags::RENDERED;
    outcome.labels = session.applied.len();
    outcome.generation = session.applied.generation();
    debug!(
        target: "annotate.commit",
        view = view.0,
        labels = outcome.labels,
        disposed,
        generation = outcome.generation,
        "commit_applied"
    );
    outcome
}

fn dispose_all<H: EditorHost + ?Sized>(host: &mut H, view: ViewId, labels: Vec<Annotation>) {
    for label in labels {
        if let Err(err) = host.dispose_label(view, label.handle) {
            warn!(target: "annotate.commit", view = view.0, %err, "dispose_failed");
        }
    }
}
