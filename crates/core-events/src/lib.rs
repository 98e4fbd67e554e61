//! Core event types and async event sources for timesum.
//!
//! The runtime owns one bounded mpsc channel of [`Event`]s. Host notifications
//! (content edits, scrolls, view lifecycle) and background producers (file
//! watchers) all funnel through it, so the coordinator only ever sees a single
//! ordered stream on one task. Timers are not events: the loop sleeps until the
//! coordinator's next deadline.

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinHandle;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded channel sized by `EVENT_CHANNEL_CAP`. Producers await `send`, which parks them while the
// loop is busy instead of dropping notifications. Losing a change notification would leave stale
// labels on screen until the next edit, so lossless delivery is preferred over a drop strategy.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 1024;

/// Stable identifier for an editor view. Sessions in the coordinator are
/// keyed by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub usize);

/// Visible line range of a view, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRange {
    pub first: usize,
    pub last: usize,
}

impl VisibleRange {
    pub fn new(first: usize, last: usize) -> Self {
        Self {
            first,
            last: last.max(first),
        }
    }

    /// Range of `height` rows starting at `first`. A zero height still covers
    /// the first line.
    pub fn from_viewport(first: usize, height: usize) -> Self {
        Self::new(first, first + height.saturating_sub(1))
    }

    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn contains(&self, line: usize) -> bool {
        (self.first..=self.last).contains(&line)
    }
}

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Document text of the view changed (user edit, reload, or our own insertion).
    ContentChanged { view: ViewId },
    /// The view scrolled or resized.
    VisibleRangeChanged { view: ViewId, range: VisibleRange },
    /// The view was closed; its session must be discarded.
    ViewClosed { view: ViewId },
    /// The file backing the view changed on disk.
    FileChanged { view: ViewId },
    Shutdown,
}

impl Event {
    /// View the event targets, if any.
    pub fn view(&self) -> Option<ViewId> {
        match self {
            Event::ContentChanged { view }
            | Event::VisibleRangeChanged { view, .. }
            | Event::ViewClosed { view }
            | Event::FileChanged { view } => Some(*view),
            Event::Shutdown => None,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------
// Each source owns one background task that pushes `Event`s into the shared channel. On send failure
// (consumer dropped) the task must terminate promptly.

/// Trait implemented by any async event producer.
pub trait AsyncEventSource: Send + 'static {
    /// Human-readable stable identifier (used for logging / diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task. Implementors stop when
    /// `tx.send(..).await` returns Err and must await timers or IO rather than
    /// busy loop.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources spawned together at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Spawn all registered sources, returning their JoinHandles. Each source
    /// receives its own `Sender` clone; during shutdown the caller drops its
    /// last sender before awaiting the handles so sources observe the closed
    /// channel and exit.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Watches the file behind `view` with `notify` and emits
/// `Event::FileChanged` whenever it is created, written or removed.
///
/// The parent directory is watched rather than the file itself so saves that
/// rename a temporary file over the original are still seen.
pub struct FileWatchSource {
    path: PathBuf,
    view: ViewId,
}

impl FileWatchSource {
    pub fn new(path: impl Into<PathBuf>, view: ViewId) -> Self {
        Self {
            path: path.into(),
            view,
        }
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// True when `event` changes the contents of a file called `name`.
fn touches(event: &notify::Event, name: &OsStr) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|p| p.file_name() == Some(name))
}

impl AsyncEventSource for FileWatchSource {
    fn name(&self) -> &'static str {
        "file_watch"
    }
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let FileWatchSource { path, view } = *self;
        tokio::spawn(async move {
            let Some(name) = path.file_name().map(OsStr::to_os_string) else {
                tracing::warn!(target: "runtime.events", view = view.0, "file_watch_no_file_name");
                return;
            };
            let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
            let watcher = RecommendedWatcher::new(
                move |res: notify::Result<notify::Event>| {
                    let _ = raw_tx.send(res);
                },
                Config::default(),
            );
            let mut watcher = match watcher {
                Ok(watcher) => watcher,
                Err(err) => {
                    tracing::warn!(target: "runtime.events", view = view.0, %err, "file_watch_unavailable");
                    return;
                }
            };
            if let Err(err) = watcher.watch(&watch_dir(&path), RecursiveMode::NonRecursive) {
                tracing::warn!(target: "runtime.events", view = view.0, %err, "file_watch_failed");
                return;
            }
            loop {
                let res = tokio::select! {
                    _ = tx.closed() => break,
                    res = raw_rx.recv() => res,
                };
                match res {
                    Some(Ok(event)) if touches(&event, &name) => {
                        tracing::debug!(target: "runtime.events", view = view.0, kind = ?event.kind, "file_changed");
                        if tx.send(Event::FileChanged { view }).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::warn!(target: "runtime.events", view = view.0, %err, "file_watch_error")
                    }
                    None => break,
                }
            }
            drop(watcher);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    #[test]
    fn visible_range_from_viewport() {
        let r = VisibleRange::from_viewport(10, 5);
        assert_eq!(r, VisibleRange::new(10, 14));
        assert_eq!(r.len(), 5);
        assert!(r.contains(14));
        assert!(!r.contains(15));
        assert_eq!(VisibleRange::from_viewport(3, 0), VisibleRange::new(3, 3));
    }

    #[test]
    fn inverted_range_collapses() {
        assert_eq!(VisibleRange::new(8, 2), VisibleRange::new(8, 8));
    }

    #[test]
    fn event_view_accessor() {
        let changed = Event::ContentChanged { view: ViewId(2) };
        assert_eq!(changed.view(), Some(ViewId(2)));
        assert_eq!(Event::Shutdown.view(), None);
    }

    #[test]
    fn relative_path_watches_working_directory() {
        assert_eq!(watch_dir(Path::new("week.txt")), PathBuf::from("."));
        let nested = watch_dir(Path::new("plans/week.txt"));
        assert_eq!(nested, PathBuf::from("plans"));
    }

    #[test]
    fn only_content_changes_of_the_watched_name_count() {
        let name = OsStr::new("week.txt");
        let write = notify::Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/plans/week.txt"));
        assert!(touches(&write, name));

        let created = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/plans/week.txt"));
        assert!(touches(&created, name));

        let sibling = notify::Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/plans/other.txt"));
        assert!(!touches(&sibling, name));

        let read = notify::Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/plans/week.txt"));
        assert!(!touches(&read, name));
    }
}
