use anyhow::{Context, Result};
use clap::Parser;
use core_annotate::{Coordinator, CoordinatorSettings, CycleFlags, CycleOutcome, SessionPhase};
use core_events::{EVENT_CHANNEL_CAP, Event, EventSourceRegistry, FileWatchSource, ViewId};
use core_model::EditorModel;
use core_text::Buffer;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod render;

/// Rows shown when the terminal size is unknown.
const FALLBACK_HEIGHT: usize = 40;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name = "timesum",
    version,
    about = "Inline duration summaries for plain-text schedules"
)]
struct Args {
    /// Schedule document to annotate (UTF-8 text).
    pub path: PathBuf,
    /// Optional configuration file path (overrides discovery of `timesum.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// First visible line (0-based).
    #[arg(long = "first", default_value_t = 0)]
    pub first: usize,
    /// Visible window height in lines. Defaults to the terminal height.
    #[arg(long = "height")]
    pub height: Option<usize>,
    /// Keep running and re-render whenever the file changes.
    #[arg(long = "watch")]
    pub watch: bool,
    /// Save blank lines inserted to make room for labels back to the file.
    #[arg(long = "write")]
    pub write: bool,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn run(&mut self, args: &Args) -> Result<Session> {
        self.configure_logging()?;
        Self::install_panic_hook();
        info!(target: "runtime", "startup");

        let config = core_config::load_from(args.config.clone())?;
        let settings = CoordinatorSettings::from_config(&config);
        let text = std::fs::read_to_string(&args.path)
            .with_context(|| format!("reading {}", args.path.display()))?;
        let height = args.height.unwrap_or_else(terminal_height);
        let session = Session::open(&args.path, &text, args.first, height, settings)?;

        info!(
            target: "runtime.startup",
            path = %args.path.display(),
            lines = text.lines().count(),
            first = args.first,
            height,
            config_override = args.config.is_some(),
            watch = args.watch,
            write = args.write,
            "bootstrap_complete"
        );
        Ok(session)
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("timesum.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "timesum.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so writer shuts down.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn terminal_height() -> usize {
    crossterm::terminal::size()
        .ok()
        .map(|(_, rows)| usize::from(rows.saturating_sub(1)).max(1))
        .unwrap_or(FALLBACK_HEIGHT)
}

/// One open document: the model acting as host plus the coordinator
/// driving its labels.
struct Session {
    model: EditorModel,
    coordinator: Coordinator,
    view: ViewId,
    path: PathBuf,
    /// Inserted newlines not yet saved to disk.
    unsaved_insertions: usize,
}

impl Session {
    fn open(
        path: &Path,
        text: &str,
        first: usize,
        height: usize,
        settings: CoordinatorSettings,
    ) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "[schedule]".to_string());
        let mut model = EditorModel::new();
        let view = model.open(Buffer::from_str(name, text)?, height.max(1));
        model.scroll_to(view, first);
        Ok(Self {
            model,
            coordinator: Coordinator::new(settings),
            view,
            path: path.to_path_buf(),
            unsaved_insertions: 0,
        })
    }

    /// Hand one runtime event to the coordinator.
    fn dispatch(&mut self, event: &Event, now: Instant) {
        match event {
            Event::ContentChanged { view } => {
                self.coordinator.on_content_changed(*view, now);
            }
            Event::VisibleRangeChanged { view, range } => {
                self.coordinator
                    .on_visible_range_changed(*view, *range, now);
            }
            Event::ViewClosed { view } => {
                self.coordinator.on_view_closed(&mut self.model, *view);
            }
            Event::FileChanged { view } => {
                if let Err(err) = self.reload(*view) {
                    warn!(target: "io", view = view.0, %err, "reload_failed");
                }
            }
            Event::Shutdown => {}
        }
    }

    /// Forward notifications the model queued (including echoes of our own
    /// insertions) to the coordinator.
    fn forward_model_events(&mut self, now: Instant) {
        for event in self.model.drain_events() {
            trace!(target: "runtime.events", ?event, "model_event");
            self.dispatch(&event, now);
        }
    }

    fn reload(&mut self, view: ViewId) -> Result<()> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let unchanged = self
            .model
            .buffer(view)
            .is_some_and(|b| b.contents() == text);
        if unchanged {
            trace!(target: "io", view = view.0, "reload_skipped_unchanged");
            return Ok(());
        }
        self.model.replace_contents(view, &text)?;
        self.unsaved_insertions = 0;
        debug!(target: "io", view = view.0, bytes = text.len(), "reloaded");
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        let Some(buffer) = self.model.buffer(self.view) else {
            return Ok(());
        };
        std::fs::write(&self.path, buffer.contents())
            .with_context(|| format!("writing {}", self.path.display()))?;
        info!(target: "io", insertions = self.unsaved_insertions, "saved");
        self.unsaved_insertions = 0;
        Ok(())
    }

    fn run_now(&mut self, now: Instant) -> CycleOutcome {
        // The open/scroll notifications are covered by the immediate cycle.
        self.model.drain_events();
        let outcome = self.coordinator.run_now(&mut self.model, self.view, now);
        self.forward_model_events(now);
        outcome
    }

    fn poll(&mut self, now: Instant) -> Vec<CycleOutcome> {
        self.forward_model_events(now);
        let outcomes = self.coordinator.poll(&mut self.model, now);
        self.forward_model_events(now);
        outcomes
    }

    fn idle(&self) -> bool {
        matches!(
            self.coordinator.phase(self.view),
            None | Some(SessionPhase::Idle)
        )
    }
}

#[derive(Debug)]
enum LoopControl {
    Continue,
    Break { reason: ShutdownReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownReason {
    Rendered,
    Aborted,
    ShutdownEvent,
    ChannelClosed,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::Rendered => "rendered",
            ShutdownReason::Aborted => "aborted",
            ShutdownReason::ShutdownEvent => "shutdown_event",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

#[derive(Debug, Clone, Copy)]
struct RuntimeOptions {
    watch: bool,
    write: bool,
    styled: bool,
}

struct Runtime<W: Write> {
    session: Session,
    options: RuntimeOptions,
    out: W,
    rx: mpsc::Receiver<Event>,
    tx: Option<mpsc::Sender<Event>>,
    source_handles: Vec<tokio::task::JoinHandle<()>>,
}

/// Sleep until `deadline`, or forever when nothing is pending.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending::<()>().await,
    }
}

impl<W: Write> Runtime<W> {
    fn new(
        session: Session,
        options: RuntimeOptions,
        out: W,
        tx: mpsc::Sender<Event>,
        rx: mpsc::Receiver<Event>,
        source_handles: Vec<tokio::task::JoinHandle<()>>,
    ) -> Self {
        Self {
            session,
            options,
            out,
            rx,
            tx: Some(tx),
            source_handles,
        }
    }

    async fn run(&mut self) -> Result<()> {
        let span = tracing::debug_span!(target: "runtime", "event_loop");
        let _enter_loop = span.enter();

        let initial = self.session.run_now(Instant::now());
        let mut shutdown_reason = match self.handle_outcomes(vec![initial])? {
            LoopControl::Break { reason } => Some(reason),
            LoopControl::Continue => None,
        };

        while shutdown_reason.is_none() {
            let deadline = self.session.coordinator.next_deadline();
            let control = tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => LoopControl::Break { reason: ShutdownReason::ChannelClosed },
                },
                _ = sleep_until(deadline) => LoopControl::Continue,
            };
            if let LoopControl::Break { reason } = control {
                shutdown_reason = Some(reason);
                break;
            }
            let outcomes = self.session.poll(Instant::now());
            if let LoopControl::Break { reason } = self.handle_outcomes(outcomes)? {
                shutdown_reason = Some(reason);
            }
        }

        self.rx.close();
        self.finalize_shutdown(shutdown_reason.unwrap_or(ShutdownReason::ChannelClosed))
            .await;
        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> LoopControl {
        if event == Event::Shutdown {
            return LoopControl::Break {
                reason: ShutdownReason::ShutdownEvent,
            };
        }
        trace!(target: "runtime.events", ?event, "event");
        self.session.dispatch(&event, Instant::now());
        LoopControl::Continue
    }

    fn handle_outcomes(&mut self, outcomes: Vec<CycleOutcome>) -> Result<LoopControl> {
        let mut rendered = false;
        let mut aborted = false;
        for outcome in outcomes.iter().filter(|o| o.view == self.session.view) {
            self.session.unsaved_insertions += outcome.insertions;
            rendered |= outcome.rendered();
            aborted |= outcome.flags.contains(CycleFlags::ABORTED);
            debug!(
                target: "runtime",
                flags = ?outcome.flags,
                labels = outcome.labels,
                insertions = outcome.insertions,
                generation = outcome.generation,
                "cycle_outcome"
            );
        }
        if rendered {
            if self.options.write && self.session.unsaved_insertions > 0 {
                self.session.save()?;
            }
            let lines = self.session.model.annotated_window(self.session.view);
            render::write_window(&mut self.out, &lines, self.options.styled)?;
        }
        if self.options.watch {
            return Ok(LoopControl::Continue);
        }
        if aborted {
            return Ok(LoopControl::Break {
                reason: ShutdownReason::Aborted,
            });
        }
        if rendered && self.session.idle() {
            return Ok(LoopControl::Break {
                reason: ShutdownReason::Rendered,
            });
        }
        Ok(LoopControl::Continue)
    }

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        log_shutdown_stage(reason, "begin");
        if let Some(tx) = self.tx.take() {
            trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "dropping_runtime_sender"
            );
            drop(tx);
        }

        while let Some(handle) = self.source_handles.pop() {
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(_)) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_stopped"
                ),
                Ok(Err(err)) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_cancelled"
                ),
                Ok(Err(err)) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "event_source_task_error"
                ),
                Err(_) => warn!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_timeout"
                ),
            }
        }

        log_shutdown_stage(reason, "complete");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    let session = startup.run(&args)?;

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let mut registry = EventSourceRegistry::new();
    if args.watch {
        registry.register(FileWatchSource::new(args.path.clone(), session.view));
    }
    let source_handles = registry.spawn_all(&tx);

    let options = RuntimeOptions {
        watch: args.watch,
        write: args.write,
        styled: crossterm::tty::IsTty::is_tty(&std::io::stdout()),
    };
    let mut runtime = Runtime::new(session, options, std::io::stdout(), tx, rx, source_handles);
    runtime.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_config::Timing;
    use pretty_assertions::assert_eq;

    fn fast_settings() -> CoordinatorSettings {
        CoordinatorSettings {
            timing: Timing {
                recompute: Duration::from_millis(20),
                settle: Duration::from_millis(20),
            },
            ..CoordinatorSettings::default()
        }
    }

    fn runtime_for(path: &Path, write: bool) -> (Runtime<Vec<u8>>, mpsc::Sender<Event>) {
        let text = std::fs::read_to_string(path).unwrap();
        let session = Session::open(path, &text, 0, 20, fast_settings()).unwrap();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAP);
        let options = RuntimeOptions {
            watch: false,
            write,
            styled: false,
        };
        (
            Runtime::new(session, options, Vec::new(), tx.clone(), rx, Vec::new()),
            tx,
        )
    }

    fn schedule_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn args_parse_flags() {
        let args = Args::try_parse_from([
            "timesum", "week.txt", "--first", "3", "--height", "10", "--watch",
        ])
        .unwrap();
        assert_eq!(args.path, PathBuf::from("week.txt"));
        assert_eq!(args.first, 3);
        assert_eq!(args.height, Some(10));
        assert!(args.watch);
        assert!(!args.write);
    }

    #[tokio::test]
    async fn one_shot_renders_labels_and_exits() {
        let file = schedule_file("0900-1000\n1000-1130\n\n14.3\n");
        let (mut runtime, _tx) = runtime_for(file.path(), false);
        runtime.run().await.unwrap();
        let out = String::from_utf8(runtime.out.clone()).unwrap();
        assert!(out.contains("   3 |      [2h 30m] "), "{out}");
        // File untouched without --write.
        assert_eq!(
            std::fs::read_to_string(file.path()).unwrap(),
            "0900-1000\n1000-1130\n\n14.3\n"
        );
    }

    #[tokio::test]
    async fn inserted_room_is_saved_with_write() {
        let file = schedule_file("0900-1000\n1000-1130\n14.3\n");
        let (mut runtime, _tx) = runtime_for(file.path(), true);
        runtime.run().await.unwrap();
        assert_eq!(
            std::fs::read_to_string(file.path()).unwrap(),
            "0900-1000\n1000-1130\n\n14.3\n"
        );
        let out = String::from_utf8(runtime.out.clone()).unwrap();
        assert!(out.contains("[2h 30m]"), "{out}");
        assert_eq!(runtime.session.unsaved_insertions, 0);
    }

    #[tokio::test]
    async fn shutdown_event_stops_watch_loop() {
        let file = schedule_file("0900-1000\n");
        let (mut runtime, tx) = runtime_for(file.path(), false);
        runtime.options.watch = true;
        tx.send(Event::Shutdown).await.unwrap();
        runtime.run().await.unwrap();
        let out = String::from_utf8(runtime.out.clone()).unwrap();
        assert!(out.contains("[1h 0m]"), "{out}");
    }

    #[test]
    fn reload_replaces_text_and_skips_identical_contents() {
        let file = schedule_file("0900-1000\n");
        let text = std::fs::read_to_string(file.path()).unwrap();
        let mut session = Session::open(file.path(), &text, 0, 10, fast_settings()).unwrap();
        session.model.drain_events();

        session.reload(session.view).unwrap();
        assert!(session.model.drain_events().is_empty());

        std::fs::write(file.path(), "0900-1000\n1000-1100\n").unwrap();
        session.reload(session.view).unwrap();
        assert_eq!(
            session.model.drain_events(),
            vec![Event::ContentChanged { view: session.view }]
        );
    }
}
