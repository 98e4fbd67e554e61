//! Host editor capability surface.
//!
//! The coordinator never owns document text or rendering. It reads lines and
//! the visible range through [`EditorHost`], and asks the host to insert text
//! and to attach or dispose labels. Reads return `Option` (unknown view or
//! line); mutations return [`HostError`] so failures can be logged and the
//! cycle degraded to "no annotation".

use core_config::StyleConfig;
use core_duration::LineSource;
use core_events::{ViewId, VisibleRange};
use core_text::Position;
use std::borrow::Cow;
use thiserror::Error;

/// Opaque handle for a label attached by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelHandle(pub u64);

/// Fixed presentation constants for labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelStyle {
    pub color: Option<(u8, u8, u8)>,
    pub bold: bool,
    pub margin_left: u16,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self::from_config(&StyleConfig::default())
    }
}

impl LabelStyle {
    pub fn from_config(style: &StyleConfig) -> Self {
        Self {
            color: style.rgb(),
            bold: style.bold,
            margin_left: style.margin_left,
        }
    }
}

/// What the host is asked to render in front of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSpec {
    pub text: String,
    pub style: LabelStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("view {0:?} is not open")]
    UnknownView(ViewId),
    #[error("line {line} is outside view {view:?}")]
    LineOutOfRange { view: ViewId, line: usize },
    #[error("host rejected request: {0}")]
    Rejected(String),
}

pub trait EditorHost {
    fn line_count(&self, view: ViewId) -> Option<usize>;
    /// Line text without its terminator.
    fn line_text(&self, view: ViewId, line: usize) -> Option<Cow<'_, str>>;
    fn visible_range(&self, view: ViewId) -> Option<VisibleRange>;
    fn insert_text(&mut self, view: ViewId, at: Position, text: &str) -> Result<(), HostError>;
    fn attach_label(
        &mut self,
        view: ViewId,
        line: usize,
        spec: &LabelSpec,
    ) -> Result<LabelHandle, HostError>;
    fn dispose_label(&mut self, view: ViewId, handle: LabelHandle) -> Result<(), HostError>;
}

/// [`LineSource`] view of one host view, used to drive the duration engine.
pub struct HostLines<'a, H: ?Sized> {
    host: &'a H,
    view: ViewId,
}

impl<'a, H: EditorHost + ?Sized> HostLines<'a, H> {
    pub fn new(host: &'a H, view: ViewId) -> Self {
        Self { host, view }
    }
}

impl<H: EditorHost + ?Sized> LineSource for HostLines<'_, H> {
    fn line_count(&self) -> usize {
        self.host.line_count(self.view).unwrap_or(0)
    }

    fn line(&self, idx: usize) -> Option<Cow<'_, str>> {
        self.host.line_text(self.view, idx)
    }
}
