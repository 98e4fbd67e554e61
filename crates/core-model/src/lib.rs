//! In-memory editor model: documents, views and rendered labels.
//!
//! This is the host side of the coordinator contract for the `timesum`
//! binary and for integration tests. It owns buffers and views and
//! implements [`EditorHost`].
//!
//! Invariants (must hold after every public call):
//! * every `View::buffer_index` names an existing buffer;
//! * a view's first visible line is always a valid line index of its buffer
//!   (clamped on scroll, resize and text replacement);
//! * labels are stored per view and die with it.
//!
//! Every mutation that a real editor would announce queues the matching
//! [`Event`] in an outbox. Text inserted through [`EditorHost::insert_text`]
//! is announced too, so the coordinator sees the echo of its own edit exactly
//! as it would inside a real host. Callers forward [`EditorModel::drain_events`]
//! into the runtime channel.

use anyhow::Result;
use core_annotate::{EditorHost, HostError, LabelHandle, LabelSpec};
use core_events::{Event, ViewId, VisibleRange};
use core_text::{Buffer, Position};
use std::borrow::Cow;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct View {
    pub id: ViewId,
    pub buffer_index: usize,
    pub viewport_first_line: usize,
    pub height: usize,
    labels: BTreeMap<LabelHandle, RenderedLabel>,
}

impl View {
    fn new(id: ViewId, buffer_index: usize, height: usize) -> Self {
        Self {
            id,
            buffer_index,
            viewport_first_line: 0,
            height,
            labels: BTreeMap::new(),
        }
    }
}

/// A label as the host holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLabel {
    pub line: usize,
    pub spec: LabelSpec,
}

/// One visible line with the labels rendered in front of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedLine {
    pub index: usize,
    pub text: String,
    pub labels: Vec<LabelSpec>,
}

/// Clamp a requested first line so at least one line stays visible.
pub fn clamp_first_line(first: usize, line_count: usize) -> usize {
    first.min(line_count.saturating_sub(1))
}

#[derive(Default)]
pub struct EditorModel {
    buffers: Vec<Buffer>,
    views: Vec<View>,
    next_view: usize,
    next_label: u64,
    outbox: Vec<Event>,
}

impl EditorModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `buffer` in a new view `height` rows tall.
    pub fn open(&mut self, buffer: Buffer, height: usize) -> ViewId {
        self.buffers.push(buffer);
        self.attach_view(self.buffers.len() - 1, height)
    }

    /// Open a second view onto the buffer shown by `view`.
    pub fn split(&mut self, view: ViewId, height: usize) -> Option<ViewId> {
        let buffer_index = self.view(view)?.buffer_index;
        Some(self.attach_view(buffer_index, height))
    }

    fn attach_view(&mut self, buffer_index: usize, height: usize) -> ViewId {
        let id = ViewId(self.next_view);
        self.next_view += 1;
        self.views.push(View::new(id, buffer_index, height));
        tracing::debug!(target: "model", view = id.0, buffer = buffer_index, height, "view_opened");
        self.outbox.push(Event::ContentChanged { view: id });
        id
    }

    /// Close `view`. Its labels are dropped with it; the buffer stays.
    pub fn close(&mut self, view: ViewId) -> bool {
        let Some(pos) = self.views.iter().position(|v| v.id == view) else {
            return false;
        };
        self.views.remove(pos);
        self.outbox.push(Event::ViewClosed { view });
        true
    }

    pub fn view(&self, view: ViewId) -> Option<&View> {
        self.views.iter().find(|v| v.id == view)
    }

    fn view_mut(&mut self, view: ViewId) -> Option<&mut View> {
        self.views.iter_mut().find(|v| v.id == view)
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn buffer(&self, view: ViewId) -> Option<&Buffer> {
        self.buffers.get(self.view(view)?.buffer_index)
    }

    /// Scroll `view` so `first` is the top line (clamped). Returns the new
    /// visible range; no event is queued when nothing moved.
    pub fn scroll_to(&mut self, view: ViewId, first: usize) -> Option<VisibleRange> {
        let line_count = self.buffer(view)?.line_count();
        let v = self.view_mut(view)?;
        let clamped = clamp_first_line(first, line_count);
        if clamped != v.viewport_first_line {
            v.viewport_first_line = clamped;
            let range = self.visible_range(view)?;
            self.outbox.push(Event::VisibleRangeChanged { view, range });
        }
        self.visible_range(view)
    }

    pub fn resize(&mut self, view: ViewId, height: usize) -> Option<VisibleRange> {
        let v = self.view_mut(view)?;
        if v.height == height {
            return self.visible_range(view);
        }
        v.height = height;
        let range = self.visible_range(view)?;
        self.outbox.push(Event::VisibleRangeChanged { view, range });
        Some(range)
    }

    /// Replace the whole text of the buffer behind `view` (file reload).
    pub fn replace_contents(&mut self, view: ViewId, text: &str) -> Result<()> {
        let Some(index) = self.view(view).map(|v| v.buffer_index) else {
            anyhow::bail!("view {:?} is not open", view);
        };
        let name = self.buffers[index].name.clone();
        self.buffers[index] = Buffer::from_str(name, text)?;
        let line_count = self.buffers[index].line_count();
        for v in self.views.iter_mut().filter(|v| v.buffer_index == index) {
            v.viewport_first_line = clamp_first_line(v.viewport_first_line, line_count);
        }
        self.announce_buffer_change(index);
        Ok(())
    }

    fn announce_buffer_change(&mut self, buffer_index: usize) {
        for v in self.views.iter().filter(|v| v.buffer_index == buffer_index) {
            self.outbox.push(Event::ContentChanged { view: v.id });
        }
    }

    /// Take queued notifications in the order they happened.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    /// Labels of `view` ordered by line.
    pub fn labels(&self, view: ViewId) -> Vec<RenderedLabel> {
        let Some(v) = self.view(view) else {
            return Vec::new();
        };
        let mut labels: Vec<_> = v.labels.values().cloned().collect();
        labels.sort_by_key(|l| l.line);
        labels
    }

    /// Visible lines of `view` with their labels, for rendering.
    pub fn annotated_window(&self, view: ViewId) -> Vec<AnnotatedLine> {
        let (Some(range), Some(buffer)) = (self.visible_range(view), self.buffer(view)) else {
            return Vec::new();
        };
        let labels = self.labels(view);
        (range.first..=range.last)
            .filter_map(|index| {
                let text = buffer.line_text(index)?;
                let labels = labels
                    .iter()
                    .filter(|l| l.line == index)
                    .map(|l| l.spec.clone())
                    .collect();
                Some(AnnotatedLine {
                    index,
                    text,
                    labels,
                })
            })
            .collect()
    }
}

impl EditorHost for EditorModel {
    fn line_count(&self, view: ViewId) -> Option<usize> {
        self.buffer(view).map(Buffer::line_count)
    }

    fn line_text(&self, view: ViewId, line: usize) -> Option<Cow<'_, str>> {
        self.buffer(view)?.line_text(line).map(Cow::Owned)
    }

    fn visible_range(&self, view: ViewId) -> Option<VisibleRange> {
        let v = self.view(view)?;
        let line_count = self.buffers.get(v.buffer_index)?.line_count();
        let range = VisibleRange::from_viewport(v.viewport_first_line, v.height);
        Some(VisibleRange::new(
            range.first,
            range.last.min(line_count.saturating_sub(1)),
        ))
    }

    fn insert_text(&mut self, view: ViewId, at: Position, text: &str) -> Result<(), HostError> {
        let index = self
            .view(view)
            .map(|v| v.buffer_index)
            .ok_or(HostError::UnknownView(view))?;
        let inserted_at = self.buffers[index].insert_text(at, text);
        tracing::trace!(target: "model", view = view.0, line = inserted_at.line, byte = inserted_at.byte, len = text.len(), "text_inserted");
        self.announce_buffer_change(index);
        Ok(())
    }

    fn attach_label(
        &mut self,
        view: ViewId,
        line: usize,
        spec: &LabelSpec,
    ) -> Result<LabelHandle, HostError> {
        let line_count = self.line_count(view).ok_or(HostError::UnknownView(view))?;
        if line >= line_count {
            return Err(HostError::LineOutOfRange { view, line });
        }
        self.next_label += 1;
        let handle = LabelHandle(self.next_label);
        let v = self.view_mut(view).ok_or(HostError::UnknownView(view))?;
        v.labels.insert(
            handle,
            RenderedLabel {
                line,
                spec: spec.clone(),
            },
        );
        Ok(handle)
    }

    fn dispose_label(&mut self, view: ViewId, handle: LabelHandle) -> Result<(), HostError> {
        // Labels die with their view; disposing after close is a no-op.
        let Some(v) = self.view_mut(view) else {
            return Ok(());
        };
        v.labels
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| HostError::Rejected(format!("unknown label {}", handle.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_annotate::LabelStyle;

    fn model(text: &str, height: usize) -> (EditorModel, ViewId) {
        let mut m = EditorModel::new();
        let id = m.open(Buffer::from_str("t", text).unwrap(), height);
        (m, id)
    }

    fn spec(text: &str) -> LabelSpec {
        LabelSpec {
            text: text.into(),
            style: LabelStyle::default(),
        }
    }

    #[test]
    fn open_announces_view() {
        let (mut m, id) = model("0900-1000\n", 10);
        assert_eq!(m.drain_events(), vec![Event::ContentChanged { view: id }]);
        assert!(m.drain_events().is_empty());
    }

    #[test]
    fn visible_range_clamped_to_buffer() {
        let (m, id) = model("a\nb\nc", 10);
        assert_eq!(m.visible_range(id), Some(VisibleRange::new(0, 2)));
    }

    #[test]
    fn scroll_clamps_and_announces_once() {
        let (mut m, id) = model("a\nb\nc\nd", 2);
        m.drain_events();
        let range = m.scroll_to(id, 10).unwrap();
        assert_eq!(range, VisibleRange::new(3, 3));
        assert_eq!(
            m.drain_events(),
            vec![Event::VisibleRangeChanged { view: id, range }]
        );
        m.scroll_to(id, 3);
        assert!(m.drain_events().is_empty());
    }

    #[test]
    fn insertion_echoes_to_every_view_of_buffer() {
        let (mut m, a) = model("0900-1000\n14.3\n", 10);
        let b = m.split(a, 5).unwrap();
        m.drain_events();
        m.insert_text(a, Position::new(1, 0), "\n").unwrap();
        assert_eq!(
            m.drain_events(),
            vec![
                Event::ContentChanged { view: a },
                Event::ContentChanged { view: b }
            ]
        );
        assert_eq!(m.buffer(b).unwrap().contents(), "0900-1000\n\n14.3\n");
    }

    #[test]
    fn attach_rejects_out_of_range_line() {
        let (mut m, id) = model("a\nb", 10);
        assert_eq!(
            m.attach_label(id, 2, &spec("[1h 0m]")),
            Err(HostError::LineOutOfRange { view: id, line: 2 })
        );
    }

    #[test]
    fn labels_live_and_die_with_view() {
        let (mut m, id) = model("a\n\nb", 10);
        let h = m.attach_label(id, 1, &spec("[1h 0m]")).unwrap();
        assert_eq!(m.labels(id).len(), 1);
        let window = m.annotated_window(id);
        assert_eq!(window[1].labels, vec![spec("[1h 0m]")]);
        assert!(m.close(id));
        assert!(m.labels(id).is_empty());
        assert_eq!(m.dispose_label(id, h), Ok(()));
    }

    #[test]
    fn replace_contents_reclamps_viewport() {
        let (mut m, id) = model("a\nb\nc\nd\ne", 2);
        m.scroll_to(id, 4);
        m.replace_contents(id, "x\ny").unwrap();
        assert_eq!(m.view(id).unwrap().viewport_first_line, 1);
        let events = m.drain_events();
        assert!(events.contains(&Event::ContentChanged { view: id }));
    }
}
