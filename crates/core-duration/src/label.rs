//! Duration label formatting.
//!
//! Labels are rendered from a small template language with three
//! placeholders: `{hours}`, `{minutes}` (remainder after hours) and `{total}`
//! (raw minutes). Templates are parsed once, at configuration time, so the
//! per-scan render path cannot fail.

use thiserror::Error;

/// Template used when configuration supplies none (or an invalid one).
pub const DEFAULT_TEMPLATE: &str = "[{hours}h {minutes}m]";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder `{{{0}}}` in label template")]
    UnknownPlaceholder(String),
    #[error("unclosed placeholder starting at byte {0} in label template")]
    Unclosed(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Hours,
    Minutes,
    Total,
}

/// Parsed label template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl Default for LabelTemplate {
    fn default() -> Self {
        // The default template is known-good; build its segments directly.
        Self {
            source: DEFAULT_TEMPLATE.to_string(),
            segments: vec![
                Segment::Literal("[".into()),
                Segment::Hours,
                Segment::Literal("h ".into()),
                Segment::Minutes,
                Segment::Literal("m]".into()),
            ],
        }
    }
}

impl LabelTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;
        let mut offset = 0usize;
        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or(TemplateError::Unclosed(offset + open))?;
            let segment = match &after[..close] {
                "hours" => Segment::Hours,
                "minutes" => Segment::Minutes,
                "total" => Segment::Total,
                other => return Err(TemplateError::UnknownPlaceholder(other.to_string())),
            };
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(segment);
            let consumed = open + 1 + close + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Parse `source`, falling back to [`DEFAULT_TEMPLATE`] on error.
    pub fn parse_or_default(source: &str) -> Self {
        match Self::parse(source) {
            Ok(template) => template,
            Err(err) => {
                tracing::warn!(target: "config", %err, "label_template_invalid");
                Self::default()
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, total_minutes: u32) -> String {
        let hours = total_minutes / 60;
        let minutes = total_minutes % 60;
        let mut out = String::with_capacity(self.source.len() + 4);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Hours => out.push_str(&hours.to_string()),
                Segment::Minutes => out.push_str(&minutes.to_string()),
                Segment::Total => out.push_str(&total_minutes.to_string()),
            }
        }
        out
    }
}

/// Render `total_minutes` with the default template, e.g. `90` -> `[1h 30m]`.
pub fn format(total_minutes: u32) -> String {
    LabelTemplate::default().render(total_minutes)
}
