//! Terminal output of an annotated window.

use anyhow::Result;
use core_annotate::LabelSpec;
use core_model::AnnotatedLine;
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use std::io::Write;

/// Gutter width for 1-based line numbers.
const GUTTER: usize = 4;

/// Plain rendering of one line: gutter, then labels in front of the text.
pub fn plain_line(line: &AnnotatedLine) -> String {
    let mut out = format!("{:>GUTTER$} | ", line.index + 1);
    for label in &line.labels {
        push_label(&mut out, label);
    }
    out.push_str(&line.text);
    out
}

fn push_label(out: &mut String, label: &LabelSpec) {
    out.extend(std::iter::repeat_n(' ', label.style.margin_left as usize));
    out.push_str(&label.text);
    out.push(' ');
}

/// Write the window to `out`, styling labels with their colour and weight
/// when `styled` is set.
pub fn write_window<W: Write>(out: &mut W, lines: &[AnnotatedLine], styled: bool) -> Result<()> {
    for line in lines {
        if !styled {
            writeln!(out, "{}", plain_line(line))?;
            continue;
        }
        queue!(out, Print(format!("{:>GUTTER$} | ", line.index + 1)))?;
        for label in &line.labels {
            let margin = " ".repeat(label.style.margin_left as usize);
            queue!(out, Print(margin))?;
            if let Some((r, g, b)) = label.style.color {
                queue!(out, SetForegroundColor(Color::Rgb { r, g, b }))?;
            }
            if label.style.bold {
                queue!(out, SetAttribute(Attribute::Bold))?;
            }
            queue!(
                out,
                Print(&label.text),
                SetAttribute(Attribute::Reset),
                ResetColor,
                Print(' ')
            )?;
        }
        queue!(out, Print(&line.text), Print('\n'))?;
    }
    out.flush()?;
    Ok(())
}
