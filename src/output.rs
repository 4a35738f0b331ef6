//! Display of shown frames and block errors.

use std::io::Write;
use tracing::warn;

use crate::directive::Title;
use crate::error::{NqlError, Result};
use crate::frame::Frame;

/// Maximum width for any column.
const MAX_COLUMN_WIDTH: usize = 40;

/// Heading level used when `TITLE` gives no size.
const DEFAULT_TITLE_SIZE: u32 = 3;

/// Where shown frames and block errors go.
pub trait OutputSink {
    /// Displays a frame, preceded by its title if one was given.
    fn show(&mut self, title: Option<&Title>, frame: &Frame) -> Result<()>;

    /// Reports a failed block. `block` is `None` for line-form invocations.
    fn report_error(&mut self, block: Option<usize>, error: &NqlError);

    /// Short status line for statements that return no frame.
    fn status(&mut self, _message: &str) {}
}

/// Plain-text sink that renders frames as aligned tables.
pub struct TextOutput<W: Write> {
    out: W,
    preview_rows: usize,
}

impl<W: Write> TextOutput<W> {
    pub fn new(out: W, preview_rows: usize) -> Self {
        Self { out, preview_rows }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> OutputSink for TextOutput<W> {
    fn show(&mut self, title: Option<&Title>, frame: &Frame) -> Result<()> {
        if let Some(title) = title {
            let level = title.size.unwrap_or(DEFAULT_TITLE_SIZE).clamp(1, 6) as usize;
            writeln!(self.out, "{} {}", "#".repeat(level), title.text)?;
        }

        let preview = frame.head(self.preview_rows);
        writeln!(self.out, "{}", format_table(&preview))?;
        if let Some(warning) = frame.truncation_warning(self.preview_rows) {
            writeln!(self.out, "{warning}")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn report_error(&mut self, block: Option<usize>, error: &NqlError) {
        let written = match block {
            Some(index) => writeln!(self.out, "Error in block {}: {}", index + 1, error),
            None => writeln!(self.out, "Error: {error}"),
        };
        if let Err(e) = written {
            warn!("Failed to report error: {}", e);
        }
    }

    fn status(&mut self, message: &str) {
        if let Err(e) = writeln!(self.out, "{message}") {
            warn!("Failed to write status: {}", e);
        }
    }
}

fn truncate(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_width.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Formats a frame as an aligned text table.
pub fn format_table(frame: &Frame) -> String {
    if frame.columns.is_empty() {
        return "(no columns)".to_string();
    }

    let headers: Vec<String> = frame
        .headings()
        .iter()
        .map(|h| truncate(h, MAX_COLUMN_WIDTH))
        .collect();
    let rows: Vec<Vec<String>> = frame
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| truncate(&v.to_display_string().replace('\n', " "), MAX_COLUMN_WIDTH))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let pad = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = widths.get(i).copied().unwrap_or(0);
                format!("{cell:width$}")
            })
            .collect::<Vec<_>>()
            .join(" │ ")
    };

    let mut output = String::new();
    output.push_str(&pad(&headers));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    output.push_str(&separator.join("─┼─"));

    for row in &rows {
        output.push('\n');
        output.push_str(&pad(row));
    }
    output.push_str(&format!("\n({} rows)", frame.row_count()));

    output
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ColumnInfo, Value};
    use pretty_assertions::assert_eq;

    fn frame(rows: usize) -> Frame {
        Frame::with_data(
            vec![ColumnInfo::new("id", "INT"), ColumnInfo::new("name", "TEXT")],
            (0..rows)
                .map(|i| vec![Value::Int(i as i64), Value::from(format!("n{i}"))])
                .collect(),
        )
    }

    #[test]
    fn test_format_table() {
        assert_eq!(
            format_table(&frame(2)),
            "id │ name\n───┼─────\n0  │ n0\n1  │ n1\n(2 rows)"
        );
    }

    #[test]
    fn test_format_table_without_columns() {
        assert_eq!(format_table(&Frame::new()), "(no columns)");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long value", 8), "a lon...");
    }

    #[test]
    fn test_show_previews_rows_with_title() {
        let mut sink = TextOutput::new(Vec::new(), 2);
        let title = Title {
            text: "Numbers".to_string(),
            size: Some(1),
        };
        sink.show(Some(&title), &frame(5)).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.starts_with("# Numbers\n"));
        assert!(text.contains("n1"));
        assert!(!text.contains("n2"));
        assert!(text.contains("Result truncated: showing 2 of 5 rows"));
    }

    #[test]
    fn test_report_error_names_block() {
        let mut sink = TextOutput::new(Vec::new(), 20);
        sink.report_error(Some(1), &NqlError::syntax("unrecognized directive 'x'"));
        sink.report_error(None, &NqlError::binding("undefined variable 'y'"));

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.contains("Error in block 2: Syntax error: unrecognized directive 'x'"));
        assert!(text.contains("Error: Binding error: undefined variable 'y'"));
    }
}
