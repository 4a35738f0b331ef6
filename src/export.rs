//! CSV export.
//!
//! Writes a heading row followed by one line per frame row. Fields are
//! quoted only when they contain a delimiter, quote or line break, and
//! embedded quotes are doubled. NULL is written as an empty field.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::db::Value;
use crate::error::Result;
use crate::frame::Frame;

/// Writes `frame` to `path`, replacing any existing file.
pub fn write_csv(frame: &Frame, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    write_frame(frame, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Writes `frame` as CSV to any writer.
pub fn write_frame(frame: &Frame, out: &mut impl Write) -> std::io::Result<()> {
    let headings: Vec<String> = frame.headings().iter().map(|h| quote(h)).collect();
    writeln!(out, "{}", headings.join(","))?;

    for row in &frame.rows {
        let fields: Vec<String> = row.iter().map(field).collect();
        writeln!(out, "{}", fields.join(","))?;
    }
    Ok(())
}

fn field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bytes(bytes) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        other => quote(&other.to_display_string()),
    }
}

fn quote(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}
