//! Splits a cell into directive + SQL blocks.
//!
//! The first block takes its directive from the magic line itself; every
//! later `%%<magic> ...` line in the body starts a new block.

use regex::Regex;

use crate::error::{NqlError, Result};

/// One unparsed block of a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    /// Zero-based position in the cell.
    pub index: usize,
    /// Directive text with the magic name removed.
    pub directive: String,
    /// SQL text, trimmed.
    pub sql: String,
    /// One-based body line of the block's marker, 0 for the leading block.
    pub line: usize,
}

/// Finds `%%<magic>` marker lines.
#[derive(Debug, Clone)]
pub struct CellSplitter {
    marker: Regex,
}

impl CellSplitter {
    pub fn new(magic: &str) -> Result<Self> {
        let pattern = format!(r"^\s*%%{}(?:\s+(.*))?$", regex::escape(magic));
        let marker = Regex::new(&pattern)
            .map_err(|e| NqlError::config(format!("invalid magic name '{magic}': {e}")))?;
        Ok(Self { marker })
    }

    /// Directive text if `line` is a block marker.
    pub fn marker_directive<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.marker.captures(line).map(|caps| {
            caps.get(1)
                .map_or("", |directive| directive.as_str())
                .trim()
        })
    }

    /// Separates a leading `%%<magic> ...` line from the rest of a script.
    ///
    /// Without a leading marker the directive is empty and the whole text is
    /// the body.
    pub fn split_leading<'a>(&self, text: &'a str) -> (&'a str, &'a str) {
        let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
        match self.marker_directive(first) {
            Some(directive) => (directive, rest),
            None => ("", text),
        }
    }

    /// Splits `body` into blocks. Blocks with empty SQL are kept so the
    /// caller can report them.
    pub fn split(&self, directive_line: &str, body: &str) -> Vec<RawBlock> {
        let mut blocks = Vec::new();
        let mut directive = directive_line.trim().to_string();
        let mut start_line = 0;
        let mut sql_lines: Vec<&str> = Vec::new();

        for (number, line) in body.lines().enumerate() {
            if let Some(next) = self.marker_directive(line) {
                blocks.push(RawBlock {
                    index: blocks.len(),
                    directive: std::mem::replace(&mut directive, next.to_string()),
                    sql: sql_lines.join("\n").trim().to_string(),
                    line: start_line,
                });
                sql_lines.clear();
                start_line = number + 1;
            } else {
                sql_lines.push(line);
            }
        }

        blocks.push(RawBlock {
            index: blocks.len(),
            directive,
            sql: sql_lines.join("\n").trim().to_string(),
            line: start_line,
        });
        blocks
    }
}
