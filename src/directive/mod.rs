//! Directive line parsing.
//!
//! A directive is the non-SQL part of an `nql` invocation:
//!
//! ```text
//! %%nql SESSION warehouse CREATE daily limit=10 NOJINJA
//! %%nql rows=ROWS first=RECORD TITLE 'Top rows' 2 SHOW
//! %%nql CSV '/tmp/out file.csv' region='north'
//! ```
//!
//! Keywords are case-insensitive. Each whitespace-delimited chunk is tried
//! against the rules in [`RULES`] order and the first rule that accepts it
//! wins.

mod set;
mod tokenizer;

pub use set::{DirectiveSet, Title};
pub use tokenizer::{parse_line, tokenize, RuleKind, RULES};

use std::fmt;
use std::path::PathBuf;

use crate::template::{quote_identifier, scan_quoted};

/// One parsed directive token.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `name='literal'`, `name=variable` or `name=42`.
    Arg { name: String, value: ArgValue },
    /// `SESSION [AS] name`.
    Session(String),
    /// `CREATE name`.
    CreateTable(QualifiedName),
    /// `VIEW name`.
    CreateView(QualifiedName),
    /// `CSV path` or `CSV 'path'`.
    Csv(PathBuf),
    /// `target=FORM`.
    Assign { form: AssignForm, target: String },
    /// `TITLE 'text' [size]`.
    Title { text: String, size: Option<u32> },
    /// `NOJINJA` / `NOJ`.
    NoJinja,
    /// `SHOW`.
    Show,
    /// A chunk no rule accepted.
    Unrecognized(String),
}

impl Directive {
    /// Short name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Directive::Arg { .. } => "argument",
            Directive::Session(_) => "SESSION",
            Directive::CreateTable(_) => "CREATE",
            Directive::CreateView(_) => "VIEW",
            Directive::Csv(_) => "CSV",
            Directive::Assign { .. } => "assign",
            Directive::Title { .. } => "TITLE",
            Directive::NoJinja => "NOJINJA",
            Directive::Show => "SHOW",
            Directive::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Right-hand side of an argument binding.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Single-quoted text, with doubled quotes unescaped.
    Literal(String),
    /// Name of a host variable.
    Variable(String),
    /// Integer or float literal.
    Number(crate::db::Value),
}

/// Result projections that can be bound to a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssignForm {
    Df,
    Sql,
    Row,
    Rows,
    Col,
    Cols,
    Cell,
    Record,
    Records,
    Headings,
}

impl AssignForm {
    pub const ALL: [AssignForm; 10] = [
        AssignForm::Df,
        AssignForm::Sql,
        AssignForm::Row,
        AssignForm::Rows,
        AssignForm::Col,
        AssignForm::Cols,
        AssignForm::Cell,
        AssignForm::Record,
        AssignForm::Records,
        AssignForm::Headings,
    ];

    /// Matches a reserved form keyword, ignoring case.
    pub fn parse(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|form| form.keyword().eq_ignore_ascii_case(word))
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            AssignForm::Df => "DF",
            AssignForm::Sql => "SQL",
            AssignForm::Row => "ROW",
            AssignForm::Rows => "ROWS",
            AssignForm::Col => "COL",
            AssignForm::Cols => "COLS",
            AssignForm::Cell => "CELL",
            AssignForm::Record => "RECORD",
            AssignForm::Records => "RECORDS",
            AssignForm::Headings => "HEADINGS",
        }
    }
}

impl fmt::Display for AssignForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One dot-separated part of a table or view name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePart {
    /// Plain identifier, emitted as written.
    Bare(String),
    /// Double-quoted identifier, stored unescaped.
    Quoted(String),
}

/// A possibly schema-qualified relation name such as `s."My Table"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    parts: Vec<NamePart>,
}

impl QualifiedName {
    /// A single unquoted name.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            parts: vec![NamePart::Bare(name.into())],
        }
    }

    pub fn parts(&self) -> &[NamePart] {
        &self.parts
    }

    /// Parses `part(.part)*`, each part bare or double-quoted.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = Vec::new();
        let mut rest = text;
        loop {
            if rest.starts_with('"') {
                let (name, consumed) = scan_quoted(rest, '"')?;
                if name.is_empty() {
                    return None;
                }
                parts.push(NamePart::Quoted(name));
                rest = &rest[consumed..];
            } else {
                let end = rest.find('.').unwrap_or(rest.len());
                let name = &rest[..end];
                if !is_identifier(name) {
                    return None;
                }
                parts.push(NamePart::Bare(name.to_string()));
                rest = &rest[end..];
            }

            if rest.is_empty() {
                return Some(Self { parts });
            }
            rest = rest.strip_prefix('.')?;
        }
    }

    /// SQL text for the name, quoting the parts that were quoted.
    pub fn to_sql(&self) -> String {
        self.parts
            .iter()
            .map(|part| match part {
                NamePart::Bare(name) => name.clone(),
                NamePart::Quoted(name) => quote_identifier(name),
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// True for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses a directive line in which every chunk must be a directive.
pub fn parse_directives(text: &str) -> crate::error::Result<DirectiveSet> {
    DirectiveSet::from_tokens(tokenize(text)?)
}
