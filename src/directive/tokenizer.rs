//! Chunk scanner and rule table for directive lines.

use std::path::PathBuf;

use super::{is_identifier, ArgValue, AssignForm, Directive, DirectiveSet, QualifiedName};
use crate::db::Value;
use crate::error::{NqlError, Result};
use crate::template::scan_quoted;

/// Directive rules, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    ArgBinding,
    Session,
    Create,
    View,
    Csv,
    Assign,
    Title,
    NoJinja,
    Show,
}

/// Order in which rules are tried against each chunk. A chunk no rule
/// accepts becomes [`Directive::Unrecognized`].
pub const RULES: [RuleKind; 9] = [
    RuleKind::ArgBinding,
    RuleKind::Session,
    RuleKind::Create,
    RuleKind::View,
    RuleKind::Csv,
    RuleKind::Assign,
    RuleKind::Title,
    RuleKind::NoJinja,
    RuleKind::Show,
];

/// Words that follow `CREATE` in ordinary DDL. In the line form
/// `CREATE TABLE ...` is SQL, not a directive naming a table called `TABLE`.
const SQL_OBJECT_KEYWORDS: &[&str] = &[
    "TABLE",
    "VIEW",
    "INDEX",
    "UNIQUE",
    "OR",
    "TEMP",
    "TEMPORARY",
    "SCHEMA",
    "TRIGGER",
    "VIRTUAL",
    "MATERIALIZED",
    "SEQUENCE",
    "FUNCTION",
    "EXTENSION",
    "TYPE",
    "DATABASE",
    "ROLE",
    "USER",
];

/// Words that begin a statement. After one of these, a line-form `SHOW` is
/// the display flag; before anything else it is the SQL `SHOW` command.
const STATEMENT_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "VALUES", "TABLE", "INSERT", "UPDATE", "DELETE", "MERGE", "REPLACE",
    "CREATE", "DROP", "ALTER", "TRUNCATE", "EXPLAIN", "PRAGMA", "CALL", "COPY", "GRANT",
    "REVOKE", "SET", "SHOW", "BEGIN", "COMMIT", "ROLLBACK", "ANALYZE", "VACUUM", "DO",
];

impl RuleKind {
    fn apply<'a>(self, chunk: Chunk<'a>, cursor: &mut Cursor<'a>) -> Result<Option<Directive>> {
        match self {
            RuleKind::ArgBinding => Ok(arg_binding(chunk.text)),
            RuleKind::Session => session(chunk, cursor),
            RuleKind::Create => {
                relation(chunk, cursor, "CREATE").map(|name| name.map(Directive::CreateTable))
            }
            RuleKind::View => {
                relation(chunk, cursor, "VIEW").map(|name| name.map(Directive::CreateView))
            }
            RuleKind::Csv => csv(chunk, cursor),
            RuleKind::Assign => Ok(assign(chunk.text)),
            RuleKind::Title => title(chunk, cursor),
            RuleKind::NoJinja => Ok((chunk.is_keyword("NOJINJA") || chunk.is_keyword("NOJ"))
                .then_some(Directive::NoJinja)),
            RuleKind::Show => Ok(chunk.is_keyword("SHOW").then_some(Directive::Show)),
        }
    }
}

/// A whitespace-delimited run; quoted sections may contain whitespace.
#[derive(Debug, Clone, Copy)]
struct Chunk<'a> {
    text: &'a str,
    start: usize,
}

impl Chunk<'_> {
    fn is_keyword(&self, keyword: &str) -> bool {
        self.text.eq_ignore_ascii_case(keyword)
    }
}

#[derive(Debug, Clone, Copy)]
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    /// Set when SQL follows the directives on the same line.
    line_form: bool,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line_form: false,
        }
    }

    fn for_line(src: &'a str) -> Self {
        Self {
            line_form: true,
            ..Self::new(src)
        }
    }

    /// Offset of the next non-whitespace character.
    fn content_start(&self) -> usize {
        let rest = &self.src[self.pos..];
        self.pos + (rest.len() - rest.trim_start().len())
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk<'a>>> {
        let start = self.content_start();
        let rest = &self.src[start..];

        let mut len = 0;
        while let Some(c) = rest[len..].chars().next() {
            if c.is_whitespace() {
                break;
            }
            if c == '\'' || c == '"' {
                let (_, consumed) = scan_quoted(&rest[len..], c).ok_or_else(|| {
                    NqlError::syntax(format!("unterminated quote in directive near '{rest}'"))
                })?;
                len += consumed;
            } else {
                len += c.len_utf8();
            }
        }

        self.pos = start + len;
        if len == 0 {
            return Ok(None);
        }
        Ok(Some(Chunk {
            text: &rest[..len],
            start,
        }))
    }

    /// Consumes the next chunk only if `accept` likes its text.
    fn next_if(&mut self, accept: impl Fn(&str) -> bool) -> Option<Chunk<'a>> {
        let mut ahead = *self;
        match ahead.next_chunk() {
            Ok(Some(chunk)) if accept(chunk.text) => {
                *self = ahead;
                Some(chunk)
            }
            _ => None,
        }
    }
}

fn apply_rules<'a>(chunk: Chunk<'a>, cursor: &mut Cursor<'a>) -> Result<Directive> {
    for rule in RULES {
        let mut attempt = *cursor;
        if let Some(directive) = rule.apply(chunk, &mut attempt)? {
            *cursor = attempt;
            return Ok(directive);
        }
    }
    Ok(Directive::Unrecognized(chunk.text.to_string()))
}

/// Tokenizes a directive line. Chunks that no rule accepts come back as
/// [`Directive::Unrecognized`]; only malformed arguments are errors here.
pub fn tokenize(text: &str) -> Result<Vec<Directive>> {
    let mut cursor = Cursor::new(text);
    let mut tokens = Vec::new();
    while let Some(chunk) = cursor.next_chunk()? {
        tokens.push(apply_rules(chunk, &mut cursor)?);
    }
    Ok(tokens)
}

/// Splits a line-form invocation into its directives and the SQL after them.
///
/// Directives are read until the first chunk no rule accepts; that chunk
/// and everything after it is the SQL.
pub fn parse_line(text: &str) -> Result<(DirectiveSet, String)> {
    let mut cursor = Cursor::for_line(text);
    let mut tokens = Vec::new();

    let sql_start = loop {
        let before = cursor;
        let chunk = match cursor.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break text.len(),
            // Quoting the directive grammar can't balance belongs to the SQL.
            Err(_) => break before.content_start(),
        };
        match apply_rules(chunk, &mut cursor)? {
            Directive::Unrecognized(_) => break chunk.start,
            Directive::Show if show_begins_sql(cursor) => break chunk.start,
            directive => tokens.push(directive),
        }
    };

    let directives = DirectiveSet::from_tokens(tokens)?;
    Ok((directives, text[sql_start..].trim().to_string()))
}

/// True when the chunk after a line-form `SHOW` is neither a directive nor
/// the start of a statement, as in `SHOW search_path`.
fn show_begins_sql(cursor: Cursor<'_>) -> bool {
    let mut ahead = cursor;
    let next = match ahead.next_chunk() {
        Ok(Some(next)) => next,
        _ => return false,
    };
    if next.text.starts_with('(') || STATEMENT_KEYWORDS.iter().any(|word| next.is_keyword(word)) {
        return false;
    }
    matches!(apply_rules(next, &mut ahead), Ok(Directive::Unrecognized(_)))
}

fn arg_binding(text: &str) -> Option<Directive> {
    let (name, rhs) = text.split_once('=')?;
    if !is_identifier(name) || rhs.is_empty() || AssignForm::parse(rhs).is_some() {
        return None;
    }

    let value = if rhs.starts_with('\'') {
        match scan_quoted(rhs, '\'') {
            Some((literal, consumed)) if consumed == rhs.len() => ArgValue::Literal(literal),
            _ => return None,
        }
    } else if is_identifier(rhs) {
        ArgValue::Variable(rhs.to_string())
    } else {
        ArgValue::Number(parse_number(rhs)?)
    };

    Some(Directive::Arg {
        name: name.to_string(),
        value,
    })
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Int(i));
    }
    if text.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
        return text.parse::<f64>().ok().map(Value::Float);
    }
    None
}

fn session<'a>(chunk: Chunk<'a>, cursor: &mut Cursor<'a>) -> Result<Option<Directive>> {
    if !chunk.is_keyword("SESSION") {
        return Ok(None);
    }
    let missing = || NqlError::syntax("SESSION requires a session name");

    let mut name = cursor.next_chunk()?.ok_or_else(missing)?;
    if name.is_keyword("AS") {
        name = cursor.next_chunk()?.ok_or_else(missing)?;
    }
    if !is_identifier(name.text) {
        return Err(NqlError::syntax(format!(
            "invalid session name '{}'",
            name.text
        )));
    }
    Ok(Some(Directive::Session(name.text.to_string())))
}

fn relation<'a>(
    chunk: Chunk<'a>,
    cursor: &mut Cursor<'a>,
    keyword: &str,
) -> Result<Option<QualifiedName>> {
    if !chunk.is_keyword(keyword) {
        return Ok(None);
    }
    let name = cursor
        .next_chunk()?
        .ok_or_else(|| NqlError::syntax(format!("{keyword} requires a name")))?;

    if cursor.line_form
        && SQL_OBJECT_KEYWORDS
            .iter()
            .any(|word| name.text.eq_ignore_ascii_case(word))
    {
        return Ok(None);
    }

    QualifiedName::parse(name.text).map(Some).ok_or_else(|| {
        NqlError::syntax(format!("invalid name '{}' after {keyword}", name.text))
    })
}

fn csv<'a>(chunk: Chunk<'a>, cursor: &mut Cursor<'a>) -> Result<Option<Directive>> {
    if !chunk.is_keyword("CSV") {
        return Ok(None);
    }
    let path = cursor
        .next_chunk()?
        .ok_or_else(|| NqlError::syntax("CSV requires a file path"))?;

    let path = if path.text.starts_with('\'') {
        whole_quoted(path.text)
            .ok_or_else(|| NqlError::syntax(format!("invalid CSV path {}", path.text)))?
    } else {
        path.text.to_string()
    };
    Ok(Some(Directive::Csv(PathBuf::from(path))))
}

fn assign(text: &str) -> Option<Directive> {
    let (target, rhs) = text.split_once('=')?;
    if !is_identifier(target) {
        return None;
    }
    let form = AssignForm::parse(rhs)?;
    Some(Directive::Assign {
        form,
        target: target.to_string(),
    })
}

fn title<'a>(chunk: Chunk<'a>, cursor: &mut Cursor<'a>) -> Result<Option<Directive>> {
    if !chunk.is_keyword("TITLE") {
        return Ok(None);
    }
    let text = cursor
        .next_chunk()?
        .and_then(|c| whole_quoted(c.text))
        .ok_or_else(|| NqlError::syntax("TITLE requires single-quoted text"))?;

    let size = cursor
        .next_if(|word| word.parse::<u32>().is_ok())
        .and_then(|c| c.text.parse().ok());
    Ok(Some(Directive::Title { text, size }))
}

/// Content of a chunk that is exactly one single-quoted string.
fn whole_quoted(text: &str) -> Option<String> {
    match scan_quoted(text, '\'') {
        Some((content, consumed)) if consumed == text.len() => Some(content),
        _ => None,
    }
}
