//! Expression parsing for `{{ ... }}` template tags.
//!
//! Grammar:
//!
//! ```text
//! expression := operand ( '|' filter )*
//! operand    := path | string | number
//! path       := ident ( '.' ident | '[' integer ']' | '[' string ']' )*
//! filter     := ident
//! ```

use crate::db::Value;
use crate::error::{NqlError, Result};

/// A parsed template expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub operand: Operand,
    pub filters: Vec<Filter>,
}

/// What an expression evaluates before filters are applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Variable lookup with optional member/index access.
    Path {
        root: String,
        segments: Vec<Segment>,
    },
    /// String or number literal.
    Literal(Value),
}

/// One step of a variable path.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Key(String),
    Index(i64),
}

/// Filters applied with `| name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// `s` / `safe`: interpolate the value as literal SQL text.
    Safe,
    /// `i` / `identifier`: interpolate as a double-quoted identifier.
    Identifier,
    /// `inclause`: expand a list into `(p1, p2, ...)` with one parameter each.
    InClause,
}

impl Filter {
    /// Looks up a filter by name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "s" | "safe" | "sqlsafe" => Some(Self::Safe),
            "i" | "identifier" | "ident" => Some(Self::Identifier),
            "inclause" => Some(Self::InClause),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Safe => "s",
            Self::Identifier => "i",
            Self::InClause => "inclause",
        }
    }
}

/// Scans a quoted run starting at `src[0] == quote`, where a doubled quote
/// stands for one literal quote.
///
/// Returns the unescaped content and the number of bytes consumed, including
/// both delimiters. Returns `None` when the run is not terminated.
pub fn scan_quoted(src: &str, quote: char) -> Option<(String, usize)> {
    let mut chars = src.char_indices().peekable();
    match chars.next() {
        Some((_, c)) if c == quote => {}
        _ => return None,
    }

    let mut content = String::new();
    while let Some((i, c)) = chars.next() {
        if c != quote {
            content.push(c);
            continue;
        }
        if let Some(&(_, next)) = chars.peek() {
            if next == quote {
                chars.next();
                content.push(quote);
                continue;
            }
        }
        return Some((content, i + c.len_utf8()));
    }
    None
}

/// Parses the expression following a `{{`, up to and including the closing
/// `}}`. Returns the expression and the number of bytes consumed.
pub fn parse_expression(src: &str) -> Result<(Expression, usize)> {
    let mut parser = ExprParser { src, pos: 0 };
    let operand = parser.operand()?;

    let mut filters = Vec::new();
    loop {
        parser.skip_whitespace();
        if parser.eat("}}") {
            return Ok((Expression { operand, filters }, parser.pos));
        }
        if !parser.eat("|") {
            return Err(parser.unexpected());
        }
        parser.skip_whitespace();
        let name = parser
            .ident()
            .ok_or_else(|| NqlError::syntax("expected a filter name after '|'"))?;
        let filter = Filter::parse(&name)
            .ok_or_else(|| NqlError::syntax(format!("unknown template filter '{name}'")))?;
        filters.push(filter);
    }
}

struct ExprParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> NqlError {
        if self.rest().is_empty() {
            NqlError::syntax("unterminated template tag: missing '}}'")
        } else {
            let snippet: String = self.rest().chars().take(20).collect();
            NqlError::syntax(format!("unexpected '{snippet}' in template tag"))
        }
    }

    fn ident(&mut self) -> Option<String> {
        let rest = self.rest();
        let mut end = 0;
        for (i, c) in rest.char_indices() {
            let valid = if i == 0 {
                c.is_alphabetic() || c == '_'
            } else {
                c.is_alphanumeric() || c == '_'
            };
            if !valid {
                break;
            }
            end = i + c.len_utf8();
        }
        if end == 0 {
            return None;
        }
        self.pos += end;
        Some(rest[..end].to_string())
    }

    fn string(&mut self) -> Result<String> {
        let (content, consumed) = scan_quoted(self.rest(), '\'')
            .ok_or_else(|| NqlError::syntax("unterminated string literal in template tag"))?;
        self.pos += consumed;
        Ok(content)
    }

    fn number(&mut self) -> Result<Value> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && c == '-')))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let text = &rest[..end];
        let value = if let Ok(i) = text.parse::<i64>() {
            Value::Int(i)
        } else if let Ok(f) = text.parse::<f64>() {
            Value::Float(f)
        } else {
            return Err(NqlError::syntax(format!(
                "invalid number '{text}' in template tag"
            )));
        };
        self.pos += end;
        Ok(value)
    }

    fn operand(&mut self) -> Result<Operand> {
        self.skip_whitespace();
        match self.peek() {
            Some('\'') => Ok(Operand::Literal(Value::String(self.string()?))),
            Some(c) if c.is_ascii_digit() || c == '-' => Ok(Operand::Literal(self.number()?)),
            Some(_) => {
                let root = self.ident().ok_or_else(|| self.unexpected())?;
                let segments = self.segments()?;
                Ok(Operand::Path { root, segments })
            }
            None => Err(NqlError::syntax("unterminated template tag: missing '}}'")),
        }
    }

    fn segments(&mut self) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();
        loop {
            if self.eat(".") {
                let key = self
                    .ident()
                    .ok_or_else(|| NqlError::syntax("expected a name after '.'"))?;
                segments.push(Segment::Key(key));
            } else if self.eat("[") {
                self.skip_whitespace();
                let segment = match self.peek() {
                    Some('\'') => Segment::Key(self.string()?),
                    _ => match self.number()? {
                        Value::Int(i) => Segment::Index(i),
                        _ => return Err(NqlError::syntax("list index must be an integer")),
                    },
                };
                self.skip_whitespace();
                if !self.eat("]") {
                    return Err(NqlError::syntax("expected ']' in template tag"));
                }
                segments.push(segment);
            } else {
                return Ok(segments);
            }
        }
    }
}
