//! SQL templating.
//!
//! Renders `{{ expression | filter }}` tags against the host variables.
//! Plain interpolation becomes a bound parameter in the placeholder style of
//! the target backend; only the `s` and `i` filters splice text into the SQL.

mod expr;

pub use expr::{parse_expression, scan_quoted, Expression, Filter, Operand, Segment};

use std::collections::HashMap;
use tracing::debug;

use crate::db::Value;
use crate::error::{NqlError, Result};
use crate::namespace::{Namespace, Variable};

/// Placeholder convention for bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamStyle {
    /// `$1`, `$2`, ... (PostgreSQL).
    Dollar,
    /// `?` (SQLite).
    QMark,
    /// `:p1`, `:p2`, ...
    Named,
    /// `%s` (format style drivers).
    Format,
}

impl ParamStyle {
    /// Placeholder text for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::Dollar => format!("${index}"),
            Self::QMark => "?".to_string(),
            Self::Named => format!(":p{index}"),
            Self::Format => "%s".to_string(),
        }
    }
}

/// Rendered SQL text plus its positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedSql {
    pub sql: String,
    pub params: Vec<Value>,
}

impl RenderedSql {
    /// SQL used as-is, with no parameters (`NOJINJA`).
    pub fn verbatim(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Variables visible to a template: the host namespace with the block's
/// argument bindings layered on top. The namespace itself is never written.
pub struct RenderContext<'a> {
    namespace: &'a dyn Namespace,
    overrides: HashMap<String, Variable>,
}

impl<'a> RenderContext<'a> {
    pub fn new(namespace: &'a dyn Namespace) -> Self {
        Self {
            namespace,
            overrides: HashMap::new(),
        }
    }

    /// Binds `name` for this render only, shadowing any host variable.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.overrides.insert(name.into(), Variable::Value(value));
    }

    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.overrides
            .get(name)
            .or_else(|| self.namespace.get(name))
    }
}

/// Output of one tag once its filters have run.
#[derive(Debug, Clone, PartialEq)]
enum Fragment {
    Param(Value),
    Literal(String),
    InClause(Vec<Value>),
}

/// Renders SQL templates for one placeholder style.
#[derive(Debug, Clone, Copy)]
pub struct TemplateRenderer {
    style: ParamStyle,
}

impl TemplateRenderer {
    pub fn new(style: ParamStyle) -> Self {
        Self { style }
    }

    /// Renders `template`, turning each tag into text or bound parameters.
    pub fn render(&self, template: &str, ctx: &RenderContext<'_>) -> Result<RenderedSql> {
        let mut sql = String::with_capacity(template.len());
        let mut params = Vec::new();
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            sql.push_str(&rest[..start]);
            let (expression, consumed) = parse_expression(&rest[start + 2..])?;
            let fragment = evaluate(&expression, ctx)?;
            self.emit(fragment, &mut sql, &mut params);
            rest = &rest[start + 2 + consumed..];
        }
        sql.push_str(rest);

        debug!("Rendered SQL with {} parameter(s)", params.len());
        Ok(RenderedSql { sql, params })
    }

    fn emit(&self, fragment: Fragment, sql: &mut String, params: &mut Vec<Value>) {
        match fragment {
            Fragment::Param(value) => sql.push_str(&self.placeholder(value, params)),
            Fragment::Literal(text) => sql.push_str(&text),
            Fragment::InClause(values) if values.is_empty() => sql.push_str("(NULL)"),
            Fragment::InClause(values) => {
                let placeholders: Vec<String> = values
                    .into_iter()
                    .map(|value| self.placeholder(value, params))
                    .collect();
                sql.push('(');
                sql.push_str(&placeholders.join(", "));
                sql.push(')');
            }
        }
    }

    /// Placeholder for one bound value. NULL is written inline so it takes
    /// the type of whatever it is compared with.
    fn placeholder(&self, value: Value, params: &mut Vec<Value>) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        params.push(value);
        self.style.placeholder(params.len())
    }
}

fn evaluate(expression: &Expression, ctx: &RenderContext<'_>) -> Result<Fragment> {
    let value = match &expression.operand {
        Operand::Literal(value) => value.clone(),
        Operand::Path { root, segments } => resolve_path(root, segments, ctx)?,
    };

    let mut fragment = Fragment::Param(value);
    for filter in &expression.filters {
        fragment = apply_filter(*filter, fragment)?;
    }
    Ok(fragment)
}

fn resolve_path(root: &str, segments: &[Segment], ctx: &RenderContext<'_>) -> Result<Value> {
    let mut current = match ctx.lookup(root) {
        Some(Variable::Value(value)) => value,
        Some(other) => {
            return Err(NqlError::binding(format!(
                "'{root}' is a {} and cannot be used in SQL",
                other.kind()
            )))
        }
        None => {
            return Err(NqlError::binding(format!(
                "undefined variable '{root}' in template"
            )))
        }
    };

    for segment in segments {
        current = match (segment, current) {
            (Segment::Key(key), Value::Record(record)) => record.get(key).ok_or_else(|| {
                NqlError::binding(format!("'{root}' has no field '{key}'"))
            })?,
            (Segment::Index(index), Value::List(items)) => {
                let len = items.len() as i64;
                let position = if *index < 0 { len + index } else { *index };
                usize::try_from(position)
                    .ok()
                    .and_then(|i| items.get(i))
                    .ok_or_else(|| {
                        NqlError::binding(format!("index {index} out of range for '{root}'"))
                    })?
            }
            (_, other) => {
                return Err(NqlError::binding(format!(
                    "cannot index into a {} value in '{root}'",
                    other.type_name()
                )))
            }
        };
    }

    Ok(current.clone())
}

fn apply_filter(filter: Filter, fragment: Fragment) -> Result<Fragment> {
    match (filter, fragment) {
        (Filter::Safe, Fragment::Param(value)) => Ok(Fragment::Literal(literal_text(&value))),
        (Filter::Safe, literal @ Fragment::Literal(_)) => Ok(literal),
        (Filter::Identifier, Fragment::Param(value)) => {
            Ok(Fragment::Literal(identifier_text(&value)))
        }
        (Filter::Identifier, Fragment::Literal(text)) => {
            Ok(Fragment::Literal(quote_identifier(&text)))
        }
        (Filter::InClause, Fragment::Param(Value::List(items))) => Ok(Fragment::InClause(items)),
        (Filter::InClause, Fragment::Param(other)) => Err(NqlError::binding(format!(
            "inclause expects a list, got a {} value",
            other.type_name()
        ))),
        (filter, _) => Err(NqlError::syntax(format!(
            "filter '{}' cannot be applied after an in-clause expansion",
            filter.name()
        ))),
    }
}

fn literal_text(value: &Value) -> String {
    match value {
        Value::List(items) => items
            .iter()
            .map(Value::to_display_string)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_display_string(),
    }
}

fn identifier_text(value: &Value) -> String {
    match value {
        Value::List(parts) => parts
            .iter()
            .map(|part| quote_identifier(&part.to_display_string()))
            .collect::<Vec<_>>()
            .join("."),
        other => quote_identifier(&other.to_display_string()),
    }
}

/// Wraps `name` in double quotes, doubling any embedded double quote.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Inverse of [`quote_identifier`]: returns `None` unless `quoted` is exactly
/// one well-formed double-quoted identifier.
pub fn parse_identifier(quoted: &str) -> Option<String> {
    match scan_quoted(quoted, '"') {
        Some((name, consumed)) if consumed == quoted.len() => Some(name),
        _ => None,
    }
}
