//! The `nql` magic: runs directive + SQL blocks against sessions.
//!
//! Each block goes through the same steps: parse the directive, resolve the
//! session, bind arguments, render the template, then dispatch. Dispatch
//! either creates a table/view or exports CSV (no value), or runs the query
//! once and fans the frame out to every assign target, displaying it when
//! shown. A failing block never stops the blocks after it.

mod fanout;

pub use fanout::{assign_all, project};

use tracing::{debug, info, warn};

use crate::cell::{CellSplitter, RawBlock};
use crate::config::MagicConfig;
use crate::db::Value;
use crate::directive::{parse_directives, parse_line, ArgValue, AssignForm, DirectiveSet};
use crate::error::{NqlError, Result};
use crate::frame::Frame;
use crate::namespace::{Namespace, Variable};
use crate::output::OutputSink;
use crate::session::{activate_session, resolve_session, OutputMode, Session};
use crate::template::{RenderContext, RenderedSql};

/// Outcome of one block: a frame when the block shows its result.
pub type BlockResult = Result<Option<Frame>>;

/// The magic command.
#[derive(Debug, Clone)]
pub struct Nql {
    config: MagicConfig,
    splitter: CellSplitter,
}

impl Nql {
    pub fn new(config: MagicConfig) -> Result<Self> {
        let splitter = CellSplitter::new(&config.name)?;
        Ok(Self { config, splitter })
    }

    pub fn config(&self) -> &MagicConfig {
        &self.config
    }

    pub fn splitter(&self) -> &CellSplitter {
        &self.splitter
    }

    /// Runs the line form: directives followed by SQL on one line.
    ///
    /// Errors are returned, not reported to `out`. A line holding only
    /// `SESSION name` activates that session and returns no value.
    pub async fn run_line(
        &self,
        line: &str,
        namespace: &mut dyn Namespace,
        out: &mut dyn OutputSink,
    ) -> BlockResult {
        let (directives, sql) = parse_line(line)?;

        if sql.is_empty() {
            return match &directives.session {
                Some(name) if directives == session_only(name) => {
                    activate_session(namespace, name)?;
                    Ok(None)
                }
                _ => Err(NqlError::syntax("no SQL given")),
            };
        }

        self.execute_block(&directives, &sql, namespace, out).await
    }

    /// Runs the cell form and returns one result per block, in order.
    ///
    /// Failed blocks are reported to `out` as they happen.
    pub async fn run_cell(
        &self,
        directive_line: &str,
        body: &str,
        namespace: &mut dyn Namespace,
        out: &mut dyn OutputSink,
    ) -> Vec<BlockResult> {
        let blocks = self.splitter.split(directive_line, body);
        debug!("Cell split into {} blocks", blocks.len());

        let mut results = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let result = self.run_raw_block(block, namespace, out).await;
            if let Err(e) = &result {
                warn!("Block {} failed: {}", block.index + 1, e);
                out.report_error(Some(block.index), e);
            }
            results.push(result);
        }
        results
    }

    async fn run_raw_block(
        &self,
        block: &RawBlock,
        namespace: &mut dyn Namespace,
        out: &mut dyn OutputSink,
    ) -> BlockResult {
        let directives = parse_directives(&block.directive)?;
        if block.sql.is_empty() {
            return Err(NqlError::syntax(format!(
                "block {} has no SQL",
                block.index + 1
            )));
        }
        self.execute_block(&directives, &block.sql, namespace, out)
            .await
    }

    /// Runs one parsed block.
    pub async fn execute_block(
        &self,
        directives: &DirectiveSet,
        sql: &str,
        namespace: &mut dyn Namespace,
        out: &mut dyn OutputSink,
    ) -> BlockResult {
        let session = resolve_session(namespace, directives.session.as_deref())?;
        let rendered = render(&session, directives, sql, &*namespace)?;
        debug!(
            "Rendered SQL with {} parameters: {}",
            rendered.params.len(),
            rendered.sql
        );

        if directives.has_side_effect() {
            run_side_effects(&session, directives, &rendered, out).await?;
            return Ok(None);
        }

        if directives.assign_target(AssignForm::Sql).is_some() && !rendered.params.is_empty() {
            return Err(NqlError::syntax(
                "SQL assignment needs a query without bound parameters; use the `s` filter to inline values",
            ));
        }

        let needs_frame = directives.shows()
            || directives
                .assigns
                .iter()
                .any(|(form, _)| *form != AssignForm::Sql);
        if !needs_frame {
            assign_all(namespace, &directives.assigns, &Frame::new(), &rendered.sql);
            return Ok(None);
        }

        let frame = session
            .get_dataframe(&rendered.sql, &rendered.params)
            .await?;
        assign_all(namespace, &directives.assigns, &frame, &rendered.sql);

        if !directives.shows() {
            return Ok(None);
        }
        if session.output() == OutputMode::Display {
            if let Err(e) = out.show(directives.title.as_ref(), &frame) {
                warn!("Failed to display result: {}", e);
            }
        }
        Ok(Some(frame))
    }
}

fn session_only(name: &str) -> DirectiveSet {
    DirectiveSet {
        session: Some(name.to_string()),
        ..DirectiveSet::default()
    }
}

/// Binds the block's arguments over the namespace and renders the SQL.
fn render(
    session: &Session,
    directives: &DirectiveSet,
    sql: &str,
    namespace: &dyn Namespace,
) -> Result<RenderedSql> {
    let mut ctx = RenderContext::new(namespace);
    for (name, value) in &directives.args {
        ctx.bind(name.clone(), resolve_arg(value, namespace)?);
    }

    if directives.nojinja {
        return Ok(RenderedSql::verbatim(sql));
    }
    session.renderer().render(sql, &ctx)
}

fn resolve_arg(value: &ArgValue, namespace: &dyn Namespace) -> Result<Value> {
    match value {
        ArgValue::Literal(text) => Ok(Value::from(text.as_str())),
        ArgValue::Number(number) => Ok(number.clone()),
        ArgValue::Variable(name) => match namespace.get(name) {
            Some(Variable::Value(value)) => Ok(value.clone()),
            Some(other) => Err(NqlError::binding(format!(
                "'{name}' is a {}, not a value",
                other.kind()
            ))),
            None => Err(NqlError::binding(format!("undefined variable '{name}'"))),
        },
    }
}

async fn run_side_effects(
    session: &Session,
    directives: &DirectiveSet,
    rendered: &RenderedSql,
    out: &mut dyn OutputSink,
) -> Result<()> {
    if !directives.assigns.is_empty() || directives.show {
        warn!("Ignoring assign and SHOW directives in a block that creates or exports");
    }

    if let Some(name) = &directives.create_table {
        session
            .create_table(name, &rendered.sql, &rendered.params)
            .await?;
        out.status(&format!("Created table {name}"));
    }
    if let Some(name) = &directives.create_view {
        session
            .create_view(name, &rendered.sql, &rendered.params)
            .await?;
        out.status(&format!("Created view {name}"));
    }
    if let Some(path) = &directives.csv {
        let rows = session
            .export_csv(path, &rendered.sql, &rendered.params)
            .await?;
        info!("Wrote {} rows to {}", rows, path.display());
        out.status(&format!("Wrote {rows} rows to {}", path.display()));
    }
    Ok(())
}
