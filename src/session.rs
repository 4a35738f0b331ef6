//! Database sessions.
//!
//! A session pairs a database client with an optional schema and an output
//! mode. When several sessions are bound in the host namespace, the one with
//! the highest activation marker is used for directives that do not name one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::db::{self, DatabaseClient, QueryOutput, Value};
use crate::directive::QualifiedName;
use crate::error::{NqlError, Result};
use crate::export;
use crate::frame::Frame;
use crate::namespace::{Namespace, Variable};
use crate::template::{ParamStyle, TemplateRenderer};

/// Whether shown frames are rendered to the display or only returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Display,
    Return,
}

/// A handle on one database plus the context statements run in.
#[derive(Clone)]
pub struct Session {
    client: Arc<dyn DatabaseClient>,
    url: Option<String>,
    schema: Option<String>,
    output: OutputMode,
    activation: Option<u64>,
}

impl Session {
    /// Wraps an existing client with no schema and display output.
    pub fn new(client: Arc<dyn DatabaseClient>) -> Self {
        Self {
            client,
            url: None,
            schema: None,
            output: OutputMode::default(),
            activation: None,
        }
    }

    /// Connects using `config`, creating the configured schema if needed.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let display_url = db::redact_url(&config.url);
        info!("Connecting session to {}", display_url);

        let client = db::connect(&config.url).await?;
        if let Some(schema) = &config.schema {
            client.create_schema(schema, config.drop_schema).await?;
        }

        Ok(Self {
            client,
            url: Some(display_url),
            schema: config.schema.clone(),
            output: config.output,
            activation: None,
        })
    }

    /// Connects to `url` with no schema.
    pub async fn open(url: &str) -> Result<Self> {
        Self::connect(&SessionConfig::new(url)).await
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn output(&self) -> OutputMode {
        self.output
    }

    /// Redacted connection URL, when the session was opened from one.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn client(&self) -> &Arc<dyn DatabaseClient> {
        &self.client
    }

    /// Marker recorded by the last activation, if any.
    pub fn activation(&self) -> Option<u64> {
        self.activation
    }

    /// Records `marker` as this session's latest activation.
    pub fn activate(&mut self, marker: u64) {
        self.activation = Some(marker);
    }

    pub fn param_style(&self) -> ParamStyle {
        self.client.param_style()
    }

    /// Template renderer using this session's placeholder style.
    pub fn renderer(&self) -> TemplateRenderer {
        TemplateRenderer::new(self.param_style())
    }

    /// Runs one statement in its own transaction, scoped to the schema.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryOutput> {
        debug!("Executing SQL: {}", sql);
        self.client.execute(sql, params, self.schema()).await
    }

    /// Runs a statement and always returns a frame; statements without a
    /// result set give an empty one.
    pub async fn get_dataframe(&self, sql: &str, params: &[Value]) -> Result<Frame> {
        match self.execute(sql, params).await? {
            QueryOutput::Rows(frame) => Ok(frame),
            QueryOutput::Done { .. } => Ok(Frame::new()),
        }
    }

    /// Replaces table `name` with the result of `sql`.
    ///
    /// The old table is dropped first, so it is gone even if creation fails.
    pub async fn create_table(&self, name: &QualifiedName, sql: &str, params: &[Value]) -> Result<()> {
        self.replace_relation("TABLE", name, sql, params).await
    }

    /// Replaces view `name` with `sql`, with the same semantics as tables.
    pub async fn create_view(&self, name: &QualifiedName, sql: &str, params: &[Value]) -> Result<()> {
        self.replace_relation("VIEW", name, sql, params).await
    }

    async fn replace_relation(
        &self,
        kind: &str,
        name: &QualifiedName,
        sql: &str,
        params: &[Value],
    ) -> Result<()> {
        let target = name.to_sql();
        self.execute(&format!("DROP {kind} IF EXISTS {target}"), &[])
            .await?;
        self.execute(&format!("CREATE {kind} {target} AS {sql}"), params)
            .await?;
        info!("Created {} {}", kind.to_lowercase(), target);
        Ok(())
    }

    /// Writes the result of `sql` to a CSV file with a heading row.
    ///
    /// Returns the number of data rows written.
    pub async fn export_csv(&self, path: &Path, sql: &str, params: &[Value]) -> Result<usize> {
        let frame = self.get_dataframe(sql, params).await?;
        export::write_csv(&frame, path)?;
        info!("Exported {} rows to {}", frame.row_count(), path.display());
        Ok(frame.row_count())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.client.backend())
            .field("url", &self.url)
            .field("schema", &self.schema)
            .field("output", &self.output)
            .field("activation", &self.activation)
            .finish()
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.client) as *const (),
            Arc::as_ptr(&other.client) as *const (),
        ) && self.schema == other.schema
            && self.output == other.output
            && self.activation == other.activation
    }
}

/// Next activation marker: one past the highest marker in the namespace.
pub fn next_activation_marker(namespace: &dyn Namespace) -> u64 {
    namespace
        .sessions()
        .into_iter()
        .filter_map(|(_, session)| session.activation())
        .max()
        .map_or(1, |latest| latest + 1)
}

/// Activates the session bound to `name` and returns a handle to it.
pub fn activate_session(namespace: &mut dyn Namespace, name: &str) -> Result<Session> {
    let marker = next_activation_marker(namespace);
    match namespace.get_mut(name) {
        Some(Variable::Session(session)) => {
            session.activate(marker);
            info!("Activated session '{}'", name);
            Ok(session.clone())
        }
        Some(other) => Err(NqlError::binding(format!(
            "'{name}' is a {}, not a session",
            other.kind()
        ))),
        None => Err(NqlError::binding(format!("no session named '{name}'"))),
    }
}

/// Picks the session a block runs against.
///
/// An explicit name is activated and used. Otherwise the most recently
/// activated session wins; a lone session is used even if never activated.
pub fn resolve_session(namespace: &mut dyn Namespace, explicit: Option<&str>) -> Result<Session> {
    if let Some(name) = explicit {
        return activate_session(namespace, name);
    }

    let sessions = namespace.sessions();
    if let Some((name, session)) = sessions
        .iter()
        .filter(|(_, s)| s.activation().is_some())
        .max_by_key(|(_, s)| s.activation())
    {
        debug!("Using most recently activated session '{}'", name);
        return Ok((*session).clone());
    }

    match sessions.as_slice() {
        [] => Err(NqlError::config(
            "no session found; bind a Session in the namespace first",
        )),
        [(_, session)] => Ok((*session).clone()),
        several => {
            let names: Vec<&str> = several.iter().map(|(n, _)| *n).collect();
            Err(NqlError::config(format!(
                "several sessions ({}) and none activated; add SESSION <name> to the directive",
                names.join(", ")
            )))
        }
    }
}
