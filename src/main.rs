//! nql - runs parameterized SQL blocks from a script file.

mod cli;

use anyhow::{Context, Result};
use cli::{Cli, DEFAULT_SESSION};
use noteql::config::Config;
use noteql::db::Value;
use noteql::logging;
use noteql::magic::Nql;
use noteql::namespace::{Namespace, Variables};
use noteql::output::TextOutput;
use noteql::session::{activate_session, Session};
use std::io::Read;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let env_loaded = dotenvy::dotenv().is_ok();
    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => logging::init_file_logging(path),
        None => logging::init_stderr_logging(),
    }
    if env_loaded {
        info!("Loaded environment from .env");
    }

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Runs the script; returns false when any block failed.
async fn run(cli: Cli) -> Result<bool> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    if let Some(rows) = cli.preview_rows {
        config.magic.preview_rows = rows;
    }

    let mut vars = Variables::new();
    open_sessions(&cli, &config, &mut vars).await?;
    for (name, value) in &cli.vars {
        vars.insert(name.clone(), Value::from(value.as_str()));
    }
    if let Some(name) = &cli.session {
        activate_session(&mut vars, name)?;
    }

    let script = read_script(&cli)?;
    let nql = Nql::new(config.magic.clone())?;
    let (directive_line, body) = nql.splitter().split_leading(&script);

    let stdout = std::io::stdout();
    let mut out = TextOutput::new(stdout.lock(), config.magic.preview_rows);
    let results = nql
        .run_cell(directive_line, body, &mut vars, &mut out)
        .await;
    drop(out);

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        warn!("{} of {} blocks failed", failed, results.len());
    }

    if cli.dump_vars {
        let json = serde_json::to_string_pretty(&vars.snapshot())
            .context("Failed to serialize variables")?;
        println!("{json}");
    }

    for (name, session) in vars.sessions() {
        if let Err(e) = session.client().close().await {
            warn!("Failed to close session '{}': {}", name, e);
        }
    }

    Ok(failed == 0)
}

/// Connects every configured session, plus the one given by `--url` or
/// the environment.
async fn open_sessions(cli: &Cli, config: &Config, vars: &mut Variables) -> Result<()> {
    for (name, session_config) in &config.sessions {
        info!("Session '{}': {}", name, session_config.display_string());
        let session = Session::connect(session_config)
            .await
            .with_context(|| format!("Failed to open session '{name}'"))?;
        vars.insert(name.clone(), session);
    }

    let default = cli.session_config().or_else(|| {
        config
            .sessions
            .is_empty()
            .then(noteql::config::SessionConfig::from_env)
            .flatten()
    });
    if let Some(session_config) = default {
        info!(
            "Session '{}': {}",
            DEFAULT_SESSION,
            session_config.display_string()
        );
        let session = Session::connect(&session_config)
            .await
            .context("Failed to open the default session")?;
        vars.insert(DEFAULT_SESSION, session);
    }

    if vars.sessions().is_empty() {
        warn!("No session configured; use --url, DATABASE_URL or a [sessions] table in the config");
    }
    Ok(())
}

fn read_script(cli: &Cli) -> Result<String> {
    match &cli.script {
        Some(path) if !cli.reads_stdin() => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display())),
        _ => {
            let mut script = String::new();
            std::io::stdin()
                .read_to_string(&mut script)
                .context("Failed to read script from stdin")?;
            Ok(script)
        }
    }
}
