mod api;
mod backup;
mod config;
mod db;
mod facade;
mod http;
mod models;
mod nav;
mod seed;
mod store;
mod util;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;

use crate::api::AppState;
use crate::config::{Cli, Command};
use crate::store::Store;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    // stdout carries protocol responses, so logs go to stderr.
    if std::env::var("LOG_FORMAT").unwrap_or_default() == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}

fn open_state(workspace: Option<&Path>, remember_sessions: bool) -> anyhow::Result<AppState> {
    let mut state = AppState::new(remember_sessions);
    if let Some(path) = workspace {
        state.store = Some(Store::open(path)?);
        state.workspace = Some(path.to_path_buf());
        tracing::info!(workspace = %path.display(), "workspace opened");
    }
    Ok(state)
}

fn run_stdio(mut state: AppState) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<api::Request>(&line) {
            Ok(req) => api::handle_request(&mut state, req),
            Err(e) => {
                tracing::debug!(error = %e, "unparseable request line");
                api::err(
                    &util::generate_request_id(),
                    "BAD_REQUEST",
                    format!("invalid request: {e}"),
                    None,
                )
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp)
                .unwrap_or_else(|_| "{\"success\":false,\"errorCode\":\"INTERNAL\"}".to_string())
        );
        let _ = stdout.flush();
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting homeworkd");

    match cli.command.unwrap_or(Command::Stdio) {
        Command::Stdio => {
            let state = open_state(cli.workspace.as_deref(), true)?;
            run_stdio(state);
        }
        Command::Serve { bind } => {
            let state = open_state(cli.workspace.as_deref(), false)?;
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            runtime.block_on(http::serve(Arc::new(Mutex::new(state)), &bind))?;
        }
        Command::Call { action, params } => {
            let params: serde_json::Value =
                serde_json::from_str(&params).context("--params must be a JSON object")?;
            let state = open_state(cli.workspace.as_deref(), false)?;
            let client = facade::Api::new(Arc::new(Mutex::new(state)), cli.api_url);
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            let resp = runtime.block_on(client.request(&action, params));
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
    }
    Ok(())
}
