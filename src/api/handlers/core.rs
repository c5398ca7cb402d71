use serde_json::json;
use std::path::PathBuf;

use crate::api::error::ApiError;
use crate::api::helpers::get_required_str;
use crate::api::types::{AppState, Request};
use crate::models::Mode;
use crate::store::Store;

fn handle_health(state: &mut AppState) -> Result<serde_json::Value, ApiError> {
    let mode = match state.store.as_ref() {
        Some(store) => store.mode()?,
        None => Mode::Demo,
    };
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "mode": mode,
    }))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let path = PathBuf::from(get_required_str(req, "path")?);
    let store = Store::open(&path)?;
    tracing::info!(workspace = %path.display(), "workspace opened");
    state.workspace = Some(path.clone());
    state.store = Some(store);
    state.remembered_token = None;
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

fn handle_get_mode(state: &mut AppState) -> Result<serde_json::Value, ApiError> {
    Ok(json!({ "mode": state.store()?.mode()? }))
}

fn handle_set_mode(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let raw = get_required_str(req, "mode")?;
    let mode = Mode::parse(&raw)
        .ok_or_else(|| ApiError::BadParams(format!("mode must be demo or api, got {raw}")))?;
    state.store()?.set_mode(mode)?;
    tracing::info!(mode = mode.as_str(), "mode changed");
    Ok(json!({ "mode": mode }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "health" => Some(handle_health(state)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "getMode" => Some(handle_get_mode(state)),
        "setMode" => Some(handle_set_mode(state, req)),
        _ => None,
    }
}
