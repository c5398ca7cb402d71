use serde_json::json;

use crate::api::error::ApiError;
use crate::api::helpers::{get_str, to_json};
use crate::api::session::current_user;
use crate::api::types::{AppState, Request};
use crate::nav;

fn handle_resolve_route(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let user = current_user(state.store()?, req)?;
    let path = get_str(req, "path").unwrap_or_else(|| "/".to_string());
    let outcome = nav::resolve(&path, user.as_ref().map(|u| u.role));
    to_json(&outcome)
}

fn handle_nav_items(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let user = current_user(state.store()?, req)?;
    let role = user.as_ref().map(|u| u.role);
    Ok(json!({
        "home": nav::home_for(role),
        "items": nav::nav_items(role),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "resolveRoute" => Some(handle_resolve_route(state, req)),
        "navItems" => Some(handle_nav_items(state, req)),
        _ => None,
    }
}
