use serde_json::json;

use crate::api::error::ApiError;
use crate::api::helpers::{get_required_str, page_params, to_json};
use crate::api::session::require_user;
use crate::api::types::{AppState, Request};
use crate::models::Notification;
use crate::store::Store;
use crate::util::{generate_id, now_iso, paginate};

pub(crate) fn notify(
    store: &Store,
    user_id: &str,
    kind: &str,
    title: &str,
    message: impl Into<String>,
    target_id: Option<&str>,
) -> anyhow::Result<()> {
    store.insert(&Notification {
        id: generate_id(),
        user_id: user_id.to_string(),
        kind: kind.to_string(),
        title: title.to_string(),
        message: message.into(),
        target_id: target_id.map(str::to_string),
        created_at: now_iso(),
        read_at: None,
    })
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_user(store, req)?;
    let mut mine = store.filter(|n: &Notification| n.user_id == user.id)?;
    mine.reverse();
    mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let unread = mine.iter().filter(|n| n.read_at.is_none()).count();

    let (page, page_size) = page_params(req, 20);
    let mut resp = to_json(&paginate(mine, page, page_size))?;
    resp["unreadCount"] = json!(unread);
    Ok(resp)
}

fn handle_mark_read(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_user(store, req)?;
    let id = get_required_str(req, "notificationId")?;
    let notification = store
        .get::<Notification>(&id)?
        .ok_or_else(|| ApiError::not_found("notification"))?;
    if notification.user_id != user.id {
        return Err(ApiError::forbidden());
    }
    if notification.read_at.is_none() {
        store.update::<Notification>(&id, |n| n.read_at = Some(now_iso()))?;
    }
    Ok(serde_json::Value::Null)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "listNotifications" => Some(handle_list(state, req)),
        "markRead" => Some(handle_mark_read(state, req)),
        _ => None,
    }
}
