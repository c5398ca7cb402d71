use std::path::Path;

use serde_json::json;

use crate::api::audit;
use crate::api::error::ApiError;
use crate::api::helpers::{get_bool, get_query, get_required_str, get_str, page_params, to_json};
use crate::api::session::require_role;
use crate::api::types::{AppState, Request};
use crate::backup;
use crate::models::{Assignment, AuditLog, Class, Role, Submission, User};
use crate::util::{contains_ci, paginate};

const RECENT_LOGS: usize = 10;

fn safe_user(u: &User) -> serde_json::Value {
    json!({
        "id": u.id,
        "name": u.name,
        "email": u.email,
        "role": u.role,
        "isActive": u.is_active,
        "createdAt": u.created_at,
    })
}

fn handle_list_users(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    require_role(store, req, &[Role::Admin])?;
    let query = get_query(req);
    let role_filter = match get_str(req, "roleFilter") {
        Some(raw) => Some(Role::parse(&raw).ok_or_else(|| ApiError::BadParams(format!("unknown role: {raw}")))?),
        None => None,
    };

    let users: Vec<serde_json::Value> = store
        .all::<User>()?
        .iter()
        .filter(|u| {
            query
                .as_deref()
                .map_or(true, |q| contains_ci(&u.name, q) || contains_ci(&u.email, q))
        })
        .filter(|u| role_filter.map_or(true, |r| u.role == r))
        .map(safe_user)
        .collect();
    let (page, page_size) = page_params(req, 20);
    to_json(&paginate(users, page, page_size))
}

fn handle_update_user(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let admin = require_role(store, req, &[Role::Admin])?;
    let user_id = get_required_str(req, "userId")?;
    let name = get_str(req, "name").map(|n| n.trim().to_string());
    let role = match get_str(req, "role") {
        Some(raw) => Some(Role::parse(&raw).ok_or_else(|| ApiError::BadParams(format!("unknown role: {raw}")))?),
        None => None,
    };
    let is_active = get_bool(req, "isActive");
    if user_id == admin.id && is_active == Some(false) {
        return Err(ApiError::BadParams("you cannot deactivate your own account".into()));
    }

    let updated = store
        .update::<User>(&user_id, |u| {
            if let Some(name) = name {
                u.name = name;
            }
            if let Some(role) = role {
                u.role = role;
            }
            if let Some(active) = is_active {
                u.is_active = active;
            }
        })?
        .ok_or_else(|| ApiError::not_found("user"))?;

    let mut changes = Vec::new();
    if role.is_some() {
        changes.push(format!("role={}", updated.role.as_str()));
    }
    if let Some(active) = is_active {
        changes.push(format!("isActive={active}"));
    }
    audit::record(store, &admin, "user.update", "user", &updated.id, changes.join(" "))?;
    Ok(safe_user(&updated))
}

fn handle_audit_logs(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    require_role(store, req, &[Role::Admin])?;
    let mut logs = store.all::<AuditLog>()?;
    logs.reverse();
    logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let (page, page_size) = page_params(req, 50);
    to_json(&paginate(logs, page, page_size))
}

fn handle_dashboard_stats(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    require_role(store, req, &[Role::Admin])?;
    let users = store.filter(|u: &User| u.is_active)?;
    let count_role = |role: Role| users.iter().filter(|u| u.role == role).count();

    let mut logs = store.all::<AuditLog>()?;
    logs.reverse();
    logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    logs.truncate(RECENT_LOGS);

    Ok(json!({
        "stats": {
            "totalUsers": users.len(),
            "teachers": count_role(Role::Teacher),
            "students": count_role(Role::Student),
            "parents": count_role(Role::Parent),
            "classes": store.filter(|c: &Class| c.is_active)?.len(),
            "assignments": store.filter(|a: &Assignment| a.is_active)?.len(),
            "submissions": store.all::<Submission>()?.len(),
        },
        "recentLogs": logs,
    }))
}

fn handle_backup(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    require_role(store, req, &[Role::Admin])?;
    Ok(store.snapshot()?)
}

fn restore_snapshot(state: &mut AppState, admin: &User, snapshot: &serde_json::Value, source: &str) -> Result<serde_json::Value, ApiError> {
    let store = state.store_mut()?;
    let summary = store
        .restore(snapshot)
        .map_err(|e| ApiError::BadParams(format!("invalid snapshot: {e:#}")))?;
    audit::record(
        store,
        admin,
        "data.restore",
        "store",
        source,
        format!("{} collections, {} records", summary.collections, summary.records),
    )?;
    tracing::info!(collections = summary.collections, records = summary.records, "store restored");
    Ok(json!({ "collections": summary.collections, "records": summary.records }))
}

fn handle_restore(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let admin = require_role(state.store()?, req, &[Role::Admin])?;
    let snapshot = req
        .params
        .get("data")
        .filter(|v| v.is_object())
        .cloned()
        .ok_or_else(|| ApiError::BadParams("data must be a snapshot object".into()))?;
    restore_snapshot(state, &admin, &snapshot, "backupData")
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let admin = require_role(store, req, &[Role::Admin])?;
    let out_path = get_required_str(req, "path")?;
    let summary = backup::export_snapshot_bundle(&store.snapshot()?, Path::new(&out_path))?;
    audit::record(store, &admin, "data.export", "bundle", &out_path, &summary.checksum)?;
    Ok(json!({
        "path": out_path,
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "checksum": summary.checksum,
    }))
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let admin = require_role(state.store()?, req, &[Role::Admin])?;
    let in_path = get_required_str(req, "path")?;
    let (snapshot, summary) = backup::import_snapshot_bundle(Path::new(&in_path))
        .map_err(|e| ApiError::BadParams(format!("invalid backup bundle: {e:#}")))?;
    let mut resp = restore_snapshot(state, &admin, &snapshot, &in_path)?;
    resp["bundleFormatDetected"] = json!(summary.bundle_format_detected);
    Ok(resp)
}

fn handle_reset(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let admin = require_role(state.store()?, req, &[Role::Admin])?;
    let store = state.store_mut()?;
    store.reset()?;
    audit::record(store, &admin, "data.reset", "store", "demo", "reseeded demo data")?;
    state.remembered_token = None;
    tracing::info!(user_id = %admin.id, "demo data reset");
    Ok(serde_json::Value::Null)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "listUsers" => Some(handle_list_users(state, req)),
        "updateUser" => Some(handle_update_user(state, req)),
        "getAuditLogs" => Some(handle_audit_logs(state, req)),
        "adminGetDashboardStats" => Some(handle_dashboard_stats(state, req)),
        "backupData" => Some(handle_backup(state, req)),
        "restoreData" => Some(handle_restore(state, req)),
        "exportBackupBundle" => Some(handle_export_bundle(state, req)),
        "importBackupBundle" => Some(handle_import_bundle(state, req)),
        "resetDemoData" => Some(handle_reset(state, req)),
        _ => None,
    }
}
