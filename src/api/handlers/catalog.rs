use crate::api::audit;
use crate::api::error::ApiError;
use crate::api::helpers::{
    get_bool, get_present_str, get_query, get_required_str, get_str, page_params, to_json,
};
use crate::api::session::require_role;
use crate::api::types::{AppState, Request};
use crate::models::{Role, SubjectCatalogEntry};
use crate::util::{generate_id, now_iso, paginate};

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    require_role(store, req, &[Role::Admin])?;

    let mut entries = store.filter(|c: &SubjectCatalogEntry| c.is_active)?;
    if let Some(q) = get_query(req) {
        entries.retain(|c| {
            c.subject_code.to_lowercase().contains(&q) || c.subject_name.to_lowercase().contains(&q)
        });
    }
    if let Some(group) = get_str(req, "levelGroup") {
        entries.retain(|c| c.level_group == group);
    }
    if let Some(category) = get_str(req, "category") {
        entries.retain(|c| c.category == category);
    }
    if get_str(req, "sort").as_deref() == Some("code") {
        entries.sort_by(|a, b| a.subject_code.cmp(&b.subject_code));
    } else {
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    let (page, page_size) = page_params(req, 20);
    to_json(&paginate(entries, page, page_size))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let admin = require_role(store, req, &[Role::Admin])?;
    let (Some(code), Some(name)) = (get_str(req, "subjectCode"), get_str(req, "subjectName")) else {
        return Err(ApiError::BadParams("subjectCode and subjectName are required".into()));
    };
    let code = code.trim().to_string();

    if !store.is_unique(|c: &SubjectCatalogEntry| c.subject_code == code, None)? {
        return Err(ApiError::Conflict(format!("subject code {code} already exists")));
    }

    let entry = SubjectCatalogEntry {
        id: generate_id(),
        subject_code: code,
        subject_name: name.trim().to_string(),
        level_group: get_str(req, "levelGroup").unwrap_or_default(),
        category: get_str(req, "category").unwrap_or_else(|| "Other".to_string()),
        created_at: now_iso(),
        is_active: true,
    };
    store.insert(&entry)?;
    audit::record(store, &admin, "catalog.create", "subject_catalog", &entry.id, &entry.subject_code)?;
    to_json(&entry)
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let admin = require_role(store, req, &[Role::Admin])?;
    let catalog_id = get_required_str(req, "catalogId")?;
    let mut entry = store
        .get::<SubjectCatalogEntry>(&catalog_id)?
        .ok_or_else(|| ApiError::not_found("catalog entry"))?;

    if let Some(code) = get_str(req, "subjectCode") {
        entry.subject_code = code.trim().to_string();
    }
    if let Some(name) = get_str(req, "subjectName") {
        entry.subject_name = name.trim().to_string();
    }
    if let Some(group) = get_present_str(req, "levelGroup") {
        entry.level_group = group;
    }
    if let Some(category) = get_present_str(req, "category") {
        entry.category = category;
    }
    if let Some(active) = get_bool(req, "isActive") {
        entry.is_active = active;
    }

    // Checked against the final state so reactivation cannot revive a taken code.
    if entry.is_active {
        let unique = store.is_unique(
            |c: &SubjectCatalogEntry| c.subject_code == entry.subject_code,
            Some(catalog_id.as_str()),
        )?;
        if !unique {
            return Err(ApiError::Conflict(format!(
                "subject code {} already exists",
                entry.subject_code
            )));
        }
    }

    let updated = store
        .update::<SubjectCatalogEntry>(&catalog_id, |c| *c = entry)?
        .ok_or_else(|| ApiError::not_found("catalog entry"))?;
    audit::record(store, &admin, "catalog.update", "subject_catalog", &updated.id, &updated.subject_code)?;
    to_json(&updated)
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let admin = require_role(store, req, &[Role::Admin])?;
    let catalog_id = get_required_str(req, "catalogId")?;
    let entry = store
        .soft_delete::<SubjectCatalogEntry>(&catalog_id)?
        .ok_or_else(|| ApiError::not_found("catalog entry"))?;
    audit::record(store, &admin, "catalog.delete", "subject_catalog", &entry.id, &entry.subject_code)?;
    Ok(serde_json::Value::Null)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "listSubjectCatalog" => Some(handle_list(state, req)),
        "createSubjectCatalog" => Some(handle_create(state, req)),
        "updateSubjectCatalog" => Some(handle_update(state, req)),
        "deleteSubjectCatalog" => Some(handle_delete(state, req)),
        _ => None,
    }
}
