use serde_json::json;

use crate::api::error::ApiError;
use crate::api::handlers::grading::student_grade_rows;
use crate::api::helpers::{enrich, get_required_str};
use crate::api::scope::{is_linked_parent, student_classes};
use crate::api::session::require_role;
use crate::api::types::{AppState, Request};
use crate::models::{ParentLink, Role, User};
use crate::util::{generate_id, link_code_for, now_iso};

const DEFAULT_RELATION: &str = "Guardian";

fn handle_link_code(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Student])?;
    Ok(json!({ "linkCode": link_code_for(&user.id) }))
}

fn handle_link(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Parent])?;
    let code = get_required_str(req, "linkCode")?.trim().to_uppercase();
    let student = store
        .find(|u: &User| u.role == Role::Student && u.is_active && link_code_for(&u.id) == code)?
        .ok_or_else(|| ApiError::NotFound("no student matches this link code".into()))?;
    if is_linked_parent(store, &user.id, &student.id)? {
        return Err(ApiError::Conflict("already linked to this student".into()));
    }

    let link = ParentLink {
        id: generate_id(),
        parent_id: user.id.clone(),
        student_id: student.id.clone(),
        relation: DEFAULT_RELATION.to_string(),
        created_at: now_iso(),
        is_active: true,
    };
    store.insert(&link)?;
    tracing::info!(parent_id = %user.id, student_id = %student.id, "parent linked");
    enrich(&link, json!({ "student": student.summary() }))
}

fn handle_unlink(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Parent])?;
    let student_id = get_required_str(req, "studentId")?;
    let link = store
        .find(|p: &ParentLink| p.parent_id == user.id && p.student_id == student_id && p.is_active)?
        .ok_or_else(|| ApiError::not_found("link"))?;
    store.soft_delete::<ParentLink>(&link.id)?;
    tracing::info!(parent_id = %user.id, student_id = %student_id, "parent unlinked");
    Ok(serde_json::Value::Null)
}

fn handle_linked_students(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Parent])?;
    let links = store.filter(|p: &ParentLink| p.parent_id == user.id && p.is_active)?;
    let mut out = Vec::new();
    for link in links {
        let Some(student) = store.get::<User>(&link.student_id)?.filter(|u| u.is_active) else {
            continue;
        };
        let classes: Vec<_> = student_classes(store, &student)?
            .into_iter()
            .map(|c| json!({ "id": c.id, "name": c.name }))
            .collect();
        let mut row = student.summary();
        row["relation"] = json!(link.relation);
        row["classes"] = json!(classes);
        out.push(row);
    }
    Ok(serde_json::Value::Array(out))
}

fn handle_parent_grades(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Parent])?;
    let student_id = get_required_str(req, "studentId")?;
    if !is_linked_parent(store, &user.id, &student_id)? {
        return Err(ApiError::Forbidden("not linked to this student".into()));
    }
    Ok(serde_json::Value::Array(student_grade_rows(store, &student_id)?))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "getLinkCode" => Some(handle_link_code(state, req)),
        "parentLink" => Some(handle_link(state, req)),
        "parentUnlink" => Some(handle_unlink(state, req)),
        "getLinkedStudents" => Some(handle_linked_students(state, req)),
        "parentGetGrades" => Some(handle_parent_grades(state, req)),
        _ => None,
    }
}
