use serde_json::json;

use crate::api::error::ApiError;
use crate::api::helpers::{
    enrich, get_array, get_bool, get_f64, get_present_str, get_query, get_required_str, get_str,
    page_params, to_json,
};
use crate::api::scope::{
    assignment_class_id, enrolled_class_ids, require_assignment_owner, student_classes,
    subject_name, TeacherScope,
};
use crate::api::session::{require_role, require_user};
use crate::api::types::{AppState, Request};
use crate::models::{Assignment, ClassSubject, ParentLink, Role, Subject, Submission, SubmissionStatus, User};
use crate::store::Store;
use crate::util::{generate_id, now_iso, paginate, parse_timestamp};

const DEFAULT_MAX_SCORE: f64 = 10.0;

fn max_score_param(req: &Request) -> Result<Option<f64>, ApiError> {
    match get_f64(req, "maxScore") {
        Some(v) if v.is_finite() && v > 0.0 => Ok(Some(v)),
        Some(v) => Err(ApiError::Invalid {
            message: "maxScore must be greater than zero".into(),
            details: json!({ "maxScore": v }),
        }),
        None => Ok(None),
    }
}

fn due_date_param(req: &Request, required: bool) -> Result<Option<String>, ApiError> {
    let Some(due) = get_str(req, "dueDate") else {
        return if required {
            Err(ApiError::BadParams("missing dueDate".into()))
        } else {
            Ok(None)
        };
    };
    if parse_timestamp(&due).is_none() {
        return Err(ApiError::BadParams(format!("invalid dueDate: {due}")));
    }
    Ok(Some(due))
}

fn new_assignment(req: &Request, subject_id: String, class_subject_id: String) -> Result<Assignment, ApiError> {
    Ok(Assignment {
        id: generate_id(),
        subject_id,
        class_subject_id,
        title: get_required_str(req, "title")?.trim().to_string(),
        detail: get_str(req, "detail").unwrap_or_default(),
        due_date: due_date_param(req, true)?.unwrap_or_default(),
        max_score: max_score_param(req)?.unwrap_or(DEFAULT_MAX_SCORE),
        rubric: get_array(req, "rubric"),
        files: get_array(req, "files"),
        created_at: now_iso(),
        is_active: true,
    })
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher])?;
    let subject_id = get_required_str(req, "subjectId")?;
    let subject = store
        .get::<Subject>(&subject_id)?
        .filter(|s| s.is_active)
        .ok_or_else(|| ApiError::not_found("subject"))?;
    if subject.teacher_id != user.id {
        return Err(ApiError::Forbidden("this subject is not yours".into()));
    }

    let assignment = new_assignment(req, subject.id, String::new())?;
    store.insert(&assignment)?;
    tracing::info!(assignment_id = %assignment.id, user_id = %user.id, "assignment created");
    to_json(&assignment)
}

fn handle_create_v2(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher])?;
    let cs_id = get_required_str(req, "classSubjectId")?;
    let cs = store
        .get::<ClassSubject>(&cs_id)?
        .filter(|cs| cs.is_active)
        .ok_or_else(|| ApiError::not_found("subject"))?;
    if cs.teacher_id != user.id {
        return Err(ApiError::Forbidden("this subject is not yours".into()));
    }

    let assignment = new_assignment(req, String::new(), cs.id)?;
    store.insert(&assignment)?;
    tracing::info!(assignment_id = %assignment.id, user_id = %user.id, "assignment created");
    to_json(&assignment)
}

/// Classes whose assignments a student or parent may read.
fn reader_class_ids(store: &Store, user: &User) -> anyhow::Result<Vec<String>> {
    let students = match user.role {
        Role::Student => vec![user.clone()],
        Role::Parent => {
            let linked: Vec<String> = store
                .filter(|p: &ParentLink| p.parent_id == user.id && p.is_active)?
                .into_iter()
                .map(|p| p.student_id)
                .collect();
            store.filter(|u: &User| linked.contains(&u.id))?
        }
        Role::Teacher | Role::Admin => return Ok(Vec::new()),
    };
    let mut ids = Vec::new();
    for student in &students {
        ids.extend(student_classes(store, student)?.into_iter().map(|c| c.id));
        ids.extend(enrolled_class_ids(store, &student.id)?);
    }
    Ok(ids)
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_user(store, req)?;
    let mut assignments = store.filter(|a: &Assignment| a.is_active)?;

    match user.role {
        Role::Teacher => {
            let scope = TeacherScope::load(store, &user.id)?;
            assignments.retain(|a| scope.owns(a));
        }
        Role::Student | Role::Parent => {
            let classes = reader_class_ids(store, &user)?;
            let mut visible = Vec::new();
            for a in assignments {
                if assignment_class_id(store, &a)?.is_some_and(|c| classes.contains(&c)) {
                    visible.push(a);
                }
            }
            assignments = visible;
        }
        Role::Admin => {}
    }

    if let Some(subject_id) = get_str(req, "subjectId") {
        assignments.retain(|a| a.subject_id == subject_id || a.class_subject_id == subject_id);
    }
    if let Some(class_id) = get_str(req, "classId") {
        let mut in_class = Vec::new();
        for a in assignments {
            if assignment_class_id(store, &a)?.as_deref() == Some(class_id.as_str()) {
                in_class.push(a);
            }
        }
        assignments = in_class;
    }
    if let Some(q) = get_query(req) {
        assignments.retain(|a| a.title.to_lowercase().contains(&q));
    }

    if get_str(req, "sort").as_deref() == Some("oldest") {
        assignments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    } else {
        assignments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    let rows = assignments
        .iter()
        .map(|a| enrich(a, json!({ "subjectName": subject_name(store, a)? })))
        .collect::<Result<Vec<_>, ApiError>>()?;
    let (page, page_size) = page_params(req, 10);
    to_json(&paginate(rows, page, page_size))
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    require_user(store, req)?;
    let id = get_required_str(req, "assignmentId")?;
    let assignment = store
        .get::<Assignment>(&id)?
        .ok_or_else(|| ApiError::not_found("assignment"))?;
    enrich(
        &assignment,
        json!({ "subjectName": subject_name(store, &assignment)? }),
    )
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher])?;
    let id = get_required_str(req, "assignmentId")?;
    let existing = store
        .get::<Assignment>(&id)?
        .ok_or_else(|| ApiError::not_found("assignment"))?;
    require_assignment_owner(store, &user, &existing)?;

    let title = get_str(req, "title");
    let detail = get_present_str(req, "detail");
    let due_date = due_date_param(req, false)?;
    let max_score = max_score_param(req)?;
    let active = get_bool(req, "isActive");
    let updated = store
        .update::<Assignment>(&id, |a| {
            if let Some(title) = title {
                a.title = title.trim().to_string();
            }
            if let Some(detail) = detail {
                a.detail = detail;
            }
            if let Some(due) = due_date {
                a.due_date = due;
            }
            if let Some(max) = max_score {
                a.max_score = max;
            }
            if let Some(active) = active {
                a.is_active = active;
            }
        })?
        .ok_or_else(|| ApiError::not_found("assignment"))?;
    to_json(&updated)
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher])?;
    let id = get_required_str(req, "assignmentId")?;
    let existing = store
        .get::<Assignment>(&id)?
        .ok_or_else(|| ApiError::not_found("assignment"))?;
    require_assignment_owner(store, &user, &existing)?;
    store.soft_delete::<Assignment>(&id)?;
    tracing::info!(assignment_id = %id, user_id = %user.id, "assignment deleted");
    Ok(serde_json::Value::Null)
}

fn handle_list_by_class_subject(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher])?;
    let cs_id = get_required_str(req, "classSubjectId")?;
    let cs = store
        .get::<ClassSubject>(&cs_id)?
        .filter(|cs| cs.is_active)
        .ok_or_else(|| ApiError::not_found("subject"))?;
    if cs.teacher_id != user.id {
        return Err(ApiError::Forbidden("this subject is not yours".into()));
    }

    let mut assignments = store.filter(|a: &Assignment| a.class_subject_id == cs.id && a.is_active)?;
    assignments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let submissions = store.all::<Submission>()?;
    let rows = assignments
        .iter()
        .map(|a| {
            let mine: Vec<&Submission> = submissions.iter().filter(|s| s.assignment_id == a.id).collect();
            let graded = mine.iter().filter(|s| s.status == SubmissionStatus::Graded).count();
            enrich(a, json!({ "submissionCount": mine.len(), "gradedCount": graded }))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (page, page_size) = page_params(req, 20);
    to_json(&paginate(rows, page, page_size))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "createAssignment" => Some(handle_create(state, req)),
        "createAssignmentV2" => Some(handle_create_v2(state, req)),
        "listAssignments" => Some(handle_list(state, req)),
        "getAssignment" => Some(handle_get(state, req)),
        "updateAssignment" => Some(handle_update(state, req)),
        "deleteAssignment" => Some(handle_delete(state, req)),
        "listAssignmentsByClassSubject" => Some(handle_list_by_class_subject(state, req)),
        _ => None,
    }
}
