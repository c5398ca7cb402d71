use chrono::Utc;
use serde_json::json;

use crate::api::error::ApiError;
use crate::api::handlers::notifications::notify;
use crate::api::helpers::{
    enrich, get_array, get_query, get_required_str, get_str, page_params, to_json,
};
use crate::api::scope::{
    assignment_class_id, enrolled_class_ids, require_assignment_owner,
    require_student_access, student_classes,
};
use crate::api::session::{require_role, require_user};
use crate::api::types::{AppState, Request};
use crate::models::{Assignment, Grade, Role, Submission, SubmissionStatus, User};
use crate::util::{generate_id, is_past_due, now_iso, paginate, to_iso};

/// Latest grade given to a submission.
pub(crate) fn latest_grade<'a>(grades: &'a [Grade], submission_id: &str) -> Option<&'a Grade> {
    grades.iter().rev().find(|g| g.submission_id == submission_id)
}

/// Status of a new version given the student's latest previous one.
fn next_status(previous: Option<&Submission>, late: bool) -> SubmissionStatus {
    match previous {
        Some(p) if p.status == SubmissionStatus::RevisionRequested => SubmissionStatus::Resubmitted,
        _ if late => SubmissionStatus::LateSubmission,
        _ => SubmissionStatus::Submitted,
    }
}

fn handle_submit(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Student])?;
    let assignment_id = get_required_str(req, "assignmentId")?;
    let assignment = store
        .get::<Assignment>(&assignment_id)?
        .filter(|a| a.is_active)
        .ok_or_else(|| ApiError::not_found("assignment"))?;

    if let Some(class_id) = assignment_class_id(store, &assignment)? {
        let mut mine = enrolled_class_ids(store, &user.id)?;
        mine.extend(student_classes(store, &user)?.into_iter().map(|c| c.id));
        if !mine.contains(&class_id) {
            return Err(ApiError::Forbidden("assignment is not for your class".into()));
        }
    }

    let previous = store.filter(|s: &Submission| s.assignment_id == assignment.id && s.student_id == user.id)?;
    let now = Utc::now();
    let latest = previous.last();
    let submission = Submission {
        id: generate_id(),
        assignment_id: assignment.id.clone(),
        student_id: user.id.clone(),
        submitted_at: to_iso(now),
        text: get_str(req, "text").unwrap_or_default(),
        link: get_str(req, "link").unwrap_or_default(),
        files: get_array(req, "files"),
        status: next_status(latest, is_past_due(&assignment.due_date, now)),
        version: previous.len() as u32 + 1,
        parent_submission_id: latest.map(|s| s.id.clone()),
        revision_reason: None,
    };
    store.insert(&submission)?;
    tracing::info!(
        submission_id = %submission.id,
        version = submission.version,
        status = submission.status.as_str(),
        "homework submitted"
    );
    to_json(&submission)
}

fn handle_list_by_assignment(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher])?;
    let assignment_id = get_required_str(req, "assignmentId")?;
    let assignment = store
        .get::<Assignment>(&assignment_id)?
        .filter(|a| a.is_active)
        .ok_or_else(|| ApiError::not_found("assignment"))?;
    require_assignment_owner(store, &user, &assignment)?;

    let users = store.all::<User>()?;
    let grades = store.all::<Grade>()?;
    let mut submissions = store.filter(|s: &Submission| s.assignment_id == assignment.id)?;
    if let Some(status) = get_str(req, "statusFilter") {
        let status = SubmissionStatus::parse(&status)
            .ok_or_else(|| ApiError::BadParams(format!("unknown status: {status}")))?;
        submissions.retain(|s| s.status == status);
    }

    let name_of = |id: &str| users.iter().find(|u| u.id == id).map(|u| u.name.clone());
    let query = get_query(req);
    let mut rows = Vec::new();
    for s in &submissions {
        let student_name = name_of(&s.student_id);
        if let Some(q) = &query {
            if !student_name.as_deref().is_some_and(|n| n.to_lowercase().contains(q)) {
                continue;
            }
        }
        rows.push(enrich(
            s,
            json!({ "studentName": student_name, "grade": latest_grade(&grades, &s.id) }),
        )?);
    }
    let (page, page_size) = page_params(req, 10);
    to_json(&paginate(rows, page, page_size))
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_user(store, req)?;
    let id = get_required_str(req, "submissionId")?;
    let submission = store
        .get::<Submission>(&id)?
        .ok_or_else(|| ApiError::not_found("submission"))?;
    let assignment = store
        .get::<Assignment>(&submission.assignment_id)?
        .ok_or_else(|| ApiError::not_found("assignment"))?;

    match user.role {
        Role::Teacher => require_assignment_owner(store, &user, &assignment)?,
        _ => require_student_access(store, &user, &submission.student_id)?,
    }

    let grades = store.all::<Grade>()?;
    let student = store.get::<User>(&submission.student_id)?;
    enrich(
        &submission,
        json!({
            "assignment": assignment,
            "studentName": student.map(|u| u.name).unwrap_or_else(|| "Unknown".into()),
            "grade": latest_grade(&grades, &submission.id),
        }),
    )
}

fn handle_list_by_student(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_user(store, req)?;
    let student_id = get_str(req, "studentId").unwrap_or_else(|| user.id.clone());
    require_student_access(store, &user, &student_id)?;

    let assignments = store.all::<Assignment>()?;
    let grades = store.all::<Grade>()?;
    let rows = store
        .filter(|s: &Submission| s.student_id == student_id)?
        .iter()
        .map(|s| {
            let assignment = assignments.iter().find(|a| a.id == s.assignment_id);
            enrich(
                s,
                json!({ "assignment": assignment, "grade": latest_grade(&grades, &s.id) }),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (page, page_size) = page_params(req, 10);
    to_json(&paginate(rows, page, page_size))
}

fn handle_request_revision(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher])?;
    let id = get_required_str(req, "submissionId")?;
    let reason = get_required_str(req, "reason")?;
    let submission = store
        .get::<Submission>(&id)?
        .ok_or_else(|| ApiError::not_found("submission"))?;
    let assignment = store
        .get::<Assignment>(&submission.assignment_id)?
        .ok_or_else(|| ApiError::not_found("assignment"))?;
    require_assignment_owner(store, &user, &assignment)?;

    let updated = store
        .update::<Submission>(&id, |s| {
            s.status = SubmissionStatus::RevisionRequested;
            s.revision_reason = Some(reason.clone());
        })?
        .ok_or_else(|| ApiError::not_found("submission"))?;
    notify(
        store,
        &submission.student_id,
        "revision",
        "Revision requested",
        format!("{}: {reason}", assignment.title),
        Some(&submission.id),
    )?;
    tracing::info!(submission_id = %id, user_id = %user.id, "revision requested");
    to_json(&updated)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "submitHomework" => Some(handle_submit(state, req)),
        "listSubmissionsByAssignment" => Some(handle_list_by_assignment(state, req)),
        "getSubmission" => Some(handle_get(state, req)),
        "listSubmissionsByStudent" => Some(handle_list_by_student(state, req)),
        "requestRevision" => Some(handle_request_revision(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn previous(status: SubmissionStatus) -> Submission {
        Submission {
            id: "s1".into(),
            assignment_id: "a1".into(),
            student_id: "u1".into(),
            submitted_at: now_iso(),
            text: String::new(),
            link: String::new(),
            files: Vec::new(),
            status,
            version: 1,
            parent_submission_id: None,
            revision_reason: None,
        }
    }

    #[test]
    fn resubmission_after_revision_request_wins_over_lateness() {
        let p = previous(SubmissionStatus::RevisionRequested);
        assert_eq!(next_status(Some(&p), true), SubmissionStatus::Resubmitted);
        let graded = previous(SubmissionStatus::Graded);
        assert_eq!(next_status(Some(&graded), true), SubmissionStatus::LateSubmission);
        assert_eq!(next_status(None, false), SubmissionStatus::Submitted);
    }
}
