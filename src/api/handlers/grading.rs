use serde_json::json;

use crate::api::audit;
use crate::api::error::ApiError;
use crate::api::handlers::notifications::notify;
use crate::api::handlers::submissions::latest_grade;
use crate::api::helpers::{get_array, get_f64, get_required_str, get_str, to_json};
use crate::api::scope::{require_assignment_owner, require_student_access, subject_name};
use crate::api::session::{require_role, require_user};
use crate::api::types::{AppState, Request};
use crate::models::{Assignment, Grade, Role, Submission, SubmissionStatus};
use crate::store::Store;
use crate::util::{generate_id, now_iso};

/// Every submission of a student with its assignment and latest grade, in
/// submission order. Ungraded submissions carry a null grade.
pub(crate) fn student_grade_rows(store: &Store, student_id: &str) -> Result<Vec<serde_json::Value>, ApiError> {
    let assignments = store.all::<Assignment>()?;
    let grades = store.all::<Grade>()?;
    let mut rows = Vec::new();
    for submission in store.filter(|s: &Submission| s.student_id == student_id)? {
        let Some(assignment) = assignments.iter().find(|a| a.id == submission.assignment_id) else {
            continue;
        };
        rows.push(json!({
            "grade": latest_grade(&grades, &submission.id),
            "submission": submission,
            "assignment": assignment,
            "subjectName": subject_name(store, assignment)?.unwrap_or_else(|| "-".into()),
        }));
    }
    Ok(rows)
}

fn handle_grade(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher])?;
    let submission_id = get_required_str(req, "submissionId")?;
    let submission = store
        .get::<Submission>(&submission_id)?
        .ok_or_else(|| ApiError::not_found("submission"))?;
    let assignment = store
        .get::<Assignment>(&submission.assignment_id)?
        .ok_or_else(|| ApiError::not_found("assignment"))?;
    require_assignment_owner(store, &user, &assignment)?;

    let score = get_f64(req, "score").ok_or_else(|| ApiError::BadParams("missing score".into()))?;
    if !score.is_finite() || score < 0.0 || score > assignment.max_score {
        return Err(ApiError::Invalid {
            message: format!("score must be between 0 and {}", assignment.max_score),
            details: json!({ "min": 0, "max": assignment.max_score, "score": score }),
        });
    }

    let grade = Grade {
        id: generate_id(),
        submission_id: submission.id.clone(),
        teacher_id: user.id.clone(),
        score,
        feedback: get_str(req, "feedback").unwrap_or_default(),
        rubric_score: get_array(req, "rubricScore"),
        graded_at: now_iso(),
        status: SubmissionStatus::Graded,
    };
    // Grade, status, notification and audit entry land together or not at all.
    store.atomically(|store| {
        store.insert(&grade)?;
        store.update::<Submission>(&submission.id, |s| s.status = SubmissionStatus::Graded)?;
        notify(
            store,
            &submission.student_id,
            "grade",
            "Homework graded",
            format!("{}: {}/{}", assignment.title, score, assignment.max_score),
            Some(&submission.id),
        )?;
        audit::record(
            store,
            &user,
            "grade.create",
            "submission",
            &submission.id,
            format!("score {score}/{}", assignment.max_score),
        )
    })?;
    to_json(&grade)
}

fn handle_student_grades(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_user(store, req)?;
    let student_id = get_str(req, "studentId").unwrap_or_else(|| user.id.clone());
    require_student_access(store, &user, &student_id)?;
    Ok(serde_json::Value::Array(student_grade_rows(store, &student_id)?))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "gradeHomework" => Some(handle_grade(state, req)),
        "getStudentGrades" => Some(handle_student_grades(state, req)),
        _ => None,
    }
}
