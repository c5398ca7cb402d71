use chrono::Utc;
use serde_json::json;

use crate::api::error::ApiError;
use crate::api::handlers::submissions::latest_grade;
use crate::api::scope::{catalog_name, class_students, student_classes, subject_name, TeacherScope};
use crate::api::session::require_role;
use crate::api::types::{AppState, Request};
use crate::models::{Assignment, Class, ClassSubject, Grade, Role, Subject, Submission, SubmissionStatus, User};
use crate::util::{compare_levels, is_past_due, parse_timestamp};

const RECENT_PENDING: usize = 10;
const UPCOMING: usize = 5;
const RECENT_GRADES: usize = 5;

fn handle_teacher_stats(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher])?;
    let scope = TeacherScope::load(store, &user.id)?;
    let assignments = store.filter(|a: &Assignment| a.is_active && scope.owns(a))?;
    let submissions = store.filter(|s: &Submission| assignments.iter().any(|a| a.id == s.assignment_id))?;
    let users = store.all::<User>()?;

    let mut pending: Vec<&Submission> = submissions.iter().filter(|s| s.status.is_pending()).collect();
    pending.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    let mut recent = Vec::new();
    for s in pending.iter().take(RECENT_PENDING) {
        let assignment = assignments.iter().find(|a| a.id == s.assignment_id);
        let subject = match assignment {
            Some(a) => subject_name(store, a)?,
            None => None,
        };
        recent.push(json!({
            "id": s.id,
            "studentName": users.iter().find(|u| u.id == s.student_id).map_or("Unknown student", |u| u.name.as_str()),
            "assignmentTitle": assignment.map_or("Unknown assignment", |a| a.title.as_str()),
            "subjectName": subject.unwrap_or_else(|| "Unknown".into()),
            "submittedAt": s.submitted_at,
            "status": s.status,
        }));
    }

    Ok(json!({
        "stats": {
            "classesCount": scope.class_ids().len(),
            "assignmentsCount": assignments.len(),
            "pendingCount": pending.len(),
            "gradedCount": submissions.iter().filter(|s| s.status == SubmissionStatus::Graded).count(),
        },
        "recentPending": recent,
    }))
}

fn handle_student_stats(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Student])?;
    let classes = student_classes(store, &user)?;
    let class_ids: Vec<&str> = classes.iter().map(|c| c.id.as_str()).collect();

    let subject_ids: Vec<String> = store
        .filter(|s: &Subject| s.is_active && class_ids.contains(&s.class_id.as_str()))?
        .into_iter()
        .map(|s| s.id)
        .collect();
    let class_subject_ids: Vec<String> = store
        .filter(|cs: &ClassSubject| cs.is_active && class_ids.contains(&cs.class_id.as_str()))?
        .into_iter()
        .map(|cs| cs.id)
        .collect();
    let assignments = store.filter(|a: &Assignment| {
        a.is_active
            && ((!a.subject_id.is_empty() && subject_ids.contains(&a.subject_id))
                || (!a.class_subject_id.is_empty() && class_subject_ids.contains(&a.class_subject_id)))
    })?;

    let mine = store.filter(|s: &Submission| s.student_id == user.id)?;
    let grades = store.all::<Grade>()?;
    let open: Vec<&Assignment> = assignments
        .iter()
        .filter(|a| !mine.iter().any(|s| s.assignment_id == a.id))
        .collect();
    let graded: Vec<&Submission> = mine.iter().filter(|s| s.status == SubmissionStatus::Graded).collect();

    let now = Utc::now();
    let mut upcoming: Vec<&Assignment> = open
        .iter()
        .copied()
        .filter(|a| !is_past_due(&a.due_date, now))
        .collect();
    upcoming.sort_by_key(|a| {
        let due = parse_timestamp(&a.due_date);
        (due.is_none(), due)
    });
    let mut upcoming_rows = Vec::new();
    for a in upcoming.into_iter().take(UPCOMING) {
        upcoming_rows.push(json!({
            "id": a.id,
            "title": a.title,
            "subjectName": subject_name(store, a)?.unwrap_or_else(|| "Unknown".into()),
            "dueDate": a.due_date,
        }));
    }

    let graded_at = |s: &Submission| {
        latest_grade(&grades, &s.id).map_or_else(|| s.submitted_at.clone(), |g| g.graded_at.clone())
    };
    let mut recent = graded.clone();
    recent.sort_by_key(|s| std::cmp::Reverse(graded_at(*s)));
    let recent_grades: Vec<serde_json::Value> = recent
        .into_iter()
        .take(RECENT_GRADES)
        .map(|s| {
            let assignment = assignments.iter().find(|a| a.id == s.assignment_id);
            let grade = latest_grade(&grades, &s.id);
            json!({
                "id": s.id,
                "assignmentTitle": assignment.map_or("Unknown assignment", |a| a.title.as_str()),
                "score": grade.map(|g| g.score),
                "maxScore": assignment.map(|a| a.max_score),
                "feedback": grade.map_or("", |g| g.feedback.as_str()),
            })
        })
        .collect();

    Ok(json!({
        "stats": {
            "classesCount": classes.len(),
            "assignmentsCount": assignments.len(),
            "pendingCount": open.len(),
            "gradedCount": graded.len(),
        },
        "upcoming": upcoming_rows,
        "recentGrades": recent_grades,
    }))
}

/// Per-class score sheet for everything a teacher teaches, plus homeroom
/// classes that have no subjects yet.
fn handle_gradebook(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher])?;
    let scope = TeacherScope::load(store, &user.id)?;

    // (class id, subject id, name, is class subject)
    let mut columns: Vec<(String, String, String, bool)> = scope
        .subjects
        .iter()
        .map(|s| (s.class_id.clone(), s.id.clone(), s.name.clone(), false))
        .collect();
    for cs in &scope.class_subjects {
        let name = catalog_name(store, cs)?.unwrap_or_else(|| "Unknown".into());
        columns.push((cs.class_id.clone(), cs.id.clone(), name, true));
    }

    let mut classes: Vec<Class> = store.filter(|c: &Class| {
        c.is_active && (c.teacher_id == user.id || columns.iter().any(|(class_id, ..)| *class_id == c.id))
    })?;
    classes.sort_by(|a, b| compare_levels(&a.name, &b.name));

    let assignments = store.filter(|a: &Assignment| a.is_active)?;
    let submissions = store.filter(|s: &Submission| s.status == SubmissionStatus::Graded)?;
    let grades = store.all::<Grade>()?;

    let mut out = Vec::new();
    for class in &classes {
        let students: Vec<serde_json::Value> = class_students(store, &class.id)?
            .iter()
            .map(|s| json!({ "id": s.id, "name": s.name }))
            .collect();

        let mut subjects = Vec::new();
        for (_, subject_id, name, is_class_subject) in columns.iter().filter(|(cid, ..)| *cid == class.id) {
            let of_subject: Vec<&Assignment> = assignments
                .iter()
                .filter(|a| {
                    if *is_class_subject {
                        a.class_subject_id == *subject_id
                    } else {
                        a.subject_id == *subject_id
                    }
                })
                .collect();
            let total_max: f64 = of_subject.iter().map(|a| a.max_score).sum();
            let mut scores = serde_json::Map::new();
            for s in submissions.iter().filter(|s| of_subject.iter().any(|a| a.id == s.assignment_id)) {
                if let Some(grade) = latest_grade(&grades, &s.id) {
                    let sum = scores.get(&s.student_id).and_then(|v| v.as_f64()).unwrap_or(0.0);
                    scores.insert(s.student_id.clone(), json!(sum + grade.score));
                }
            }
            subjects.push(json!({
                "id": subject_id,
                "name": name,
                "type": if *is_class_subject { "class_subject" } else { "legacy" },
                "totalMaxScore": total_max,
                "studentScores": scores,
            }));
        }

        out.push(json!({
            "classId": class.id,
            "className": class.name,
            "students": students,
            "subjects": subjects,
        }));
    }
    Ok(serde_json::Value::Array(out))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "getTeacherDashboardStats" => Some(handle_teacher_stats(state, req)),
        "getStudentDashboardStats" => Some(handle_student_stats(state, req)),
        "getGradebookData" => Some(handle_gradebook(state, req)),
        _ => None,
    }
}
