use serde_json::json;

use crate::api::error::ApiError;
use crate::api::handlers::grading::student_grade_rows;
use crate::api::helpers::get_str;
use crate::api::scope::{
    assignment_class_id, class_students, require_student_access, subject_name, TeacherScope,
};
use crate::api::session::{require_role, require_user};
use crate::api::types::{AppState, Request};
use crate::models::{Assignment, Class, Role, Submission, SubmissionStatus};
use crate::util::to_csv;

const GRADE_COLUMNS: [(&str, &str); 5] = [
    ("subjectName", "Subject"),
    ("title", "Assignment"),
    ("score", "Score"),
    ("maxScore", "Max score"),
    ("status", "Status"),
];

const MISSING_COLUMNS: [(&str, &str); 5] = [
    ("className", "Class"),
    ("subjectName", "Subject"),
    ("assignmentTitle", "Assignment"),
    ("dueDate", "Due date"),
    ("studentName", "Student"),
];

fn handle_grades_csv(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_user(store, req)?;
    let student_id = get_str(req, "studentId").unwrap_or_else(|| user.id.clone());
    require_student_access(store, &user, &student_id)?;

    let rows: Vec<serde_json::Value> = student_grade_rows(store, &student_id)?
        .iter()
        .map(|row| {
            let status = row["submission"]["status"]
                .as_str()
                .and_then(SubmissionStatus::parse)
                .map(SubmissionStatus::label)
                .unwrap_or("-");
            json!({
                "subjectName": row["subjectName"],
                "title": row["assignment"]["title"],
                "score": row["grade"]["score"],
                "maxScore": row["assignment"]["maxScore"],
                "status": status,
            })
        })
        .collect();
    let csv = to_csv(&GRADE_COLUMNS, &rows);
    Ok(json!({ "rows": rows, "csv": csv }))
}

/// Enrolled students with no submission, for every active assignment in
/// scope. Teachers see their own subjects, admins see everything.
fn handle_missing_csv(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher, Role::Admin])?;
    let scope = match user.role {
        Role::Teacher => Some(TeacherScope::load(store, &user.id)?),
        _ => None,
    };

    let assignments = store.filter(|a: &Assignment| {
        a.is_active && scope.as_ref().map_or(true, |s| s.owns(a))
    })?;
    let submissions = store.all::<Submission>()?;
    let classes = store.all::<Class>()?;

    let mut rows = Vec::new();
    for assignment in &assignments {
        let Some(class_id) = assignment_class_id(store, assignment)? else {
            continue;
        };
        let class_name = classes.iter().find(|c| c.id == class_id).map(|c| c.name.clone());
        let subject = subject_name(store, assignment)?;
        for student in class_students(store, &class_id)? {
            let submitted = submissions
                .iter()
                .any(|s| s.assignment_id == assignment.id && s.student_id == student.id);
            if submitted {
                continue;
            }
            rows.push(json!({
                "className": class_name,
                "subjectName": subject,
                "assignmentTitle": assignment.title,
                "dueDate": assignment.due_date,
                "studentName": student.name,
            }));
        }
    }
    let csv = to_csv(&MISSING_COLUMNS, &rows);
    Ok(json!({ "rows": rows, "csv": csv }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "exportGradesCSV" => Some(handle_grades_csv(state, req)),
        "exportMissingCSV" => Some(handle_missing_csv(state, req)),
        _ => None,
    }
}
