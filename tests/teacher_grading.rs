mod support;

use serde_json::json;
use support::Sidecar;

const FUTURE: &str = "2099-06-30T23:59:00.000Z";

#[test]
fn submission_revision_and_grading_cycle() {
    let mut side = Sidecar::start();
    let teacher = side.login("teacher@demo.com");
    let teacher2 = side.login("teacher2@demo.com");
    let student = side.login("student@demo.com");

    let bad_max = side.fail(
        Some(&teacher),
        "createAssignmentV2",
        json!({ "classSubjectId": "cs_1", "title": "Worksheet", "dueDate": FUTURE, "maxScore": 0 }),
    );
    assert_eq!(bad_max["errorCode"], "BAD_PARAMS");
    assert_eq!(bad_max["details"]["maxScore"], 0.0);

    let not_mine = side.fail(
        Some(&teacher2),
        "createAssignmentV2",
        json!({ "classSubjectId": "cs_1", "title": "Worksheet", "dueDate": FUTURE }),
    );
    assert_eq!(not_mine["errorCode"], "FORBIDDEN");

    let assignment = side.ok(
        Some(&teacher),
        "createAssignmentV2",
        json!({ "classSubjectId": "cs_1", "title": "Worksheet", "dueDate": FUTURE, "maxScore": 5 }),
    );
    let assignment_id = assignment["id"].as_str().expect("assignment id").to_string();

    let first = side.ok(
        Some(&student),
        "submitHomework",
        json!({ "assignmentId": assignment_id, "text": "my answers" }),
    );
    assert_eq!(first["status"], "SUBMITTED");
    assert_eq!(first["version"], 1);
    let first_id = first["id"].as_str().expect("submission id").to_string();

    let foreign = side.fail(
        Some(&teacher2),
        "gradeHomework",
        json!({ "submissionId": first_id, "score": 3 }),
    );
    assert_eq!(foreign["errorCode"], "FORBIDDEN");

    let no_reason = side.fail(Some(&teacher), "requestRevision", json!({ "submissionId": first_id }));
    assert_eq!(no_reason["errorCode"], "BAD_PARAMS");
    let revised = side.ok(
        Some(&teacher),
        "requestRevision",
        json!({ "submissionId": first_id, "reason": "show your working" }),
    );
    assert_eq!(revised["status"], "REVISION_REQUESTED");

    // ungraded work is listed with a null grade for the student and a linked parent
    let parent = side.login("parent@demo.com");
    let pending = side.ok(Some(&parent), "parentGetGrades", json!({ "studentId": "user_student1" }));
    let pending_row = pending
        .as_array()
        .expect("grade rows")
        .iter()
        .find(|r| r["submission"]["id"] == first_id.as_str())
        .expect("revision requested row");
    assert_eq!(pending_row["submission"]["status"], "REVISION_REQUESTED");
    assert!(pending_row["grade"].is_null());
    assert_eq!(pending_row["assignment"]["id"], assignment_id.as_str());
    let export = side.ok(Some(&student), "exportGradesCSV", json!({}));
    let export_row = export["rows"]
        .as_array()
        .expect("export rows")
        .iter()
        .find(|r| r["title"] == "Worksheet")
        .expect("worksheet export row");
    assert_eq!(export_row["status"], "Revision requested");
    assert!(export_row["score"].is_null());

    let second = side.ok(
        Some(&student),
        "submitHomework",
        json!({ "assignmentId": assignment_id, "text": "with working" }),
    );
    assert_eq!(second["status"], "RESUBMITTED");
    assert_eq!(second["version"], 2);
    assert_eq!(second["parentSubmissionId"], first_id.as_str());
    let second_id = second["id"].as_str().expect("submission id").to_string();

    let too_high = side.fail(
        Some(&teacher),
        "gradeHomework",
        json!({ "submissionId": second_id, "score": 6 }),
    );
    assert_eq!(too_high["errorCode"], "BAD_PARAMS");
    assert_eq!(too_high["details"]["max"], 5.0);

    let grade = side.ok(
        Some(&teacher),
        "gradeHomework",
        json!({ "submissionId": second_id, "score": 4, "feedback": "good" }),
    );
    assert_eq!(grade["score"], 4.0);

    let graded = side.ok(
        Some(&teacher),
        "listSubmissionsByAssignment",
        json!({ "assignmentId": assignment_id, "statusFilter": "GRADED" }),
    );
    assert_eq!(graded["total"], 1);
    assert_eq!(graded["data"][0]["studentName"], "Somchai Rakrian");
    assert_eq!(graded["data"][0]["grade"]["feedback"], "good");

    let grades = side.ok(Some(&student), "getStudentGrades", json!({}));
    let row = grades
        .as_array()
        .expect("grade rows")
        .iter()
        .find(|r| r["submission"]["id"] == second_id.as_str())
        .expect("graded worksheet");
    assert_eq!(row["grade"]["score"], 4.0);
    assert_eq!(row["subjectName"], "Basic Mathematics");

    let export = side.ok(Some(&student), "exportGradesCSV", json!({}));
    let csv = export["csv"].as_str().expect("csv");
    assert!(csv.starts_with("\"Subject\",\"Assignment\""));
    assert!(csv.contains("\"Worksheet\""));

    let notes = side.ok(Some(&student), "listNotifications", json!({}));
    assert!(notes["unreadCount"].as_u64().unwrap_or(0) >= 2);
    let note_id = notes["data"][0]["id"].as_str().expect("notification id").to_string();
    assert_eq!(notes["data"][0]["kind"], "grade");

    let stranger = side.fail(Some(&teacher), "markRead", json!({ "notificationId": note_id }));
    assert_eq!(stranger["errorCode"], "FORBIDDEN");
    side.ok(Some(&student), "markRead", json!({ "notificationId": note_id }));
    let after = side.ok(Some(&student), "listNotifications", json!({}));
    assert_eq!(
        after["unreadCount"].as_u64(),
        notes["unreadCount"].as_u64().map(|n| n - 1)
    );
}

#[test]
fn late_and_out_of_class_submissions() {
    let mut side = Sidecar::start();
    let teacher = side.login("teacher@demo.com");

    let overdue = side.ok(
        Some(&teacher),
        "createAssignmentV2",
        json!({ "classSubjectId": "cs_1", "title": "Overdue", "dueDate": "2020-01-01" }),
    );
    let overdue_id = overdue["id"].as_str().expect("id").to_string();
    assert_eq!(overdue["maxScore"], 10.0);

    let student = side.login("student@demo.com");
    let late = side.ok(Some(&student), "submitHomework", json!({ "assignmentId": overdue_id }));
    assert_eq!(late["status"], "LATE_SUBMISSION");

    side.ok(
        None,
        "register",
        json!({ "role": "student", "name": "Upper", "email": "upper@example.com", "password": "pw", "roomJoinCode": "ROOM401" }),
    );
    let outsider = side.ok(None, "login", json!({ "email": "upper@example.com", "password": "pw" }));
    let outsider = outsider["token"].as_str().expect("token").to_string();
    let denied = side.fail(Some(&outsider), "submitHomework", json!({ "assignmentId": overdue_id }));
    assert_eq!(denied["errorCode"], "FORBIDDEN");

    let peeking = side.fail(
        Some(&outsider),
        "getSubmission",
        json!({ "submissionId": late["id"] }),
    );
    assert_eq!(peeking["errorCode"], "FORBIDDEN");

    let missing = side.ok(Some(&teacher), "exportMissingCSV", json!({}));
    let rows = missing["rows"].as_array().expect("rows");
    assert!(rows
        .iter()
        .any(|r| r["assignmentTitle"] == "Overdue" && r["studentName"] == "Somying Tangjai"));
    assert!(!rows
        .iter()
        .any(|r| r["assignmentTitle"] == "Overdue" && r["studentName"] == "Somchai Rakrian"));
}

#[test]
fn teacher_dashboards_and_gradebook() {
    let mut side = Sidecar::start();
    let teacher = side.login("teacher@demo.com");

    let stats = side.ok(Some(&teacher), "getTeacherDashboardStats", json!({}));
    assert_eq!(stats["stats"]["gradedCount"], 1);
    assert!(stats["stats"]["assignmentsCount"].as_u64().unwrap_or(0) >= 2);

    let book = side.ok(Some(&teacher), "getGradebookData", json!({}));
    let class_1 = book
        .as_array()
        .expect("classes")
        .iter()
        .find(|c| c["classId"] == "class_1")
        .expect("class_1 in gradebook");
    let maths = class_1["subjects"]
        .as_array()
        .expect("subjects")
        .iter()
        .find(|s| s["id"] == "cs_1")
        .expect("cs_1 column");
    assert_eq!(maths["totalMaxScore"], 30.0);
    assert_eq!(maths["studentScores"]["user_student1"], 8.0);

    let student = side.login("student@demo.com");
    let dash = side.ok(Some(&student), "getStudentDashboardStats", json!({}));
    assert_eq!(dash["stats"]["gradedCount"], 1);
    assert_eq!(dash["recentGrades"][0]["score"], 8.0);
    let upcoming = dash["upcoming"].as_array().expect("upcoming");
    assert!(upcoming.iter().any(|a| a["id"] == "assign_2"));
    assert!(!upcoming.iter().any(|a| a["id"] == "assign_1"));
}
