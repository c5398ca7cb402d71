mod support;

use serde_json::json;
use support::Sidecar;

const FUTURE: &str = "2099-06-30T23:59:00.000Z";

#[test]
fn legacy_subject_assignment_lifecycle() {
    let mut side = Sidecar::start();
    let teacher = side.login("teacher@demo.com");
    let teacher2 = side.login("teacher2@demo.com");
    let student = side.login("student@demo.com");

    let denied = side.fail(Some(&student), "createSubject", json!({ "name": "Robotics" }));
    assert_eq!(denied["errorCode"], "FORBIDDEN");
    let no_class = side.fail(
        Some(&teacher),
        "createSubject",
        json!({ "name": "Robotics", "classId": "class_missing" }),
    );
    assert_eq!(no_class["errorCode"], "NOT_FOUND");

    let subject = side.ok(
        Some(&teacher),
        "createSubject",
        json!({ "name": "Robotics", "classId": "class_1" }),
    );
    assert_eq!(subject["teacherId"], "user_teacher1");
    assert!(subject.get("classSubjectId").is_none());
    let subject_id = subject["id"].as_str().expect("subject id").to_string();

    let listed = side.ok(Some(&teacher), "listSubjects", json!({ "classId": "class_1" }));
    assert!(listed
        .as_array()
        .expect("subjects")
        .iter()
        .any(|s| s["id"] == subject_id.as_str()));

    let foreign = side.fail(
        Some(&teacher2),
        "createAssignment",
        json!({ "subjectId": subject_id, "title": "Build a robot", "dueDate": FUTURE }),
    );
    assert_eq!(foreign["errorCode"], "FORBIDDEN");
    let bad_due = side.fail(
        Some(&teacher),
        "createAssignment",
        json!({ "subjectId": subject_id, "title": "Build a robot", "dueDate": "someday" }),
    );
    assert_eq!(bad_due["errorCode"], "BAD_PARAMS");

    let created = side.ok(
        Some(&teacher),
        "createAssignment",
        json!({ "subjectId": subject_id, "title": "Build a robot", "dueDate": FUTURE, "detail": "Use the kit" }),
    );
    assert_eq!(created["subjectId"], subject_id.as_str());
    assert_eq!(created["maxScore"], 10.0);
    let assignment_id = created["id"].as_str().expect("assignment id").to_string();

    let fetched = side.ok(Some(&student), "getAssignment", json!({ "assignmentId": assignment_id }));
    assert_eq!(fetched["subjectName"], "Robotics");
    assert_eq!(fetched["detail"], "Use the kit");
    let unknown = side.fail(Some(&teacher), "getAssignment", json!({ "assignmentId": "nope" }));
    assert_eq!(unknown["errorCode"], "NOT_FOUND");

    let not_owner = side.fail(
        Some(&teacher2),
        "updateAssignment",
        json!({ "assignmentId": assignment_id, "title": "Hijacked" }),
    );
    assert_eq!(not_owner["errorCode"], "FORBIDDEN");
    let not_owner = side.fail(Some(&teacher2), "deleteAssignment", json!({ "assignmentId": assignment_id }));
    assert_eq!(not_owner["errorCode"], "FORBIDDEN");
    let by_student = side.fail(Some(&student), "deleteAssignment", json!({ "assignmentId": assignment_id }));
    assert_eq!(by_student["errorCode"], "FORBIDDEN");

    let zero_max = side.fail(
        Some(&teacher),
        "updateAssignment",
        json!({ "assignmentId": assignment_id, "maxScore": 0 }),
    );
    assert_eq!(zero_max["errorCode"], "BAD_PARAMS");
    let updated = side.ok(
        Some(&teacher),
        "updateAssignment",
        json!({ "assignmentId": assignment_id, "title": "Build two robots", "maxScore": 15, "detail": "" }),
    );
    assert_eq!(updated["title"], "Build two robots");
    assert_eq!(updated["maxScore"], 15.0);
    assert_eq!(updated["detail"], "");

    let missing = side.fail(
        Some(&teacher),
        "updateAssignment",
        json!({ "assignmentId": "nope", "title": "x" }),
    );
    assert_eq!(missing["errorCode"], "NOT_FOUND");

    side.ok(Some(&teacher), "deleteAssignment", json!({ "assignmentId": assignment_id }));
    let remaining = side.ok(Some(&teacher), "listAssignments", json!({ "subjectId": subject_id }));
    assert_eq!(remaining["total"], 0);
    let after = side.ok(Some(&teacher), "getAssignment", json!({ "assignmentId": assignment_id }));
    assert_eq!(after["isActive"], false);
}

#[test]
fn class_subject_assignment_counts() {
    let mut side = Sidecar::start();
    let teacher = side.login("teacher@demo.com");
    let teacher2 = side.login("teacher2@demo.com");
    let student = side.login("student@demo.com");

    let created = side.ok(
        Some(&teacher),
        "createAssignmentV2",
        json!({ "classSubjectId": "cs_1", "title": "Fractions quiz", "dueDate": FUTURE }),
    );
    let assignment_id = created["id"].as_str().expect("assignment id").to_string();
    side.ok(
        Some(&student),
        "submitHomework",
        json!({ "assignmentId": assignment_id, "text": "1/2" }),
    );

    let rows = side.ok(
        Some(&teacher),
        "listAssignmentsByClassSubject",
        json!({ "classSubjectId": "cs_1" }),
    );
    let rows = rows["data"].as_array().expect("assignments").clone();
    let quiz = rows
        .iter()
        .find(|r| r["id"] == assignment_id.as_str())
        .expect("new assignment listed");
    assert_eq!(quiz["submissionCount"], 1);
    assert_eq!(quiz["gradedCount"], 0);
    let seeded = rows
        .iter()
        .find(|r| r["id"] == "assign_1")
        .expect("seeded assignment listed");
    assert_eq!(seeded["submissionCount"], 1);
    assert_eq!(seeded["gradedCount"], 1);

    let foreign = side.fail(
        Some(&teacher2),
        "listAssignmentsByClassSubject",
        json!({ "classSubjectId": "cs_1" }),
    );
    assert_eq!(foreign["errorCode"], "FORBIDDEN");
    let unknown = side.fail(
        Some(&teacher),
        "listAssignmentsByClassSubject",
        json!({ "classSubjectId": "cs_missing" }),
    );
    assert_eq!(unknown["errorCode"], "NOT_FOUND");
}
