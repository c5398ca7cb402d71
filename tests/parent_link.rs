mod support;

use serde_json::json;
use support::Sidecar;

#[test]
fn link_view_and_unlink_child() {
    let mut side = Sidecar::start();
    side.ok(
        None,
        "register",
        json!({ "role": "parent", "name": "Second Parent", "email": "p2@example.com", "password": "pw" }),
    );
    let parent = side.ok(None, "login", json!({ "email": "p2@example.com", "password": "pw" }));
    let parent = parent["token"].as_str().expect("token").to_string();
    let student2 = side.login("student2@demo.com");

    let code = side.ok(Some(&student2), "getLinkCode", json!({}));
    assert_eq!(code["linkCode"], "STUENT2");
    let not_student = side.fail(Some(&parent), "getLinkCode", json!({}));
    assert_eq!(not_student["errorCode"], "FORBIDDEN");

    let unknown = side.fail(Some(&parent), "parentLink", json!({ "linkCode": "STUZZZZ" }));
    assert_eq!(unknown["errorCode"], "NOT_FOUND");

    let link = side.ok(Some(&parent), "parentLink", json!({ "linkCode": "stuent2" }));
    assert_eq!(link["relation"], "Guardian");
    assert_eq!(link["student"]["id"], "user_student2");
    let again = side.fail(Some(&parent), "parentLink", json!({ "linkCode": "STUENT2" }));
    assert_eq!(again["errorCode"], "CONFLICT");

    let children = side.ok(Some(&parent), "getLinkedStudents", json!({}));
    let children = children.as_array().expect("children");
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["classes"][0]["id"], "class_2");

    let grades = side.ok(Some(&parent), "parentGetGrades", json!({ "studentId": "user_student2" }));
    assert!(grades.as_array().is_some_and(|g| g.is_empty()));
    side.ok(Some(&parent), "listSubmissionsByStudent", json!({ "studentId": "user_student2" }));

    let other = side.fail(Some(&parent), "parentGetGrades", json!({ "studentId": "user_student1" }));
    assert_eq!(other["errorCode"], "FORBIDDEN");
    let other = side.fail(
        Some(&parent),
        "listSubmissionsByStudent",
        json!({ "studentId": "user_student1" }),
    );
    assert_eq!(other["errorCode"], "FORBIDDEN");

    side.ok(Some(&parent), "parentUnlink", json!({ "studentId": "user_student2" }));
    let children = side.ok(Some(&parent), "getLinkedStudents", json!({}));
    assert!(children.as_array().is_some_and(|c| c.is_empty()));
    let gone = side.fail(Some(&parent), "parentUnlink", json!({ "studentId": "user_student2" }));
    assert_eq!(gone["errorCode"], "NOT_FOUND");

    // relinking after unlink is allowed
    side.ok(Some(&parent), "parentLink", json!({ "linkCode": "STUENT2" }));
}

#[test]
fn seeded_parent_sees_child_grades() {
    let mut side = Sidecar::start();
    let parent = side.login("parent@demo.com");

    let grades = side.ok(Some(&parent), "parentGetGrades", json!({ "studentId": "user_student1" }));
    let rows = grades.as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["grade"]["score"], 8.0);
    assert_eq!(rows[0]["assignment"]["id"], "assign_1");

    let csv = side.ok(Some(&parent), "exportGradesCSV", json!({ "studentId": "user_student1" }));
    assert_eq!(csv["rows"][0]["status"], "Graded");

    let assignments = side.ok(Some(&parent), "listAssignments", json!({}));
    let ids: Vec<&str> = assignments["data"]
        .as_array()
        .expect("assignments")
        .iter()
        .filter_map(|a| a["id"].as_str())
        .collect();
    assert!(ids.contains(&"assign_1"));
}
