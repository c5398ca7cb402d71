mod support;

use serde_json::json;
use support::Sidecar;

#[test]
fn envelope_errors_and_workspace_gate() {
    let workspace = tempfile::tempdir().expect("temp workspace");
    let mut side = Sidecar::spawn_bare(workspace);

    let health = side.ok(None, "health", json!({}));
    assert!(health["workspacePath"].is_null());
    assert_eq!(health["mode"], "demo");

    let resp = side.fail(None, "listClasses", json!({}));
    assert_eq!(resp["errorCode"], "NO_WORKSPACE");

    let bad = side.raw_line("{not json");
    assert_eq!(bad["success"], false);
    assert_eq!(bad["errorCode"], "BAD_REQUEST");
    assert!(bad["requestId"].as_str().is_some_and(|id| id.starts_with("req_")));

    let unknown = side.raw_line(r#"{"action":"noSuchThing","requestId":"x1"}"#);
    assert_eq!(unknown["requestId"], "x1");
    assert_eq!(unknown["errorCode"], "UNKNOWN_ACTION");

    let blank = side.raw_line(r#"{"action":"  "}"#);
    assert_eq!(blank["errorCode"], "BAD_REQUEST");
}

#[test]
fn every_family_dispatches() {
    let mut side = Sidecar::start();
    let admin = side.login("admin@demo.com");
    let teacher = side.login("teacher@demo.com");
    let student = side.login("student@demo.com");
    let parent = side.login("parent@demo.com");

    let calls = [
        (&admin, "getMode", json!({})),
        (&admin, "resolveRoute", json!({ "path": "/admin" })),
        (&admin, "navItems", json!({})),
        (&admin, "me", json!({})),
        (&admin, "adminListClasses", json!({})),
        (&admin, "listTerms", json!({})),
        (&teacher, "listSubjects", json!({})),
        (&admin, "listSubjectTemplates", json!({})),
        (&admin, "listSubjectCatalog", json!({})),
        (&admin, "listClassSubjects", json!({})),
        (&teacher, "listMyClassSubjects", json!({})),
        (&teacher, "listAssignments", json!({})),
        (&teacher, "listSubmissionsByAssignment", json!({ "assignmentId": "assign_1" })),
        (&student, "getStudentGrades", json!({})),
        (&parent, "getLinkedStudents", json!({})),
        (&student, "listNotifications", json!({})),
        (&admin, "listUsers", json!({})),
        (&admin, "exportMissingCSV", json!({})),
        (&teacher, "getTeacherDashboardStats", json!({})),
        (&student, "getStudentDashboardStats", json!({})),
        (&teacher, "getGradebookData", json!({})),
    ];
    for (token, action, params) in calls {
        side.ok(Some(token), action, params);
    }
}

#[test]
fn role_gates_return_forbidden_and_unauthorized() {
    let mut side = Sidecar::start();
    let student = side.login("student@demo.com");

    let resp = side.fail(Some(&student), "listUsers", json!({}));
    assert_eq!(resp["errorCode"], "FORBIDDEN");

    let resp = side.fail(Some("bogus-token"), "listUsers", json!({}));
    assert_eq!(resp["errorCode"], "UNAUTHORIZED");

    let route = side.ok(Some(&student), "resolveRoute", json!({ "path": "/admin/users" }));
    assert_eq!(route["kind"], "redirect");
    assert_eq!(route["to"], "/student");
    assert_eq!(route["reason"], "forbidden");
}
