mod support;

use serde_json::json;
use support::Sidecar;

#[test]
fn catalog_users_and_audit_trail() {
    let mut side = Sidecar::start();
    let admin = side.login("admin@demo.com");

    let entry = side.ok(
        Some(&admin),
        "createSubjectCatalog",
        json!({ "subjectCode": "ART21101", "subjectName": "Visual Arts" }),
    );
    assert_eq!(entry["category"], "Other");
    let dup = side.fail(
        Some(&admin),
        "createSubjectCatalog",
        json!({ "subjectCode": "ART21101", "subjectName": "Again" }),
    );
    assert_eq!(dup["errorCode"], "CONFLICT");

    let teachers = side.ok(Some(&admin), "listUsers", json!({ "roleFilter": "teacher" }));
    assert_eq!(teachers["total"], 2);
    assert!(teachers["data"][0].get("passwordHash").is_none());
    let found = side.ok(Some(&admin), "listUsers", json!({ "query": "SOMCHAI" }));
    assert_eq!(found["total"], 1);

    let own = side.fail(
        Some(&admin),
        "updateUser",
        json!({ "userId": "user_admin1", "isActive": false }),
    );
    assert_eq!(own["errorCode"], "BAD_PARAMS");
    let ghost = side.fail(Some(&admin), "updateUser", json!({ "userId": "nobody", "name": "x" }));
    assert_eq!(ghost["errorCode"], "NOT_FOUND");

    let disabled = side.ok(
        Some(&admin),
        "updateUser",
        json!({ "userId": "user_teacher2", "isActive": false }),
    );
    assert_eq!(disabled["isActive"], false);
    let login = side.fail(
        None,
        "login",
        json!({ "email": "teacher2@demo.com", "password": "1234" }),
    );
    assert_eq!(login["errorCode"], "NOT_FOUND");

    let logs = side.ok(Some(&admin), "getAuditLogs", json!({}));
    let actions: Vec<&str> = logs["data"]
        .as_array()
        .expect("logs")
        .iter()
        .filter_map(|l| l["action"].as_str())
        .collect();
    assert_eq!(actions.first(), Some(&"user.update"));
    assert!(actions.contains(&"catalog.create"));

    let stats = side.ok(Some(&admin), "adminGetDashboardStats", json!({}));
    assert_eq!(stats["stats"]["teachers"], 1);
    assert_eq!(stats["stats"]["classes"], 37);
    assert_eq!(stats["recentLogs"][0]["action"], "user.update");
}

#[test]
fn backup_restore_and_reset() {
    let mut side = Sidecar::start();
    let admin = side.login("admin@demo.com");

    let snapshot = side.ok(Some(&admin), "backupData", json!({}));
    assert_eq!(snapshot["classes"].as_array().map(Vec::len), Some(37));
    assert_eq!(snapshot["config"]["schoolName"], "Demo School");

    let class = side.ok(Some(&admin), "adminCreateClass", json!({ "level": "M.5", "room": "1" }));
    let class_id = class["id"].as_str().expect("class id").to_string();

    let invalid = side.fail(
        Some(&admin),
        "restoreData",
        json!({ "data": { "users": [{ "id": "broken" }] } }),
    );
    assert_eq!(invalid["errorCode"], "BAD_PARAMS");
    // a rejected restore leaves the store untouched
    side.ok(Some(&admin), "getClass", json!({ "classId": class_id }));

    let restored = side.ok(Some(&admin), "restoreData", json!({ "data": snapshot }));
    assert_eq!(restored["collections"], 15);
    let gone = side.fail(Some(&admin), "getClass", json!({ "classId": class_id }));
    assert_eq!(gone["errorCode"], "NOT_FOUND");

    let bundle = side.workspace.path().join("out").join("backup.zip");
    let exported = side.ok(
        Some(&admin),
        "exportBackupBundle",
        json!({ "path": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], "homework-snapshot-v1");
    assert!(bundle.is_file());

    side.ok(
        Some(&admin),
        "createSubjectCatalog",
        json!({ "subjectCode": "TMP00001", "subjectName": "Temporary" }),
    );
    let imported = side.ok(
        Some(&admin),
        "importBackupBundle",
        json!({ "path": bundle.to_string_lossy() }),
    );
    assert_eq!(imported["bundleFormatDetected"], "homework-snapshot-v1");
    let catalog = side.ok(Some(&admin), "listSubjectCatalog", json!({ "query": "TMP00001" }));
    assert_eq!(catalog["total"], 0);

    let nope = side.workspace.path().join("nope.zip");
    let missing = side.fail(
        Some(&admin),
        "importBackupBundle",
        json!({ "path": nope.to_string_lossy() }),
    );
    assert_eq!(missing["errorCode"], "BAD_PARAMS");

    side.ok(Some(&admin), "updateUser", json!({ "userId": "user_teacher2", "name": "Renamed" }));
    side.ok(Some(&admin), "resetDemoData", json!({}));
    // sessions are wiped with everything else
    let stale = side.fail(Some(&admin), "listUsers", json!({}));
    assert_eq!(stale["errorCode"], "UNAUTHORIZED");

    let admin = side.login("admin@demo.com");
    let teachers = side.ok(Some(&admin), "listUsers", json!({ "query": "Manee" }));
    assert_eq!(teachers["total"], 1);
}

#[test]
fn class_subject_assignment_by_admin() {
    let mut side = Sidecar::start();
    let admin = side.login("admin@demo.com");

    let dup = side.fail(
        Some(&admin),
        "createClassSubject",
        json!({ "classId": "class_1", "catalogId": "cat_1", "teacherId": "user_teacher1" }),
    );
    assert_eq!(dup["errorCode"], "CONFLICT");

    let created = side.ok(
        Some(&admin),
        "createClassSubject",
        json!({ "classId": "class_3", "catalogId": "cat_2", "teacherId": "user_teacher2" }),
    );
    let cs_id = created["id"].as_str().expect("id").to_string();

    let bad_teacher = side.fail(
        Some(&admin),
        "assignTeacherToClassSubject",
        json!({ "classSubjectId": cs_id, "teacherId": "user_student1" }),
    );
    assert_eq!(bad_teacher["errorCode"], "NOT_FOUND");

    side.ok(
        Some(&admin),
        "assignTeacherToClassSubject",
        json!({ "classSubjectId": cs_id, "teacherId": "user_teacher1" }),
    );
    let teacher = side.login("teacher@demo.com");
    let mine = side.ok(Some(&teacher), "listMyClassSubjects", json!({}));
    let ids: Vec<&str> = mine["data"]
        .as_array()
        .expect("rows")
        .iter()
        .filter_map(|r| r["id"].as_str())
        .collect();
    assert!(ids.contains(&cs_id.as_str()));
}
