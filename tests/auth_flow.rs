mod support;

use serde_json::json;
use support::Sidecar;

#[test]
fn register_login_me_logout() {
    let mut side = Sidecar::start();

    let created = side.ok(
        None,
        "register",
        json!({
            "role": "student",
            "name": "New Student",
            "email": "  New.Student@Example.com ",
            "password": "secret",
            "roomJoinCode": "roomm31",
        }),
    );
    let user_id = created["userId"].as_str().expect("userId").to_string();

    let dup = side.fail(
        None,
        "register",
        json!({ "role": "parent", "name": "Dup", "email": "new.student@example.com", "password": "x" }),
    );
    assert_eq!(dup["errorCode"], "CONFLICT");

    let wrong = side.fail(
        None,
        "login",
        json!({ "email": "new.student@example.com", "password": "nope" }),
    );
    assert_eq!(wrong["errorCode"], "UNAUTHORIZED");

    let missing = side.fail(
        None,
        "login",
        json!({ "email": "ghost@example.com", "password": "secret" }),
    );
    assert_eq!(missing["errorCode"], "NOT_FOUND");

    let login = side.ok(
        None,
        "login",
        json!({ "email": "new.student@example.com", "password": "secret" }),
    );
    assert_eq!(login["user"]["id"], user_id.as_str());
    assert_eq!(login["token"].as_str().map(str::len), Some(64));
    assert!(login["expiresAt"].as_str().is_some());
    assert!(login["user"].get("passwordHash").is_none());

    // stdio remembers the last login
    let me = side.ok(None, "me", json!({}));
    assert_eq!(me["user"]["primaryClassId"], "class_1");

    side.ok(None, "logout", json!({}));
    let after = side.fail(None, "me", json!({}));
    assert_eq!(after["errorCode"], "UNAUTHORIZED");

    let token = login["token"].as_str().expect("token");
    let revoked = side.fail(Some(token), "me", json!({}));
    assert_eq!(revoked["errorCode"], "UNAUTHORIZED");
}

#[test]
fn registration_rules() {
    let mut side = Sidecar::start();

    let admin = side.fail(
        None,
        "register",
        json!({ "role": "admin", "name": "A", "email": "a@example.com", "password": "x" }),
    );
    assert_eq!(admin["errorCode"], "FORBIDDEN");

    let no_class = side.fail(
        None,
        "register",
        json!({ "role": "student", "name": "S", "email": "s@example.com", "password": "x" }),
    );
    assert_eq!(no_class["errorCode"], "BAD_PARAMS");

    let bad_email = side.fail(
        None,
        "register",
        json!({ "role": "teacher", "name": "T", "email": "not-an-email", "password": "x" }),
    );
    assert_eq!(bad_email["errorCode"], "BAD_PARAMS");

    let by_level = side.ok(
        None,
        "register",
        json!({ "role": "student", "name": "S", "email": "s@example.com", "password": "x", "level": "P.1", "room": "2" }),
    );
    assert!(by_level["userId"].as_str().is_some());

    let teacher = side.ok(
        None,
        "register",
        json!({ "role": "teacher", "name": "T", "email": "t@example.com", "password": "x", "teacherSubjects": ["Art"] }),
    );
    assert!(teacher["userId"].as_str().is_some());
}
