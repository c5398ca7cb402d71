use chrono::{Duration, Utc};
use serde_json::json;

use crate::api::error::ApiError;
use crate::api::helpers::{get_array, get_required_str, get_str};
use crate::api::session::require_user;
use crate::api::types::{AppState, Request};
use crate::models::{Class, Enrollment, Role, Session, TeacherProfile, User};
use crate::util::{
    generate_id, generate_salt, generate_token, hash_password, is_valid_email, normalize_email,
    now_iso, to_iso,
};

const SESSION_DAYS: i64 = 7;

fn handle_register(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let (Some(name), Some(email), Some(password)) = (
        get_str(req, "name"),
        get_str(req, "email"),
        get_str(req, "password"),
    ) else {
        return Err(ApiError::BadParams("name, email and password are required".into()));
    };

    let role = match get_str(req, "role") {
        Some(raw) => Role::parse(&raw).ok_or_else(|| ApiError::BadParams(format!("unknown role: {raw}")))?,
        None => Role::Student,
    };
    if role == Role::Admin {
        return Err(ApiError::Forbidden("admin accounts cannot be self-registered".into()));
    }

    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        return Err(ApiError::BadParams("invalid email address".into()));
    }

    let primary_class = if role == Role::Student {
        Some(resolve_student_class(store, req)?)
    } else {
        None
    };

    if !store.is_unique(|u: &User| u.email == email, None)? {
        return Err(ApiError::Conflict("email is already registered".into()));
    }

    let salt = generate_salt();
    let preferred_subjects = if role == Role::Teacher {
        get_array(req, "teacherSubjects")
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    } else {
        Vec::new()
    };
    let user = User {
        id: generate_id(),
        role,
        name: name.trim().to_string(),
        email,
        password_hash: hash_password(&password, &salt),
        salt,
        primary_class_id: primary_class.as_ref().map(|c| c.id.clone()),
        teacher_profile: TeacherProfile { preferred_subjects },
        created_at: now_iso(),
        is_active: true,
    };
    store.insert(&user)?;

    if let Some(class) = primary_class {
        store.insert(&Enrollment {
            id: generate_id(),
            class_id: class.id,
            student_id: user.id.clone(),
            created_at: now_iso(),
            is_active: true,
        })?;
    }

    tracing::info!(user_id = %user.id, role = role.as_str(), "registered");
    Ok(json!({ "userId": user.id }))
}

/// Students pick their class by room code or by level and room.
fn resolve_student_class(store: &crate::store::Store, req: &Request) -> Result<Class, ApiError> {
    if let Some(code) = get_str(req, "roomJoinCode") {
        let code = code.trim().to_uppercase();
        return store
            .find(|c: &Class| c.room_join_code.eq_ignore_ascii_case(&code) && c.is_active)?
            .ok_or_else(|| ApiError::NotFound("no class matches that room code".into()));
    }
    if let (Some(level), Some(room)) = (get_str(req, "level"), get_str(req, "room")) {
        return store
            .find(|c: &Class| c.level == level && c.room == room && c.is_active)?
            .ok_or_else(|| ApiError::NotFound(format!("class {level}/{room} not found")));
    }
    Err(ApiError::BadParams("students must choose a class".into()))
}

fn handle_login(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let email = normalize_email(&get_required_str(req, "email")?);
    let password = get_required_str(req, "password")?;

    let user = store
        .find(|u: &User| u.email == email && u.is_active)?
        .ok_or_else(|| ApiError::NotFound("account not found".into()))?;
    if hash_password(&password, &user.salt) != user.password_hash {
        tracing::warn!(user_id = %user.id, "login rejected");
        return Err(ApiError::Unauthorized("wrong password".into()));
    }

    let now = Utc::now();
    let session = Session {
        token: generate_token(),
        user_id: user.id.clone(),
        role: user.role,
        created_at: to_iso(now),
        expires_at: to_iso(now + Duration::days(SESSION_DAYS)),
        device_info: get_str(req, "deviceInfo").unwrap_or_else(|| "Unknown".to_string()),
        is_revoked: false,
    };
    store.insert(&session)?;
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "logged in");

    if state.remember_sessions {
        state.remembered_token = Some(session.token.clone());
    }
    Ok(json!({
        "token": session.token,
        "user": user.summary(),
        "expiresAt": session.expires_at,
    }))
}

fn handle_logout(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    if let Some(token) = req.token.as_deref().filter(|t| !t.is_empty()) {
        state
            .store()?
            .update::<Session>(token, |s| s.is_revoked = true)?;
    }
    state.remembered_token = None;
    Ok(serde_json::Value::Null)
}

fn handle_me(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let user = require_user(state.store()?, req)?;
    let mut summary = user.summary();
    if let Some(class_id) = &user.primary_class_id {
        summary["primaryClassId"] = json!(class_id);
    }
    Ok(json!({ "user": summary }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "register" => Some(handle_register(state, req)),
        "login" => Some(handle_login(state, req)),
        "logout" => Some(handle_logout(state, req)),
        "me" => Some(handle_me(state, req)),
        _ => None,
    }
}
