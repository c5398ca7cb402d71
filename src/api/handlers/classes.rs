use chrono::{Datelike, Utc};
use serde_json::json;
use std::collections::HashSet;

use crate::api::audit;
use crate::api::error::ApiError;
use crate::api::helpers::{
    enrich, get_bool, get_present_str, get_query, get_required_str, get_str, to_json,
};
use crate::api::scope::{
    class_students, enrolled_class_ids, student_classes, term_label, TeacherScope,
};
use crate::api::session::{require_role, require_user};
use crate::api::types::{AppState, Request};
use crate::models::{Class, Enrollment, Role, Term, User};
use crate::seed::academic_year;
use crate::store::Store;
use crate::util::{compare_levels, generate_code, generate_id, generate_room_code, now_iso};

const CODE_ATTEMPTS: usize = 100;

/// Draws codes until one is not taken, giving up after `CODE_ATTEMPTS`.
fn unused_code(
    taken: &HashSet<String>,
    what: &str,
    mut draw: impl FnMut() -> String,
) -> Result<String, ApiError> {
    (0..CODE_ATTEMPTS)
        .map(|_| draw())
        .find(|code| !taken.contains(code))
        .ok_or_else(|| ApiError::Conflict(format!("no free {what} left")))
}

/// Random `ROOMnnnn` code; a nearly full code space falls back to a scan.
fn free_room_code(taken: &HashSet<String>) -> Result<String, ApiError> {
    unused_code(taken, "room code", generate_room_code).or_else(|_| {
        (1000..10000)
            .map(|n| format!("ROOM{n}"))
            .find(|code| !taken.contains(code))
            .ok_or_else(|| ApiError::Conflict("no free room code left".into()))
    })
}

fn unique_codes(store: &Store) -> Result<(String, String), ApiError> {
    let classes = store.all::<Class>()?;
    let join_codes: HashSet<String> = classes.iter().map(|c| c.join_code.clone()).collect();
    let room_codes: HashSet<String> = classes.into_iter().map(|c| c.room_join_code).collect();
    Ok((
        unused_code(&join_codes, "join code", || generate_code(6))?,
        free_room_code(&room_codes)?,
    ))
}

/// Term matching the school config, used when a class is created without one.
fn current_term_id(store: &Store) -> anyhow::Result<String> {
    let cfg = store.config()?;
    Ok(store
        .find(|t: &Term| t.is_active && t.academic_year == cfg.academic_year && t.term == cfg.current_term)?
        .map(|t| t.id)
        .unwrap_or_default())
}

fn new_class(
    store: &Store,
    level: &str,
    room: &str,
    name: String,
    term_id: String,
    teacher_id: String,
) -> Result<Class, ApiError> {
    let (join_code, room_join_code) = unique_codes(store)?;
    let class = Class {
        id: generate_id(),
        name,
        level: level.to_string(),
        room: room.to_string(),
        term_id,
        teacher_id,
        join_code,
        room_join_code,
        created_at: now_iso(),
        is_active: true,
    };
    store.insert(&class)?;
    Ok(class)
}

/// Adds `termName` and `teacherName` for list views.
fn describe(class: &Class, terms: &[Term], users: &[User]) -> Result<serde_json::Value, ApiError> {
    let term = terms.iter().find(|t| t.id == class.term_id);
    let teacher = users
        .iter()
        .find(|u| !class.teacher_id.is_empty() && u.id == class.teacher_id);
    enrich(
        class,
        json!({
            "termName": term_label(term),
            "teacherName": teacher.map(|u| u.name.as_str()).unwrap_or("-"),
        }),
    )
}

fn handle_create_class(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher, Role::Admin])?;

    let level = get_str(req, "level").unwrap_or_default();
    let room = get_str(req, "room").unwrap_or_default();
    let name = if !level.is_empty() && !room.is_empty() {
        format!("{level}/{room}")
    } else {
        get_required_str(req, "name")?.trim().to_string()
    };
    let term_id = match get_str(req, "termId") {
        Some(id) => id,
        None => current_term_id(store)?,
    };
    let teacher_id = if user.role == Role::Teacher {
        user.id.clone()
    } else {
        get_str(req, "homeroomTeacherId").unwrap_or_default()
    };

    let class = new_class(store, &level, &room, name, term_id, teacher_id)?;
    tracing::info!(class_id = %class.id, user_id = %user.id, "class created");
    to_json(&class)
}

fn handle_list_classes(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_user(store, req)?;
    let all = store.all::<Class>()?;

    let classes: Vec<Class> = match user.role {
        Role::Admin => all.into_iter().filter(|c| c.is_active).collect(),
        Role::Teacher => {
            let mut visible: Vec<String> = all
                .iter()
                .filter(|c| c.teacher_id == user.id)
                .map(|c| c.id.clone())
                .collect();
            visible.extend(TeacherScope::load(store, &user.id)?.class_ids());
            all.into_iter()
                .filter(|c| c.is_active && visible.contains(&c.id))
                .collect()
        }
        Role::Student => student_classes(store, &user)?,
        Role::Parent => Vec::new(),
    };

    let terms = store.all::<Term>()?;
    let users = store.all::<User>()?;
    let rows = classes
        .iter()
        .map(|c| describe(c, &terms, &users))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!(rows))
}

fn handle_join_class(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Student])?;
    let code = get_required_str(req, "joinCode")?.trim().to_uppercase();

    let class = store
        .find(|c: &Class| c.is_active && c.join_code.eq_ignore_ascii_case(&code))?
        .ok_or_else(|| ApiError::NotFound("no class uses that join code".into()))?;
    if enrolled_class_ids(store, &user.id)?.contains(&class.id) {
        return Err(ApiError::Conflict("already a member of this class".into()));
    }

    store.insert(&Enrollment {
        id: generate_id(),
        class_id: class.id.clone(),
        student_id: user.id.clone(),
        created_at: now_iso(),
        is_active: true,
    })?;
    Ok(json!({ "className": class.name }))
}

fn handle_get_class(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    require_user(store, req)?;
    let class_id = get_required_str(req, "classId")?;
    let class = store
        .get::<Class>(&class_id)?
        .filter(|c| c.is_active)
        .ok_or_else(|| ApiError::not_found("class"))?;

    let students: Vec<serde_json::Value> = class_students(store, &class.id)?
        .iter()
        .map(|s| json!({ "id": s.id, "name": s.name }))
        .collect();
    enrich(
        &class,
        json!({ "studentCount": students.len(), "students": students }),
    )
}

fn handle_admin_create_class(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let admin = require_role(store, req, &[Role::Admin])?;
    let level = get_required_str(req, "level")?.trim().to_string();
    let room = get_required_str(req, "room")?.trim().to_string();
    let term_id = match get_str(req, "termId") {
        Some(id) => id,
        None => current_term_id(store)?,
    };
    let teacher_id = get_str(req, "homeroomTeacherId").unwrap_or_default();

    let name = format!("{level}/{room}");
    let class = new_class(store, &level, &room, name, term_id, teacher_id)?;
    audit::record(store, &admin, "class.create", "class", &class.id, &class.name)?;
    to_json(&class)
}

fn handle_admin_update_class(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let admin = require_role(store, req, &[Role::Admin])?;
    let class_id = get_str(req, "classId")
        .or_else(|| get_str(req, "id"))
        .ok_or_else(|| ApiError::BadParams("missing classId".into()))?;

    let level = get_str(req, "level");
    let room = get_str(req, "room");
    let term_id = get_str(req, "termId");
    let homeroom = get_present_str(req, "homeroomTeacherId");

    let updated = store
        .update::<Class>(&class_id, |c| {
            if let Some(level) = &level {
                c.level = level.trim().to_string();
            }
            if let Some(room) = &room {
                c.room = room.trim().to_string();
            }
            if level.is_some() && room.is_some() {
                c.name = format!("{}/{}", c.level, c.room);
            }
            if let Some(term_id) = term_id {
                c.term_id = term_id;
            }
            if let Some(teacher_id) = homeroom {
                c.teacher_id = teacher_id;
            }
        })?
        .ok_or_else(|| ApiError::not_found("class"))?;
    audit::record(store, &admin, "class.update", "class", &updated.id, &updated.name)?;
    to_json(&updated)
}

fn handle_admin_delete_class(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let admin = require_role(store, req, &[Role::Admin])?;
    let class_id = get_required_str(req, "classId")?;
    let class = store
        .soft_delete::<Class>(&class_id)?
        .ok_or_else(|| ApiError::not_found("class"))?;
    audit::record(store, &admin, "class.delete", "class", &class.id, &class.name)?;
    Ok(serde_json::Value::Null)
}

fn handle_admin_list_classes(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    // Registration lists classes before anyone is signed in.
    if get_bool(req, "public") != Some(true) {
        require_role(store, req, &[Role::Admin])?;
    }

    let mut classes = store.filter(|c: &Class| c.is_active)?;
    if let Some(q) = get_query(req) {
        classes.retain(|c| c.name.to_lowercase().contains(&q));
    }
    if get_str(req, "sort").as_deref() == Some("name") {
        classes.sort_by(|a, b| compare_levels(&a.name, &b.name));
    } else {
        classes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    let terms = store.all::<Term>()?;
    let users = store.all::<User>()?;
    let rows = classes
        .iter()
        .map(|c| describe(c, &terms, &users))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!(rows))
}

fn handle_list_terms(state: &mut AppState) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let mut terms = store.all::<Term>()?;
    if terms.is_empty() {
        let year = academic_year(Utc::now().year()).to_string();
        terms = ["1", "2"]
            .iter()
            .map(|t| Term {
                id: format!("term_{year}_{t}"),
                academic_year: year.clone(),
                term: t.to_string(),
                start_date: String::new(),
                end_date: String::new(),
                is_active: true,
            })
            .collect();
    }
    terms.retain(|t| t.is_active);
    let year_of = |t: &Term| t.academic_year.trim().parse::<i64>().unwrap_or(0);
    terms.sort_by(|a, b| year_of(b).cmp(&year_of(a)).then_with(|| a.term.cmp(&b.term)));
    to_json(&terms)
}

fn handle_list_students(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    require_role(store, req, &[Role::Teacher, Role::Admin])?;
    let mut students = store.filter(|u: &User| u.role == Role::Student && u.is_active)?;
    if let Some(class_id) = get_str(req, "classId") {
        let members: Vec<String> = store
            .filter(|e: &Enrollment| e.class_id == class_id && e.is_active)?
            .into_iter()
            .map(|e| e.student_id)
            .collect();
        students.retain(|s| members.contains(&s.id));
    }
    let rows: Vec<serde_json::Value> = students
        .iter()
        .map(|s| {
            let mut v = s.summary();
            v["primaryClassId"] = json!(s.primary_class_id);
            v
        })
        .collect();
    Ok(json!(rows))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "createClass" => Some(handle_create_class(state, req)),
        "listClasses" => Some(handle_list_classes(state, req)),
        "joinClass" => Some(handle_join_class(state, req)),
        "getClass" => Some(handle_get_class(state, req)),
        "adminCreateClass" => Some(handle_admin_create_class(state, req)),
        "adminUpdateClass" => Some(handle_admin_update_class(state, req)),
        "adminDeleteClass" => Some(handle_admin_delete_class(state, req)),
        "adminListClasses" => Some(handle_admin_list_classes(state, req)),
        "listTerms" => Some(handle_list_terms(state)),
        "listStudents" => Some(handle_list_students(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_code_space_is_a_conflict() {
        let taken: HashSet<String> = HashSet::from(["ABCDEF".to_string()]);
        let err = unused_code(&taken, "join code", || "ABCDEF".to_string()).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let all_rooms: HashSet<String> = (1000..10000).map(|n| format!("ROOM{n}")).collect();
        assert!(matches!(free_room_code(&all_rooms), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn last_free_room_code_is_found() {
        let mut rooms: HashSet<String> = (1000..10000).map(|n| format!("ROOM{n}")).collect();
        rooms.remove("ROOM4321");
        assert_eq!(free_room_code(&rooms).expect("free code"), "ROOM4321");
    }
}
