use serde_json::json;

use crate::api::audit;
use crate::api::error::ApiError;
use crate::api::helpers::{
    enrich, get_bool, get_present_str, get_query, get_required_str, get_str, page_params, to_json,
};
use crate::api::session::require_role;
use crate::api::types::{AppState, Request};
use crate::models::{
    Assignment, Class, ClassSubject, Enrollment, Role, SubjectCatalogEntry, User,
};
use crate::store::Store;
use crate::util::{compare_levels, generate_id, now_iso, paginate};

/// Catalog and class columns shown next to a class subject.
struct Listing<'a> {
    catalog: Vec<SubjectCatalogEntry>,
    classes: Vec<Class>,
    users: Vec<User>,
    store: &'a Store,
}

impl<'a> Listing<'a> {
    fn load(store: &'a Store) -> anyhow::Result<Listing<'a>> {
        Ok(Listing {
            catalog: store.all()?,
            classes: store.all()?,
            users: store.all()?,
            store,
        })
    }

    fn describe(&self, cs: &ClassSubject) -> serde_json::Value {
        let entry = self.catalog.iter().find(|c| c.id == cs.catalog_id);
        let class = self.classes.iter().find(|c| c.id == cs.class_id);
        let teacher = self.users.iter().find(|u| u.id == cs.teacher_id);
        json!({
            "subjectCode": entry.map(|c| c.subject_code.as_str()).unwrap_or(""),
            "subjectName": entry.map(|c| c.subject_name.as_str()).unwrap_or(""),
            "category": entry.map(|c| c.category.as_str()).unwrap_or(""),
            "className": class.map(|c| c.name.as_str()).unwrap_or(""),
            "classLevel": class.map(|c| c.level.as_str()).unwrap_or(""),
            "teacherName": teacher.map(|u| u.name.as_str()).unwrap_or(""),
        })
    }

    fn counts(&self, cs: &ClassSubject) -> anyhow::Result<(usize, usize)> {
        let assignments = self
            .store
            .filter(|a: &Assignment| a.class_subject_id == cs.id && a.is_active)?
            .len();
        let students = self
            .store
            .filter(|e: &Enrollment| e.class_id == cs.class_id && e.is_active)?
            .len();
        Ok((assignments, students))
    }
}

fn require_active_teacher(store: &Store, teacher_id: &str) -> Result<User, ApiError> {
    store
        .find(|u: &User| u.id == teacher_id && u.role == Role::Teacher && u.is_active)?
        .ok_or_else(|| ApiError::NotFound("teacher not found".into()))
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Admin, Role::Teacher])?;

    let mut rows = store.filter(|cs: &ClassSubject| cs.is_active)?;
    if let Some(class_id) = get_str(req, "classId") {
        rows.retain(|cs| cs.class_id == class_id);
    }
    if user.role == Role::Teacher {
        rows.retain(|cs| cs.teacher_id == user.id);
    }

    let listing = Listing::load(store)?;
    let enriched = rows
        .iter()
        .map(|cs| enrich(cs, listing.describe(cs)))
        .collect::<Result<Vec<_>, _>>()?;
    let (page, page_size) = page_params(req, 50);
    to_json(&paginate(enriched, page, page_size))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let admin = require_role(store, req, &[Role::Admin])?;
    let (Some(class_id), Some(catalog_id)) = (get_str(req, "classId"), get_str(req, "catalogId")) else {
        return Err(ApiError::BadParams("classId and catalogId are required".into()));
    };
    if store.get::<Class>(&class_id)?.filter(|c| c.is_active).is_none() {
        return Err(ApiError::not_found("class"));
    }
    if store
        .get::<SubjectCatalogEntry>(&catalog_id)?
        .filter(|c| c.is_active)
        .is_none()
    {
        return Err(ApiError::not_found("catalog entry"));
    }
    let duplicate = !store.is_unique(
        |cs: &ClassSubject| cs.class_id == class_id && cs.catalog_id == catalog_id,
        None,
    )?;
    if duplicate {
        return Err(ApiError::Conflict("this subject is already assigned to the class".into()));
    }
    let teacher_id = get_str(req, "teacherId").unwrap_or_default();
    if !teacher_id.is_empty() {
        require_active_teacher(store, &teacher_id)?;
    }

    let cs = ClassSubject {
        id: generate_id(),
        class_id,
        catalog_id,
        teacher_id,
        created_at: now_iso(),
        is_active: true,
    };
    store.insert(&cs)?;
    audit::record(store, &admin, "class_subject.create", "class_subject", &cs.id, &cs.class_id)?;
    to_json(&cs)
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let admin = require_role(store, req, &[Role::Admin])?;
    let id = get_required_str(req, "classSubjectId")?;
    let mut cs = store
        .get::<ClassSubject>(&id)?
        .ok_or_else(|| ApiError::not_found("class subject"))?;

    if let Some(t) = get_present_str(req, "teacherId") {
        if !t.is_empty() {
            require_active_teacher(store, &t)?;
        }
        cs.teacher_id = t;
    }
    if let Some(active) = get_bool(req, "isActive") {
        cs.is_active = active;
    }
    if cs.is_active {
        let duplicate = !store.is_unique(
            |other: &ClassSubject| other.class_id == cs.class_id && other.catalog_id == cs.catalog_id,
            Some(id.as_str()),
        )?;
        if duplicate {
            return Err(ApiError::Conflict("this subject is already assigned to the class".into()));
        }
    }

    let updated = store
        .update::<ClassSubject>(&id, |row| *row = cs)?
        .ok_or_else(|| ApiError::not_found("class subject"))?;
    audit::record(store, &admin, "class_subject.update", "class_subject", &updated.id, &updated.teacher_id)?;
    to_json(&updated)
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let admin = require_role(store, req, &[Role::Admin])?;
    let id = get_required_str(req, "classSubjectId")?;
    store
        .soft_delete::<ClassSubject>(&id)?
        .ok_or_else(|| ApiError::not_found("class subject"))?;
    audit::record(store, &admin, "class_subject.delete", "class_subject", &id, "")?;
    Ok(serde_json::Value::Null)
}

fn handle_assign_teacher(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let admin = require_role(store, req, &[Role::Admin])?;
    let (Some(id), Some(teacher_id)) = (get_str(req, "classSubjectId"), get_str(req, "teacherId")) else {
        return Err(ApiError::BadParams("classSubjectId and teacherId are required".into()));
    };
    let teacher = require_active_teacher(store, &teacher_id)?;
    store
        .update::<ClassSubject>(&id, |cs| cs.teacher_id = teacher.id.clone())?
        .ok_or_else(|| ApiError::not_found("class subject"))?;
    audit::record(store, &admin, "class_subject.assign_teacher", "class_subject", &id, &teacher.id)?;
    Ok(serde_json::Value::Null)
}

fn handle_list_teachers(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    require_role(store, req, &[Role::Admin])?;
    let mut teachers = store.filter(|u: &User| u.role == Role::Teacher && u.is_active)?;
    if let Some(q) = get_query(req) {
        teachers.retain(|t| t.name.to_lowercase().contains(&q) || t.email.to_lowercase().contains(&q));
    }
    Ok(json!(teachers
        .iter()
        .map(|t| json!({ "id": t.id, "name": t.name, "email": t.email }))
        .collect::<Vec<_>>()))
}

fn handle_list_mine(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher])?;
    let mut rows = store.filter(|cs: &ClassSubject| cs.teacher_id == user.id && cs.is_active)?;
    if let Some(class_id) = get_str(req, "classId") {
        rows.retain(|cs| cs.class_id == class_id);
    }

    let listing = Listing::load(store)?;
    let mut enriched = Vec::with_capacity(rows.len());
    for cs in &rows {
        let (assignment_count, student_count) = listing.counts(cs)?;
        let mut extra = listing.describe(cs);
        extra["assignmentCount"] = json!(assignment_count);
        extra["studentCount"] = json!(student_count);
        enriched.push(enrich(cs, extra)?);
    }
    let text = |v: &serde_json::Value, key: &str| v[key].as_str().unwrap_or("").to_string();
    enriched.sort_by(|a, b| {
        compare_levels(&text(a, "className"), &text(b, "className"))
            .then_with(|| text(a, "subjectCode").cmp(&text(b, "subjectCode")))
    });

    let (page, page_size) = page_params(req, 50);
    to_json(&paginate(enriched, page, page_size))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "listClassSubjects" => Some(handle_list(state, req)),
        "createClassSubject" => Some(handle_create(state, req)),
        "updateClassSubject" => Some(handle_update(state, req)),
        "deleteClassSubject" => Some(handle_delete(state, req)),
        "assignTeacherToClassSubject" => Some(handle_assign_teacher(state, req)),
        "listTeachers" => Some(handle_list_teachers(state, req)),
        "listMyClassSubjects" => Some(handle_list_mine(state, req)),
        _ => None,
    }
}
