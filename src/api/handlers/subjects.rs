use serde_json::json;

use crate::api::error::ApiError;
use crate::api::helpers::{get_required_str, get_str, to_json};
use crate::api::scope::enrolled_class_ids;
use crate::api::session::{current_user, require_role};
use crate::api::types::{AppState, Request};
use crate::models::{Class, ClassSubject, Role, Subject, SubjectCatalogEntry};
use crate::util::{generate_id, now_iso};

/// Categories listed ahead of the rest when templates are grouped.
const MAIN_CATEGORIES: [&str; 6] = [
    "Language",
    "Science-Math",
    "Social",
    "Science",
    "Mathematics",
    "Health-PE",
];

const FALLBACK_TEMPLATES: [(&str, &str, &str); 9] = [
    ("th", "Thai", "Language"),
    ("en", "English", "Language"),
    ("ma", "Mathematics", "Science-Math"),
    ("sci", "Science", "Science-Math"),
    ("soc", "Social Studies", "Social"),
    ("his", "History", "Social"),
    ("pe", "Health and Physical Education", "Health-PE"),
    ("art", "Arts and Music", "Arts"),
    ("work", "Careers and Technology", "Careers"),
];

fn handle_create_subject(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = require_role(store, req, &[Role::Teacher, Role::Admin])?;
    let name = get_required_str(req, "name")?.trim().to_string();
    let class_id = get_str(req, "classId").unwrap_or_default();
    if !class_id.is_empty() && store.get::<Class>(&class_id)?.filter(|c| c.is_active).is_none() {
        return Err(ApiError::not_found("class"));
    }

    let subject = Subject {
        id: generate_id(),
        class_id,
        class_subject_id: None,
        name,
        teacher_id: if user.role == Role::Teacher {
            user.id.clone()
        } else {
            get_str(req, "teacherId").unwrap_or_default()
        },
        created_at: now_iso(),
        is_active: true,
    };
    store.insert(&subject)?;
    to_json(&subject)
}

/// Legacy subjects plus class subjects shaped like subjects. A legacy
/// subject that mirrors a listed class subject is shown once.
fn handle_list_subjects(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let user = current_user(store, req)?;

    let class_subjects = store.filter(|cs: &ClassSubject| cs.is_active)?;
    let catalog = store.all::<SubjectCatalogEntry>()?;
    let mut rows: Vec<(String, String, serde_json::Value)> = Vec::new();

    for s in store.filter(|s: &Subject| s.is_active)? {
        let mirrored = s
            .class_subject_id
            .as_ref()
            .is_some_and(|id| class_subjects.iter().any(|cs| &cs.id == id));
        if !mirrored {
            rows.push((s.class_id.clone(), s.teacher_id.clone(), to_json(&s)?));
        }
    }
    for cs in &class_subjects {
        let entry = catalog.iter().find(|c| c.id == cs.catalog_id);
        rows.push((
            cs.class_id.clone(),
            cs.teacher_id.clone(),
            json!({
                "id": cs.id,
                "name": entry.map(|c| c.subject_name.as_str()).unwrap_or("Unknown subject"),
                "code": entry.map(|c| c.subject_code.as_str()).unwrap_or(""),
                "classId": cs.class_id,
                "teacherId": cs.teacher_id,
                "isClassSubject": true,
                "isActive": true,
            }),
        ));
    }

    if let Some(u) = &user {
        match u.role {
            Role::Teacher => rows.retain(|(_, teacher, _)| teacher == &u.id),
            Role::Student => {
                let mine = enrolled_class_ids(store, &u.id)?;
                rows.retain(|(class, _, _)| class.is_empty() || mine.contains(class));
            }
            Role::Parent | Role::Admin => {}
        }
    }
    if let Some(class_id) = get_str(req, "classId") {
        rows.retain(|(class, _, _)| class == &class_id);
    }

    Ok(json!(rows.into_iter().map(|(_, _, v)| v).collect::<Vec<_>>()))
}

fn handle_list_subject_templates(state: &mut AppState) -> Result<serde_json::Value, ApiError> {
    let store = state.store()?;
    let catalog = store.filter(|c: &SubjectCatalogEntry| c.is_active)?;

    let templates: Vec<(String, String, String)> = if catalog.is_empty() {
        FALLBACK_TEMPLATES
            .iter()
            .map(|(id, name, cat)| (id.to_string(), name.to_string(), cat.to_string()))
            .collect()
    } else {
        catalog
            .into_iter()
            .map(|c| {
                let category = if c.category.is_empty() { "Other".to_string() } else { c.category };
                (c.id, c.subject_name, category)
            })
            .collect()
    };

    let mut categories: Vec<String> = MAIN_CATEGORIES
        .iter()
        .filter(|main| templates.iter().any(|(_, _, cat)| cat == *main))
        .map(|main| main.to_string())
        .collect();
    for (_, _, cat) in &templates {
        if !categories.contains(cat) {
            categories.push(cat.clone());
        }
    }

    let item = |(id, name, category): &(String, String, String)| {
        json!({ "id": id, "name": name, "category": category })
    };
    let grouped: Vec<serde_json::Value> = categories
        .iter()
        .map(|cat| {
            json!({
                "category": cat,
                "subjects": templates
                    .iter()
                    .filter(|(_, _, c)| c == cat)
                    .map(item)
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    Ok(json!({
        "templates": templates.iter().map(item).collect::<Vec<_>>(),
        "grouped": grouped,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Result<serde_json::Value, ApiError>> {
    match req.action.as_str() {
        "createSubject" => Some(handle_create_subject(state, req)),
        "listSubjects" => Some(handle_list_subjects(state, req)),
        "listSubjectTemplates" => Some(handle_list_subject_templates(state)),
        _ => None,
    }
}
