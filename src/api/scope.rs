//! Ownership and visibility lookups shared by the handler families.

use std::collections::HashSet;

use crate::api::error::ApiError;
use crate::models::{
    Assignment, Class, ClassSubject, Enrollment, ParentLink, Role, Subject, SubjectCatalogEntry,
    Term, User,
};
use crate::store::Store;

/// Subjects a teacher teaches, through either the legacy or the catalog model.
pub struct TeacherScope {
    pub subjects: Vec<Subject>,
    pub class_subjects: Vec<ClassSubject>,
    subject_ids: HashSet<String>,
    class_subject_ids: HashSet<String>,
}

impl TeacherScope {
    pub fn load(store: &Store, teacher_id: &str) -> anyhow::Result<TeacherScope> {
        let subjects = store.filter(|s: &Subject| s.teacher_id == teacher_id && s.is_active)?;
        let class_subjects =
            store.filter(|cs: &ClassSubject| cs.teacher_id == teacher_id && cs.is_active)?;
        Ok(TeacherScope {
            subject_ids: subjects.iter().map(|s| s.id.clone()).collect(),
            class_subject_ids: class_subjects.iter().map(|cs| cs.id.clone()).collect(),
            subjects,
            class_subjects,
        })
    }

    pub fn owns(&self, a: &Assignment) -> bool {
        (!a.class_subject_id.is_empty() && self.class_subject_ids.contains(&a.class_subject_id))
            || (!a.subject_id.is_empty() && self.subject_ids.contains(&a.subject_id))
    }

    /// Distinct classes reached through taught subjects, in first-seen order.
    pub fn class_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let ids = self
            .subjects
            .iter()
            .map(|s| &s.class_id)
            .chain(self.class_subjects.iter().map(|cs| &cs.class_id));
        for id in ids {
            if !id.is_empty() && !out.contains(id) {
                out.push(id.clone());
            }
        }
        out
    }
}

/// Teacher responsible for an assignment: the class subject's teacher when
/// the assignment belongs to one, otherwise the legacy subject's.
pub fn assignment_teacher(store: &Store, a: &Assignment) -> anyhow::Result<Option<String>> {
    if !a.class_subject_id.is_empty() {
        return Ok(store
            .get::<ClassSubject>(&a.class_subject_id)?
            .map(|cs| cs.teacher_id));
    }
    if !a.subject_id.is_empty() {
        return Ok(store.get::<Subject>(&a.subject_id)?.map(|s| s.teacher_id));
    }
    Ok(None)
}

pub fn require_assignment_owner(store: &Store, user: &User, a: &Assignment) -> Result<(), ApiError> {
    match assignment_teacher(store, a)? {
        Some(teacher_id) if teacher_id == user.id => Ok(()),
        _ => {
            tracing::warn!(user_id = %user.id, assignment_id = %a.id, "not the assignment owner");
            Err(ApiError::Forbidden("this subject is not yours".into()))
        }
    }
}

pub fn catalog_name(store: &Store, class_subject: &ClassSubject) -> anyhow::Result<Option<String>> {
    Ok(store
        .get::<SubjectCatalogEntry>(&class_subject.catalog_id)?
        .map(|c| c.subject_name))
}

/// Display name of the subject an assignment belongs to.
pub fn subject_name(store: &Store, a: &Assignment) -> anyhow::Result<Option<String>> {
    if !a.class_subject_id.is_empty() {
        if let Some(cs) = store.get::<ClassSubject>(&a.class_subject_id)? {
            if let Some(name) = catalog_name(store, &cs)? {
                return Ok(Some(name));
            }
        }
    }
    if !a.subject_id.is_empty() {
        return Ok(store.get::<Subject>(&a.subject_id)?.map(|s| s.name));
    }
    Ok(None)
}

/// Class the assignment is given to.
pub fn assignment_class_id(store: &Store, a: &Assignment) -> anyhow::Result<Option<String>> {
    if !a.class_subject_id.is_empty() {
        if let Some(cs) = store.get::<ClassSubject>(&a.class_subject_id)? {
            return Ok(Some(cs.class_id));
        }
    }
    if !a.subject_id.is_empty() {
        return Ok(store
            .get::<Subject>(&a.subject_id)?
            .map(|s| s.class_id)
            .filter(|id| !id.is_empty()));
    }
    Ok(None)
}

pub fn enrolled_class_ids(store: &Store, student_id: &str) -> anyhow::Result<Vec<String>> {
    Ok(store
        .filter(|e: &Enrollment| e.student_id == student_id && e.is_active)?
        .into_iter()
        .map(|e| e.class_id)
        .collect())
}

/// A student's own classes: the primary class when set, else enrollments.
pub fn student_classes(store: &Store, student: &User) -> anyhow::Result<Vec<Class>> {
    if let Some(primary) = student.primary_class_id.as_deref().filter(|s| !s.is_empty()) {
        return store.filter(|c: &Class| c.id == primary && c.is_active);
    }
    let ids = enrolled_class_ids(store, &student.id)?;
    store.filter(|c: &Class| ids.contains(&c.id) && c.is_active)
}

pub fn is_linked_parent(store: &Store, parent_id: &str, student_id: &str) -> anyhow::Result<bool> {
    Ok(store
        .find(|p: &ParentLink| p.parent_id == parent_id && p.student_id == student_id && p.is_active)?
        .is_some())
}

/// Students enrolled in a class, in enrollment order.
pub fn class_students(store: &Store, class_id: &str) -> anyhow::Result<Vec<User>> {
    let enrollments = store.filter(|e: &Enrollment| e.class_id == class_id && e.is_active)?;
    let users = store.all::<User>()?;
    Ok(enrollments
        .iter()
        .filter_map(|e| users.iter().find(|u| u.id == e.student_id).cloned())
        .collect())
}

/// `term/year`, or `-` when the term is unknown.
pub fn term_label(term: Option<&Term>) -> String {
    term.map(|t| format!("{}/{}", t.term, t.academic_year))
        .unwrap_or_else(|| "-".to_string())
}

/// Student-scoped reads: the student, a linked parent, teachers and admins.
pub fn require_student_access(store: &Store, user: &User, student_id: &str) -> Result<(), ApiError> {
    let allowed = match user.role {
        Role::Teacher | Role::Admin => true,
        Role::Student => user.id == student_id,
        Role::Parent => is_linked_parent(store, &user.id, student_id)?,
    };
    if allowed {
        return Ok(());
    }
    tracing::warn!(user_id = %user.id, student_id, "student data access denied");
    Err(ApiError::Forbidden("no access to this student".into()))
}
