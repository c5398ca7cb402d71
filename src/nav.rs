//! Page routing for the client shell: which page a path renders, and where
//! to send users who may not see it.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::Role;

pub struct Route {
    pub path: &'static str,
    pub page: &'static str,
    pub require_auth: bool,
    /// Empty means any role.
    pub roles: &'static [Role],
}

const fn public(path: &'static str, page: &'static str) -> Route {
    Route {
        path,
        page,
        require_auth: false,
        roles: &[],
    }
}

const fn only(path: &'static str, page: &'static str, roles: &'static [Role]) -> Route {
    Route {
        path,
        page,
        require_auth: true,
        roles,
    }
}

const TEACHER: &[Role] = &[Role::Teacher];
const STUDENT: &[Role] = &[Role::Student];
const PARENT: &[Role] = &[Role::Parent];
const ADMIN: &[Role] = &[Role::Admin];

pub const ROUTES: &[Route] = &[
    public("/", "landing"),
    public("/login", "login"),
    public("/register", "register"),
    only("/teacher", "teacher.dashboard", TEACHER),
    only("/teacher/classes", "teacher.classes", TEACHER),
    only("/teacher/class/:id", "teacher.classDetail", TEACHER),
    only("/teacher/class/:id/subjects", "teacher.subjects", TEACHER),
    only("/teacher/subject/:id/assignments", "teacher.subjectAssignments", TEACHER),
    only("/teacher/assignments", "teacher.assignments", TEACHER),
    only("/teacher/assignment/:id", "teacher.assignmentDetail", TEACHER),
    only("/teacher/assignment/:id/submissions", "teacher.submissions", TEACHER),
    only("/teacher/grade/:id", "teacher.gradeSubmission", TEACHER),
    only("/teacher/gradebook", "teacher.gradebook", TEACHER),
    only("/teacher/my-subjects", "teacher.mySubjects", TEACHER),
    only("/teacher/my-subject/:id", "teacher.mySubjectDetail", TEACHER),
    only("/teacher/settings", "teacher.settings", TEACHER),
    only("/student", "student.dashboard", STUDENT),
    only("/student/classes", "student.classes", STUDENT),
    only("/student/class/:id", "student.classSubjects", STUDENT),
    only("/student/subject/:id/assignments", "student.subjectAssignments", STUDENT),
    only("/student/assignments", "student.assignments", STUDENT),
    only("/student/submit/:id", "student.submit", STUDENT),
    only("/student/submission/:id", "student.submissionDetail", STUDENT),
    only("/student/grades", "student.grades", STUDENT),
    only("/student/settings", "student.settings", STUDENT),
    only("/parent", "parent.dashboard", PARENT),
    only("/parent/children", "parent.children", PARENT),
    only("/parent/child/:id", "parent.childGrades", PARENT),
    only("/parent/grades", "parent.grades", PARENT),
    only("/parent/settings", "parent.settings", PARENT),
    only("/admin", "admin.dashboard", ADMIN),
    only("/admin/classes", "admin.classes", ADMIN),
    only("/admin/users", "admin.users", ADMIN),
    only("/admin/subjects", "admin.subjectCatalog", ADMIN),
    only("/admin/class-subjects", "admin.classSubjects", ADMIN),
    only("/admin/logs", "admin.logs", ADMIN),
    only("/admin/settings", "admin.settings", ADMIN),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Outcome {
    Render {
        page: String,
        params: BTreeMap<String, String>,
    },
    Redirect {
        to: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    NotFound {
        path: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct NavItem {
    pub path: &'static str,
    pub label: &'static str,
}

pub fn home_for(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Teacher) => "/teacher",
        Some(Role::Student) => "/student",
        Some(Role::Parent) => "/parent",
        Some(Role::Admin) => "/admin",
        None => "/login",
    }
}

pub fn nav_items(role: Option<Role>) -> Vec<NavItem> {
    let items: &[(&str, &str)] = match role {
        Some(Role::Teacher) => &[
            ("/teacher", "Home"),
            ("/teacher/my-subjects", "My subjects"),
            ("/teacher/gradebook", "Gradebook"),
            ("/teacher/settings", "Settings"),
        ],
        Some(Role::Student) => &[
            ("/student", "Home"),
            ("/student/classes", "Classes"),
            ("/student/assignments", "Assignments"),
            ("/student/grades", "Grades"),
            ("/student/settings", "Settings"),
        ],
        Some(Role::Parent) => &[
            ("/parent", "Home"),
            ("/parent/children", "Children"),
            ("/parent/grades", "Grades"),
            ("/parent/settings", "Settings"),
        ],
        Some(Role::Admin) => &[
            ("/admin", "Home"),
            ("/admin/classes", "Classes"),
            ("/admin/subjects", "Subject catalog"),
            ("/admin/class-subjects", "Class subjects"),
            ("/admin/users", "Users"),
            ("/admin/logs", "Audit logs"),
            ("/admin/settings", "Settings"),
        ],
        None => &[],
    };
    items
        .iter()
        .map(|&(path, label)| NavItem { path, label })
        .collect()
}

/// Percent-decodes a path; malformed escapes leave the input unchanged.
fn decode_path(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            match hex {
                Some(b) => {
                    out.push(b);
                    i += 3;
                    continue;
                }
                None => return raw.to_string(),
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| raw.to_string())
}

fn normalize(raw: &str) -> String {
    let mut path = decode_path(raw).trim().to_string();
    if path.is_empty() {
        path.push('/');
    }
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}

fn match_pattern(pattern: &str, path: &str) -> Option<BTreeMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let path_parts: Vec<&str> = path.split('/').collect();
    if pattern_parts.len() != path_parts.len() {
        return None;
    }
    let mut params = BTreeMap::new();
    for (p, actual) in pattern_parts.iter().zip(&path_parts) {
        if let Some(name) = p.strip_prefix(':') {
            params.insert(name.to_string(), actual.to_string());
        } else if p != actual {
            return None;
        }
    }
    Some(params)
}

fn find_route(path: &str) -> Option<(&'static Route, BTreeMap<String, String>)> {
    let lower = path.to_lowercase();
    if let Some(r) = ROUTES.iter().find(|r| r.path == path) {
        return Some((r, BTreeMap::new()));
    }
    if let Some(r) = ROUTES.iter().find(|r| r.path == lower) {
        return Some((r, BTreeMap::new()));
    }
    ROUTES.iter().find_map(|r| {
        match_pattern(r.path, path)
            .or_else(|| match_pattern(r.path, &lower))
            .map(|params| (r, params))
    })
}

/// Decides what a signed-in user (or nobody, for `None`) sees at `raw_path`.
pub fn resolve(raw_path: &str, role: Option<Role>) -> Outcome {
    let path = normalize(raw_path);
    let Some((route, params)) = find_route(&path) else {
        return Outcome::NotFound { path };
    };

    if route.require_auth && role.is_none() {
        return Outcome::Redirect {
            to: "/login".into(),
            reason: Some("unauthenticated".into()),
        };
    }
    if let Some(r) = role {
        if !route.roles.is_empty() && !route.roles.contains(&r) {
            return Outcome::Redirect {
                to: home_for(role).into(),
                reason: Some("forbidden".into()),
            };
        }
        if route.path == "/" {
            return Outcome::Redirect {
                to: home_for(role).into(),
                reason: None,
            };
        }
    }
    Outcome::Render {
        page: route.page.into(),
        params,
    }
}
