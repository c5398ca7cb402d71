use serde::{Deserialize, Serialize};

use crate::store::{Collection, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
    Parent,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim() {
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            "parent" => Some(Role::Parent),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Submitted,
    LateSubmission,
    Graded,
    RevisionRequested,
    Resubmitted,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "SUBMITTED",
            SubmissionStatus::LateSubmission => "LATE_SUBMISSION",
            SubmissionStatus::Graded => "GRADED",
            SubmissionStatus::RevisionRequested => "REVISION_REQUESTED",
            SubmissionStatus::Resubmitted => "RESUBMITTED",
        }
    }

    pub fn parse(raw: &str) -> Option<SubmissionStatus> {
        match raw.trim() {
            "SUBMITTED" => Some(SubmissionStatus::Submitted),
            "LATE_SUBMISSION" => Some(SubmissionStatus::LateSubmission),
            "GRADED" => Some(SubmissionStatus::Graded),
            "REVISION_REQUESTED" => Some(SubmissionStatus::RevisionRequested),
            "RESUBMITTED" => Some(SubmissionStatus::Resubmitted),
            _ => None,
        }
    }

    /// Waiting for the teacher to look at it.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            SubmissionStatus::Submitted
                | SubmissionStatus::LateSubmission
                | SubmissionStatus::Resubmitted
        )
    }

    /// Human label used in CSV exports.
    pub fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "Submitted",
            SubmissionStatus::LateSubmission => "Late",
            SubmissionStatus::Graded => "Graded",
            SubmissionStatus::RevisionRequested => "Revision requested",
            SubmissionStatus::Resubmitted => "Resubmitted",
        }
    }
}

/// Where the facade sends requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Demo,
    Api,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Demo => "demo",
            Mode::Api => "api",
        }
    }

    pub fn parse(raw: &str) -> Option<Mode> {
        match raw.trim() {
            "demo" => Some(Mode::Demo),
            "api" => Some(Mode::Api),
            _ => None,
        }
    }
}

/// Session the facade keeps for the signed-in client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSession {
    pub token: String,
    pub expires_at: String,
    pub user: serde_json::Value,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherProfile {
    #[serde(default)]
    pub preferred_subjects: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_class_id: Option<String>,
    #[serde(default)]
    pub teacher_profile: TeacherProfile,
    pub created_at: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub role: Role,
    pub created_at: String,
    pub expires_at: String,
    #[serde(default)]
    pub device_info: String,
    #[serde(default)]
    pub is_revoked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub id: String,
    pub academic_year: String,
    pub term: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub term_id: String,
    /// Homeroom teacher, empty when unassigned.
    #[serde(default)]
    pub teacher_id: String,
    #[serde(default)]
    pub join_code: String,
    #[serde(default)]
    pub room_join_code: String,
    pub created_at: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCatalogEntry {
    pub id: String,
    pub subject_code: String,
    pub subject_name: String,
    #[serde(default)]
    pub level_group: String,
    #[serde(default)]
    pub category: String,
    pub created_at: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSubject {
    pub id: String,
    pub class_id: String,
    pub catalog_id: String,
    #[serde(default)]
    pub teacher_id: String,
    pub created_at: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Teacher-owned subject from before the catalog existed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    #[serde(default)]
    pub class_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_subject_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub teacher_id: String,
    pub created_at: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub class_id: String,
    pub student_id: String,
    pub created_at: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    #[serde(default)]
    pub subject_id: String,
    #[serde(default)]
    pub class_subject_id: String,
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub due_date: String,
    pub max_score: f64,
    #[serde(default)]
    pub rubric: Vec<serde_json::Value>,
    #[serde(default)]
    pub files: Vec<serde_json::Value>,
    pub created_at: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub submitted_at: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub files: Vec<serde_json::Value>,
    pub status: SubmissionStatus,
    pub version: u32,
    #[serde(default)]
    pub parent_submission_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub submission_id: String,
    pub teacher_id: String,
    pub score: f64,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub rubric_score: Vec<serde_json::Value>,
    pub graded_at: String,
    pub status: SubmissionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentLink {
    pub id: String,
    pub parent_id: String,
    pub student_id: String,
    #[serde(default)]
    pub relation: String,
    pub created_at: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub read_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: String,
    pub user_id: String,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    #[serde(default)]
    pub detail: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolConfig {
    pub current_term: String,
    pub academic_year: String,
    pub school_name: String,
}

macro_rules! soft_deletable {
    ($ty:ty, $collection:expr) => {
        impl Record for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn is_active(&self) -> bool {
                self.is_active
            }

            fn set_active(&mut self, active: bool) {
                self.is_active = active;
            }
        }
    };
}

macro_rules! append_only {
    ($ty:ty, $collection:expr) => {
        impl Record for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

soft_deletable!(User, Collection::Users);
soft_deletable!(Term, Collection::Terms);
soft_deletable!(Class, Collection::Classes);
soft_deletable!(SubjectCatalogEntry, Collection::SubjectCatalog);
soft_deletable!(ClassSubject, Collection::ClassSubjects);
soft_deletable!(Subject, Collection::Subjects);
soft_deletable!(Enrollment, Collection::Enrollments);
soft_deletable!(Assignment, Collection::Assignments);
soft_deletable!(ParentLink, Collection::Parents);
soft_deletable!(SubjectTemplate, Collection::SubjectTemplates);
append_only!(Submission, Collection::Submissions);
append_only!(Grade, Collection::Grades);
append_only!(Notification, Collection::Notifications);
append_only!(AuditLog, Collection::AuditLogs);

impl Record for Session {
    const COLLECTION: Collection = Collection::Sessions;

    fn id(&self) -> &str {
        &self.token
    }

    fn is_active(&self) -> bool {
        !self.is_revoked
    }

    fn set_active(&mut self, active: bool) {
        self.is_revoked = !active;
    }
}

impl User {
    /// Public view without credentials.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "role": self.role,
        })
    }
}
