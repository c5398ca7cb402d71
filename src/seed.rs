use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;

use crate::models::{
    Assignment, Class, ClassSubject, Enrollment, Grade, ParentLink, Role, SchoolConfig,
    Subject, SubjectCatalogEntry, SubjectTemplate, Submission, SubmissionStatus, TeacherProfile,
    Term, User,
};
use crate::store::Collection;
use crate::util::{hash_password, to_iso};

pub const DEMO_PASSWORD: &str = "1234";
const DEMO_SALT: &str = "demo";
const SCHOOL_NAME: &str = "Demo School";

/// Buddhist-era academic year for a calendar year.
pub fn academic_year(year_ad: i32) -> i32 {
    year_ad + 543
}

/// Demo rows for a fresh workspace, one list per collection.
pub struct SeedData {
    pub users: Vec<User>,
    pub terms: Vec<Term>,
    pub classes: Vec<Class>,
    pub subject_catalog: Vec<SubjectCatalogEntry>,
    pub class_subjects: Vec<ClassSubject>,
    pub subjects: Vec<Subject>,
    pub enrollments: Vec<Enrollment>,
    pub assignments: Vec<Assignment>,
    pub submissions: Vec<Submission>,
    pub grades: Vec<Grade>,
    pub parents: Vec<ParentLink>,
    pub subject_templates: Vec<SubjectTemplate>,
    pub config: SchoolConfig,
}

impl SeedData {
    pub fn school_config() -> SchoolConfig {
        SchoolConfig {
            current_term: "1".into(),
            academic_year: academic_year(Utc::now().year()).to_string(),
            school_name: SCHOOL_NAME.into(),
        }
    }

    pub fn build(now: DateTime<Utc>) -> SeedData {
        let created = to_iso(now);
        let year = now.year();
        SeedData {
            users: users(&created),
            terms: terms(year),
            classes: classes(&created),
            subject_catalog: catalog(&created),
            class_subjects: class_subjects(&created),
            subjects: subjects(&created),
            enrollments: enrollments(&created),
            assignments: assignments(now),
            submissions: vec![Submission {
                id: "submit_1".into(),
                assignment_id: "assign_1".into(),
                student_id: "user_student1".into(),
                submitted_at: created.clone(),
                text: "Here is my work".into(),
                link: String::new(),
                files: Vec::new(),
                status: SubmissionStatus::Graded,
                version: 1,
                parent_submission_id: None,
                revision_reason: None,
            }],
            grades: vec![Grade {
                id: "grade_1".into(),
                submission_id: "submit_1".into(),
                teacher_id: "user_teacher1".into(),
                score: 8.0,
                feedback: "Well done".into(),
                rubric_score: Vec::new(),
                graded_at: created.clone(),
                status: SubmissionStatus::Graded,
            }],
            parents: vec![ParentLink {
                id: "parent_link_1".into(),
                parent_id: "user_parent1".into(),
                student_id: "user_student1".into(),
                relation: "Mother".into(),
                created_at: created,
                is_active: true,
            }],
            subject_templates: templates(),
            config: SchoolConfig {
                current_term: "1".into(),
                academic_year: academic_year(year).to_string(),
                school_name: SCHOOL_NAME.into(),
            },
        }
    }

    /// Serialized `(id, data)` rows for one collection.
    pub fn rows(&self, collection: Collection) -> anyhow::Result<Vec<(String, String)>> {
        match collection {
            Collection::Users => encode(&self.users, |r| &r.id),
            Collection::Sessions => Ok(Vec::new()),
            Collection::Terms => encode(&self.terms, |r| &r.id),
            Collection::Classes => encode(&self.classes, |r| &r.id),
            Collection::SubjectCatalog => encode(&self.subject_catalog, |r| &r.id),
            Collection::ClassSubjects => encode(&self.class_subjects, |r| &r.id),
            Collection::Subjects => encode(&self.subjects, |r| &r.id),
            Collection::Enrollments => encode(&self.enrollments, |r| &r.id),
            Collection::Assignments => encode(&self.assignments, |r| &r.id),
            Collection::Submissions => encode(&self.submissions, |r| &r.id),
            Collection::Grades => encode(&self.grades, |r| &r.id),
            Collection::Parents => encode(&self.parents, |r| &r.id),
            Collection::Notifications => Ok(Vec::new()),
            Collection::AuditLogs => Ok(Vec::new()),
            Collection::SubjectTemplates => encode(&self.subject_templates, |r| &r.id),
        }
    }
}

fn encode<T: Serialize>(rows: &[T], id: impl Fn(&T) -> &String) -> anyhow::Result<Vec<(String, String)>> {
    rows.iter()
        .map(|r| Ok((id(r).clone(), serde_json::to_string(r)?)))
        .collect()
}

fn users(created: &str) -> Vec<User> {
    let hash = hash_password(DEMO_PASSWORD, DEMO_SALT);
    let user = |id: &str, role: Role, name: &str, email: &str, class: Option<&str>, prefs: &[&str]| User {
        id: id.into(),
        role,
        name: name.into(),
        email: email.into(),
        password_hash: hash.clone(),
        salt: DEMO_SALT.into(),
        primary_class_id: class.map(str::to_string),
        teacher_profile: TeacherProfile {
            preferred_subjects: prefs.iter().map(|s| s.to_string()).collect(),
        },
        created_at: created.into(),
        is_active: true,
    };
    vec![
        user("user_teacher1", Role::Teacher, "Ms. Somsri Jaidee", "teacher@demo.com", None, &["Mathematics", "Science"]),
        user("user_teacher2", Role::Teacher, "Mr. Manee Meesuk", "teacher2@demo.com", None, &["Thai", "Social Studies"]),
        user("user_student1", Role::Student, "Somchai Rakrian", "student@demo.com", Some("class_1"), &[]),
        user("user_student2", Role::Student, "Somying Tangjai", "student2@demo.com", Some("class_2"), &[]),
        user("user_parent1", Role::Parent, "Somjai Rakrian", "parent@demo.com", None, &[]),
        user("user_admin1", Role::Admin, "Administrator", "admin@demo.com", None, &[]),
    ]
}

fn terms(year_ad: i32) -> Vec<Term> {
    let term = |id: &str, year_th: i32, term: &str, start: String, end: String| Term {
        id: id.into(),
        academic_year: year_th.to_string(),
        term: term.into(),
        start_date: start,
        end_date: end,
        is_active: true,
    };
    let th = academic_year(year_ad);
    vec![
        term("term_1_prev", th - 1, "1", format!("{}-05-16", year_ad - 1), format!("{}-10-10", year_ad - 1)),
        term("term_2_prev", th - 1, "2", format!("{}-11-01", year_ad - 1), format!("{year_ad}-03-31")),
        term("term_1", th, "1", format!("{year_ad}-05-16"), format!("{year_ad}-10-10")),
        term("term_2", th, "2", format!("{year_ad}-11-01"), format!("{}-03-31", year_ad + 1)),
    ]
}

/// Four rooms for each of P.1 to M.3, plus one upper-secondary room.
fn classes(created: &str) -> Vec<Class> {
    const LEVELS: [&str; 9] = ["P.1", "P.2", "P.3", "P.4", "P.5", "P.6", "M.1", "M.2", "M.3"];
    let mut out = Vec::new();
    let mut n = 1;
    for level in LEVELS {
        for room in 1..=4 {
            let name = format!("{level}/{room}");
            let (id, join_code) = match name.as_str() {
                "M.3/1" => ("class_1".to_string(), "ABC123".to_string()),
                "M.3/2" => ("class_2".to_string(), "XYZ789".to_string()),
                _ => (format!("class_gen_{n}"), format!("CODE{n}")),
            };
            out.push(Class {
                id,
                name,
                level: level.into(),
                room: room.to_string(),
                term_id: "term_1".into(),
                teacher_id: "user_teacher1".into(),
                join_code,
                room_join_code: format!("ROOM{}{room}", level.replace('.', "")),
                created_at: created.into(),
                is_active: true,
            });
            n += 1;
        }
    }
    out.push(Class {
        id: "class_3".into(),
        name: "M.4/1".into(),
        level: "M.4".into(),
        room: "1".into(),
        term_id: "term_1".into(),
        teacher_id: "user_teacher1".into(),
        join_code: "DEF456".into(),
        room_join_code: "ROOM401".into(),
        created_at: created.into(),
        is_active: true,
    });
    out
}

fn catalog(created: &str) -> Vec<SubjectCatalogEntry> {
    const LOWER: &str = "Lower secondary";
    const UPPER: &str = "Upper secondary";
    let rows: [(&str, &str, &str, &str); 16] = [
        ("MAT21101", "Basic Mathematics", LOWER, "Science-Math"),
        ("MAT21102", "Additional Mathematics", LOWER, "Science-Math"),
        ("SCI21101", "Basic Science", LOWER, "Science-Math"),
        ("SCI21102", "Additional Science", LOWER, "Science-Math"),
        ("THA21101", "Basic Thai", LOWER, "Language"),
        ("ENG21101", "Basic English", LOWER, "Language"),
        ("SOC21101", "Social Studies, Religion and Culture", LOWER, "Social"),
        ("SOC21102", "History", LOWER, "Social"),
        ("PHE21101", "Health and Physical Education", LOWER, "Health-PE"),
        ("ART21101", "Arts", LOWER, "Arts"),
        ("CAR21101", "Careers and Technology", LOWER, "Careers"),
        ("SCI21103", "Computing Science", LOWER, "Careers"),
        ("MAT31101", "Basic Mathematics", UPPER, "Science-Math"),
        ("SCI31101", "Physics", UPPER, "Science-Math"),
        ("SCI31102", "Chemistry", UPPER, "Science-Math"),
        ("SCI31103", "Biology", UPPER, "Science-Math"),
    ];
    rows.iter()
        .enumerate()
        .map(|(i, (code, name, group, category))| SubjectCatalogEntry {
            id: format!("cat_{}", i + 1),
            subject_code: code.to_string(),
            subject_name: name.to_string(),
            level_group: group.to_string(),
            category: category.to_string(),
            created_at: created.into(),
            is_active: true,
        })
        .collect()
}

fn class_subjects(created: &str) -> Vec<ClassSubject> {
    [
        ("cs_1", "class_1", "cat_1", "user_teacher1"),
        ("cs_2", "class_1", "cat_3", "user_teacher1"),
        ("cs_3", "class_2", "cat_5", "user_teacher2"),
        ("cs_4", "class_2", "cat_7", "user_teacher2"),
        ("cs_5", "class_1", "cat_5", "user_teacher2"),
        ("cs_6", "class_3", "cat_13", "user_teacher1"),
    ]
    .iter()
    .map(|(id, class_id, catalog_id, teacher_id)| ClassSubject {
        id: id.to_string(),
        class_id: class_id.to_string(),
        catalog_id: catalog_id.to_string(),
        teacher_id: teacher_id.to_string(),
        created_at: created.into(),
        is_active: true,
    })
    .collect()
}

fn subjects(created: &str) -> Vec<Subject> {
    [
        ("subject_1", "class_1", "cs_1", "Basic Mathematics", "user_teacher1"),
        ("subject_2", "class_1", "cs_2", "Basic Science", "user_teacher1"),
        ("subject_3", "class_2", "cs_3", "Basic Thai", "user_teacher2"),
        ("subject_4", "class_2", "cs_4", "Social Studies, Religion and Culture", "user_teacher2"),
    ]
    .iter()
    .map(|(id, class_id, cs_id, name, teacher_id)| Subject {
        id: id.to_string(),
        class_id: class_id.to_string(),
        class_subject_id: Some(cs_id.to_string()),
        name: name.to_string(),
        teacher_id: teacher_id.to_string(),
        created_at: created.into(),
        is_active: true,
    })
    .collect()
}

fn enrollments(created: &str) -> Vec<Enrollment> {
    [
        ("enroll_1", "class_1", "user_student1"),
        ("enroll_2", "class_1", "user_student2"),
        ("enroll_3", "class_2", "user_student1"),
    ]
    .iter()
    .map(|(id, class_id, student_id)| Enrollment {
        id: id.to_string(),
        class_id: class_id.to_string(),
        student_id: student_id.to_string(),
        created_at: created.into(),
        is_active: true,
    })
    .collect()
}

fn assignments(now: DateTime<Utc>) -> Vec<Assignment> {
    let created = to_iso(now);
    let tomorrow = to_iso(now + Duration::days(1));
    let next_week = to_iso(now + Duration::days(7));
    let assignment = |id: &str, subject: &str, cs: &str, title: &str, detail: &str, due: &str, max: f64| Assignment {
        id: id.into(),
        subject_id: subject.into(),
        class_subject_id: cs.into(),
        title: title.into(),
        detail: detail.into(),
        due_date: due.into(),
        max_score: max,
        rubric: Vec::new(),
        files: Vec::new(),
        created_at: created.clone(),
        is_active: true,
    };
    vec![
        assignment("assign_1", "subject_1", "cs_1", "Chapter 1 exercises", "Exercises on pages 25-27", &tomorrow, 10.0),
        assignment("assign_2", "subject_1", "cs_1", "Group report", "Report on fractions", &next_week, 20.0),
        assignment("assign_3", "subject_3", "cs_3", "Essay", "On gratitude", &next_week, 10.0),
    ]
}

fn templates() -> Vec<SubjectTemplate> {
    [
        ("Mathematics", "Science-Math"),
        ("Science", "Science-Math"),
        ("Physics", "Science-Math"),
        ("Chemistry", "Science-Math"),
        ("Biology", "Science-Math"),
        ("Thai", "Language"),
        ("English", "Language"),
        ("Chinese", "Language"),
        ("Social Studies", "Social"),
        ("History", "Social"),
        ("Buddhism", "Social"),
        ("Health Education", "Health-PE"),
        ("Physical Education", "Health-PE"),
        ("Arts", "Arts"),
        ("Music", "Arts"),
        ("Dance", "Arts"),
        ("Careers and Technology", "Careers"),
        ("Computer", "Careers"),
    ]
    .iter()
    .enumerate()
    .map(|(i, (name, category))| SubjectTemplate {
        id: format!("tpl_{}", i + 1),
        name: name.to_string(),
        category: category.to_string(),
        is_active: true,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn terms_follow_the_current_buddhist_year() {
        let seed = SeedData::build(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap());
        let current = seed.terms.iter().find(|t| t.id == "term_1").unwrap();
        assert_eq!(current.academic_year, "2569");
        assert_eq!(current.start_date, "2026-05-16");
        assert_eq!(seed.config.academic_year, "2569");
    }

    #[test]
    fn generated_rooms_keep_fixed_demo_ids() {
        let seed = SeedData::build(Utc::now());
        let m31 = seed.classes.iter().find(|c| c.name == "M.3/1").unwrap();
        assert_eq!(m31.id, "class_1");
        assert_eq!(m31.join_code, "ABC123");
        assert_eq!(m31.room_join_code, "ROOMM31");
        let p11 = seed.classes.iter().find(|c| c.name == "P.1/1").unwrap();
        assert_eq!(p11.id, "class_gen_1");
        assert_eq!(p11.room_join_code, "ROOMP11");
        assert_eq!(seed.classes.len(), 37);
    }
}
