use anyhow::{anyhow, Context};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::path::Path;

use crate::db;
use crate::models::{
    Assignment, AuditLog, Class, ClassSubject, ClientSession, Enrollment, Grade, Mode,
    Notification, ParentLink, SchoolConfig, Session, Subject, SubjectCatalogEntry,
    SubjectTemplate, Submission, Term, User,
};
use crate::seed::SeedData;

const SEEDED_KEY: &str = "store.seeded_collections";
const CONFIG_KEY: &str = "config";
const MODE_KEY: &str = "mode";
const CLIENT_SESSION_KEY: &str = "client.session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Sessions,
    Terms,
    Classes,
    SubjectCatalog,
    ClassSubjects,
    Subjects,
    Enrollments,
    Assignments,
    Submissions,
    Grades,
    Parents,
    Notifications,
    AuditLogs,
    SubjectTemplates,
}

impl Collection {
    pub const ALL: [Collection; 15] = [
        Collection::Users,
        Collection::Sessions,
        Collection::Terms,
        Collection::Classes,
        Collection::SubjectCatalog,
        Collection::ClassSubjects,
        Collection::Subjects,
        Collection::Enrollments,
        Collection::Assignments,
        Collection::Submissions,
        Collection::Grades,
        Collection::Parents,
        Collection::Notifications,
        Collection::AuditLogs,
        Collection::SubjectTemplates,
    ];

    /// Table name, also the key used in snapshots.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Sessions => "sessions",
            Collection::Terms => "terms",
            Collection::Classes => "classes",
            Collection::SubjectCatalog => "subject_catalog",
            Collection::ClassSubjects => "class_subjects",
            Collection::Subjects => "subjects",
            Collection::Enrollments => "enrollments",
            Collection::Assignments => "assignments",
            Collection::Submissions => "submissions",
            Collection::Grades => "grades",
            Collection::Parents => "parents",
            Collection::Notifications => "notifications",
            Collection::AuditLogs => "audit_logs",
            Collection::SubjectTemplates => "subject_templates",
        }
    }
}

/// A typed row of one collection.
pub trait Record: Serialize + DeserializeOwned + Clone {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    fn is_active(&self) -> bool {
        true
    }

    fn set_active(&mut self, _active: bool) {}
}

#[derive(Debug, Clone, Default)]
pub struct RestoreSummary {
    pub collections: usize,
    pub records: usize,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(workspace: &Path) -> anyhow::Result<Store> {
        let conn = db::open_db(workspace)
            .with_context(|| format!("failed to open workspace {}", workspace.to_string_lossy()))?;
        let store = Store { conn };
        store.seed_missing()?;
        Ok(store)
    }

    pub fn in_memory() -> anyhow::Result<Store> {
        let store = Store {
            conn: db::open_in_memory()?,
        };
        store.seed_missing()?;
        Ok(store)
    }

    pub fn all<T: Record>(&self) -> anyhow::Result<Vec<T>> {
        let table = T::COLLECTION.name();
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, data FROM {table} ORDER BY seq"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, data)| {
                serde_json::from_str(&data)
                    .with_context(|| format!("malformed record {id} in {table}"))
            })
            .collect()
    }

    pub fn find<T: Record>(&self, pred: impl Fn(&T) -> bool) -> anyhow::Result<Option<T>> {
        Ok(self.all::<T>()?.into_iter().find(|r| pred(r)))
    }

    pub fn get<T: Record>(&self, id: &str) -> anyhow::Result<Option<T>> {
        self.find(|r: &T| r.id() == id)
    }

    pub fn filter<T: Record>(&self, pred: impl Fn(&T) -> bool) -> anyhow::Result<Vec<T>> {
        Ok(self.all::<T>()?.into_iter().filter(|r| pred(r)).collect())
    }

    pub fn insert<T: Record>(&self, record: &T) -> anyhow::Result<()> {
        insert_raw(&self.conn, T::COLLECTION, record.id(), &serde_json::to_string(record)?)
    }

    /// Applies `patch` to the record with `id` and writes it back.
    pub fn update<T: Record>(&self, id: &str, patch: impl FnOnce(&mut T)) -> anyhow::Result<Option<T>> {
        let Some(mut record) = self.get::<T>(id)? else {
            return Ok(None);
        };
        patch(&mut record);
        let table = T::COLLECTION.name();
        self.conn.execute(
            &format!("UPDATE {table} SET data = ? WHERE id = ?"),
            (serde_json::to_string(&record)?, id),
        )?;
        Ok(Some(record))
    }

    pub fn soft_delete<T: Record>(&self, id: &str) -> anyhow::Result<Option<T>> {
        self.update::<T>(id, |r| r.set_active(false))
    }

    /// True when no active record other than `exclude_id` matches.
    pub fn is_unique<T: Record>(
        &self,
        matches: impl Fn(&T) -> bool,
        exclude_id: Option<&str>,
    ) -> anyhow::Result<bool> {
        let clash = self.all::<T>()?.into_iter().any(|r| {
            r.is_active() && Some(r.id()) != exclude_id && matches(&r)
        });
        Ok(!clash)
    }

    /// Runs `f` inside one transaction; an error rolls back every write it made.
    pub fn atomically<R>(&self, f: impl FnOnce(&Store) -> anyhow::Result<R>) -> anyhow::Result<R> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    pub fn config(&self) -> anyhow::Result<SchoolConfig> {
        match db::settings_get_json(&self.conn, CONFIG_KEY)? {
            Some(v) => Ok(serde_json::from_value(v).context("malformed school config")?),
            None => Ok(SeedData::school_config()),
        }
    }

    pub fn mode(&self) -> anyhow::Result<Mode> {
        match db::settings_get_json(&self.conn, MODE_KEY)? {
            Some(v) => Ok(serde_json::from_value(v).unwrap_or_default()),
            None => Ok(Mode::Demo),
        }
    }

    pub fn set_mode(&self, mode: Mode) -> anyhow::Result<()> {
        db::settings_set_json(&self.conn, MODE_KEY, &serde_json::to_value(mode)?)
    }

    pub fn client_session(&self) -> anyhow::Result<Option<ClientSession>> {
        match db::settings_get_json(&self.conn, CLIENT_SESSION_KEY)? {
            Some(v) => Ok(serde_json::from_value(v).ok()),
            None => Ok(None),
        }
    }

    pub fn set_client_session(&self, session: &ClientSession) -> anyhow::Result<()> {
        db::settings_set_json(&self.conn, CLIENT_SESSION_KEY, &serde_json::to_value(session)?)
    }

    pub fn clear_client_session(&self) -> anyhow::Result<()> {
        db::settings_delete(&self.conn, CLIENT_SESSION_KEY)
    }

    /// Every collection as JSON arrays plus the school config.
    pub fn snapshot(&self) -> anyhow::Result<serde_json::Value> {
        let mut out = serde_json::Map::new();
        for collection in Collection::ALL {
            let table = collection.name();
            let mut stmt = self
                .conn
                .prepare(&format!("SELECT data FROM {table} ORDER BY seq"))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            let values = rows
                .iter()
                .map(|text| serde_json::from_str::<serde_json::Value>(text))
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("malformed record in {table}"))?;
            out.insert(table.to_string(), serde_json::Value::Array(values));
        }
        out.insert("config".to_string(), serde_json::to_value(self.config()?)?);
        Ok(serde_json::Value::Object(out))
    }

    /// Replaces every collection named in `snapshot`; others are left alone.
    /// Rows are validated against their record types before anything is written.
    pub fn restore(&mut self, snapshot: &serde_json::Value) -> anyhow::Result<RestoreSummary> {
        let obj = snapshot
            .as_object()
            .ok_or_else(|| anyhow!("snapshot must be a JSON object"))?;

        let mut staged: Vec<(Collection, Vec<(String, String)>)> = Vec::new();
        for collection in Collection::ALL {
            let Some(value) = obj.get(collection.name()) else {
                continue;
            };
            let rows = value
                .as_array()
                .ok_or_else(|| anyhow!("{} must be an array", collection.name()))?;
            staged.push((collection, encode_rows(collection, rows)?));
        }
        let config = match obj.get("config") {
            Some(v) => Some(
                serde_json::from_value::<SchoolConfig>(v.clone()).context("invalid config")?,
            ),
            None => None,
        };

        let tx = self.conn.transaction()?;
        let mut summary = RestoreSummary::default();
        for (collection, rows) in &staged {
            tx.execute(&format!("DELETE FROM {}", collection.name()), [])?;
            for (id, data) in rows {
                insert_raw(&tx, *collection, id, data)?;
            }
            summary.collections += 1;
            summary.records += rows.len();
        }
        if let Some(cfg) = config {
            db::settings_set_json(&tx, CONFIG_KEY, &serde_json::to_value(cfg)?)?;
        }
        tx.commit()?;
        Ok(summary)
    }

    /// Drops all records and seeds fresh demo data.
    pub fn reset(&mut self) -> anyhow::Result<()> {
        let tx = self.conn.transaction()?;
        for collection in Collection::ALL {
            tx.execute(&format!("DELETE FROM {}", collection.name()), [])?;
        }
        db::settings_delete(&tx, SEEDED_KEY)?;
        db::settings_delete(&tx, CONFIG_KEY)?;
        tx.commit()?;
        self.seed_missing()
    }

    /// Seeds collections that have never been seeded in this workspace, so
    /// collections added later still receive their demo rows.
    fn seed_missing(&self) -> anyhow::Result<()> {
        let seeded: Vec<String> = match db::settings_get_json(&self.conn, SEEDED_KEY)? {
            Some(v) => serde_json::from_value(v).context("malformed seeded collection list")?,
            None => Vec::new(),
        };
        let missing: Vec<Collection> = Collection::ALL
            .into_iter()
            .filter(|c| !seeded.iter().any(|s| s == c.name()))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let seed = SeedData::build(chrono::Utc::now());
        let tx = self.conn.unchecked_transaction()?;
        for collection in &missing {
            let table = collection.name();
            let existing: i64 =
                tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
            if existing > 0 {
                continue;
            }
            for (id, data) in seed.rows(*collection)? {
                insert_raw(&tx, *collection, &id, &data)?;
            }
        }
        if db::settings_get_json(&tx, CONFIG_KEY)?.is_none() {
            db::settings_set_json(&tx, CONFIG_KEY, &serde_json::to_value(&seed.config)?)?;
        }
        let all: Vec<&str> = Collection::ALL.iter().map(|c| c.name()).collect();
        db::settings_set_json(&tx, SEEDED_KEY, &json!(all))?;
        tx.commit()?;
        tracing::debug!(collections = missing.len(), "seeded demo collections");
        Ok(())
    }
}

fn insert_raw(conn: &Connection, collection: Collection, id: &str, data: &str) -> anyhow::Result<()> {
    let table = collection.name();
    conn.execute(
        &format!(
            "INSERT INTO {table}(id, seq, data)
             VALUES(?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM {table}), ?)"
        ),
        (id, data),
    )
    .with_context(|| format!("failed to insert {id} into {table}"))?;
    Ok(())
}

fn encode_typed<T: Record>(rows: &[serde_json::Value]) -> anyhow::Result<Vec<(String, String)>> {
    rows.iter()
        .enumerate()
        .map(|(i, v)| {
            let record: T = serde_json::from_value(v.clone())
                .with_context(|| format!("invalid {} record at index {i}", T::COLLECTION.name()))?;
            Ok((record.id().to_string(), serde_json::to_string(&record)?))
        })
        .collect()
}

pub(crate) fn encode_rows(
    collection: Collection,
    rows: &[serde_json::Value],
) -> anyhow::Result<Vec<(String, String)>> {
    match collection {
        Collection::Users => encode_typed::<User>(rows),
        Collection::Sessions => encode_typed::<Session>(rows),
        Collection::Terms => encode_typed::<Term>(rows),
        Collection::Classes => encode_typed::<Class>(rows),
        Collection::SubjectCatalog => encode_typed::<SubjectCatalogEntry>(rows),
        Collection::ClassSubjects => encode_typed::<ClassSubject>(rows),
        Collection::Subjects => encode_typed::<Subject>(rows),
        Collection::Enrollments => encode_typed::<Enrollment>(rows),
        Collection::Assignments => encode_typed::<Assignment>(rows),
        Collection::Submissions => encode_typed::<Submission>(rows),
        Collection::Grades => encode_typed::<Grade>(rows),
        Collection::Parents => encode_typed::<ParentLink>(rows),
        Collection::Notifications => encode_typed::<Notification>(rows),
        Collection::AuditLogs => encode_typed::<AuditLog>(rows),
        Collection::SubjectTemplates => encode_typed::<SubjectTemplate>(rows),
    }
}
