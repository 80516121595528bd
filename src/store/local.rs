use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{
    FetchResponse, FieldError, GetResponse, MutationResponse, MutationResult, Query, Record,
    RecordClient, RecordInput, StoreError,
};
use crate::clock::Clock;

/// Key of the slot holding the serialized task collection
pub const LOCAL_SLOT_KEY: &str = "taskflow-tasks";

const LOCAL_OWNER: &str = "local";

/// Contents of the key-value slot
#[derive(Debug, Default, Serialize, Deserialize)]
struct Slot {
    next_id: u64,
    records: Vec<Record>,
}

/// Older slots stored a bare array of records
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSlot {
    Current(Slot),
    Legacy(Vec<Record>),
}

impl From<StoredSlot> for Slot {
    fn from(stored: StoredSlot) -> Self {
        match stored {
            StoredSlot::Current(slot) => slot,
            StoredSlot::Legacy(records) => {
                let next_id = records
                    .iter()
                    .filter_map(|r| r.id.parse::<u64>().ok())
                    .max()
                    .map_or(1, |max| max + 1);
                Slot { next_id, records }
            }
        }
    }
}

/// Single-slot key-value store on SQLite.
///
/// The whole collection is read on every request and written back after
/// every mutation. Ids are increasing integers rendered as strings.
/// SQLite calls run on tokio's blocking pool.
pub struct LocalStore {
    db: Arc<SlotDb>,
}

/// Connection plus the slot it owns
struct SlotDb {
    conn: Mutex<Connection>,
    key: String,
    clock: Arc<dyn Clock>,
}

impl LocalStore {
    /// Open or create the database at `path`
    pub fn open(path: &Path, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Directory(e.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, clock)
    }

    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, clock)
    }

    fn with_connection(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_slots (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            db: Arc::new(SlotDb {
                conn: Mutex::new(conn),
                key: LOCAL_SLOT_KEY.to_string(),
                clock,
            }),
        })
    }

    fn timestamp(&self) -> String {
        self.db.timestamp()
    }

    /// Run `f` against the slot on the blocking pool, persisting the slot
    /// afterwards when `f` reports a change
    async fn with_slot<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Slot) -> (T, bool) + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.with_slot(f))
            .await
            .map_err(|e| StoreError::Blocking(e.to_string()))?
    }

    fn validate(input: &RecordInput) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if input.title.trim().is_empty() {
            errors.push(FieldError {
                field_label: "title".to_string(),
                message: "Title is required".to_string(),
            });
        }
        errors
    }

    fn rejected(errors: Vec<FieldError>) -> MutationResult {
        MutationResult {
            success: false,
            errors,
            ..MutationResult::default()
        }
    }
}

impl SlotDb {
    fn timestamp(&self) -> String {
        self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn read_slot(conn: &Connection, key: &str) -> Result<Slot, StoreError> {
        let value: Option<String> = conn
            .query_row("SELECT value FROM kv_slots WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        match value {
            Some(json) => Ok(serde_json::from_str::<StoredSlot>(&json)?.into()),
            None => Ok(Slot { next_id: 1, records: Vec::new() }),
        }
    }

    fn write_slot(&self, conn: &Connection, slot: &Slot) -> Result<(), StoreError> {
        let json = serde_json::to_string(slot)?;
        conn.execute(
            "INSERT INTO kv_slots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![self.key, json, self.timestamp()],
        )?;
        Ok(())
    }

    /// Read-modify-write under the connection lock
    fn with_slot<T>(&self, f: impl FnOnce(&mut Slot) -> (T, bool)) -> Result<T, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut slot = Self::read_slot(&conn, &self.key)?;
        let (out, changed) = f(&mut slot);
        if changed {
            self.write_slot(&conn, &slot)?;
        }
        Ok(out)
    }
}

#[async_trait]
impl RecordClient for LocalStore {
    async fn fetch_records(&self, table: &str, query: &Query) -> Result<FetchResponse, StoreError> {
        let query = query.clone();
        let records = self
            .with_slot(move |slot| (query.evaluate(&slot.records), false))
            .await?;
        tracing::debug!(table, count = records.len(), "local fetch");
        Ok(FetchResponse {
            success: true,
            data: Some(records),
            message: None,
        })
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        id: &str,
        _fields: &[String],
    ) -> Result<GetResponse, StoreError> {
        let wanted = id.to_string();
        let record = self
            .with_slot(move |slot| {
                (slot.records.iter().find(|r| r.id == wanted).cloned(), false)
            })
            .await?;
        tracing::debug!(table, id, found = record.is_some(), "local get");
        Ok(GetResponse {
            success: true,
            data: record,
            message: None,
        })
    }

    async fn create_records(
        &self,
        table: &str,
        records: Vec<RecordInput>,
    ) -> Result<MutationResponse, StoreError> {
        let now = self.timestamp();
        let results = self
            .with_slot(move |slot| {
                let mut changed = false;
                let results = records
                    .iter()
                    .map(|input| {
                        let errors = Self::validate(input);
                        if !errors.is_empty() {
                            return Self::rejected(errors);
                        }
                        let id = slot.next_id.max(1);
                        slot.next_id = id + 1;
                        let mut record = Record {
                            id: id.to_string(),
                            created_on: Some(now.clone()),
                            created_by: Some(LOCAL_OWNER.to_string()),
                            modified_on: Some(now.clone()),
                            modified_by: Some(LOCAL_OWNER.to_string()),
                            ..Record::default()
                        };
                        record.apply_input(input);
                        slot.records.push(record.clone());
                        changed = true;
                        MutationResult::ok(Some(record))
                    })
                    .collect::<Vec<_>>();
                (results, changed)
            })
            .await?;
        tracing::debug!(table, count = results.len(), "local create");
        Ok(MutationResponse {
            success: true,
            results,
            message: None,
        })
    }

    async fn update_records(
        &self,
        table: &str,
        records: Vec<RecordInput>,
    ) -> Result<MutationResponse, StoreError> {
        let now = self.timestamp();
        let results = self
            .with_slot(move |slot| {
                let mut changed = false;
                let results = records
                    .iter()
                    .map(|input| {
                        let Some(id) = input.id.as_deref() else {
                            return MutationResult::failed("Record Id is required");
                        };
                        let Some(record) = slot.records.iter_mut().find(|r| r.id == id) else {
                            return MutationResult::failed("Record not found");
                        };
                        let errors = Self::validate(input);
                        if !errors.is_empty() {
                            return Self::rejected(errors);
                        }
                        record.apply_input(input);
                        record.modified_on = Some(now.clone());
                        record.modified_by = Some(LOCAL_OWNER.to_string());
                        changed = true;
                        MutationResult::ok(Some(record.clone()))
                    })
                    .collect::<Vec<_>>();
                (results, changed)
            })
            .await?;
        tracing::debug!(table, count = results.len(), "local update");
        Ok(MutationResponse {
            success: true,
            results,
            message: None,
        })
    }

    async fn delete_records(
        &self,
        table: &str,
        ids: Vec<String>,
    ) -> Result<MutationResponse, StoreError> {
        let results = self
            .with_slot(move |slot| {
                let mut changed = false;
                let results = ids
                    .iter()
                    .map(|id| match slot.records.iter().position(|r| &r.id == id) {
                        Some(idx) => {
                            slot.records.remove(idx);
                            changed = true;
                            MutationResult::ok(None)
                        }
                        None => MutationResult::failed("Record not found"),
                    })
                    .collect::<Vec<_>>();
                (results, changed)
            })
            .await?;
        tracing::debug!(table, count = results.len(), "local delete");
        Ok(MutationResponse {
            success: true,
            results,
            message: None,
        })
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()))
    }

    fn input(title: &str) -> RecordInput {
        RecordInput {
            name: title.to_string(),
            title: title.to_string(),
            priority: "medium".to_string(),
            status: "pending".to_string(),
            created_at: "2024-05-01T12:00:00.000Z".to_string(),
            updated_at: "2024-05-01T12:00:00.000Z".to_string(),
            ..RecordInput::default()
        }
    }

    #[tokio::test]
    async fn create_issues_increasing_ids() {
        let store = LocalStore::open_in_memory(clock()).unwrap();
        let resp = store
            .create_records("tasks", vec![input("one"), input("two")])
            .await
            .unwrap();
        let ids: Vec<String> = resp
            .results
            .iter()
            .map(|r| r.data.as_ref().unwrap().id.clone())
            .collect();
        assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);

        let fetched = store.fetch_records("tasks", &Query::default()).await.unwrap();
        assert_eq!(fetched.data.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_rejects_blank_title_without_writing() {
        let store = LocalStore::open_in_memory(clock()).unwrap();
        let resp = store.create_records("tasks", vec![input("  ")]).await.unwrap();
        assert!(!resp.results[0].success);
        assert_eq!(resp.results[0].errors[0].message, "Title is required");

        let fetched = store.fetch_records("tasks", &Query::default()).await.unwrap();
        assert!(fetched.data.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_ids() {
        let store = LocalStore::open_in_memory(clock()).unwrap();
        let mut missing = input("ghost");
        missing.id = Some("99".to_string());
        let resp = store.update_records("tasks", vec![missing]).await.unwrap();
        assert_eq!(resp.results[0].message.as_deref(), Some("Record not found"));

        let resp = store
            .delete_records("tasks", vec!["99".to_string()])
            .await
            .unwrap();
        assert!(!resp.results[0].success);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = LocalStore::open_in_memory(clock()).unwrap();
        store.create_records("tasks", vec![input("one")]).await.unwrap();
        store.delete_records("tasks", vec!["1".to_string()]).await.unwrap();
        let resp = store.create_records("tasks", vec![input("two")]).await.unwrap();
        assert_eq!(resp.results[0].data.as_ref().unwrap().id, "2");
    }

    #[tokio::test]
    async fn collection_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("taskflow.db");
        {
            let store = LocalStore::open(&path, clock()).unwrap();
            store.create_records("tasks", vec![input("persisted")]).await.unwrap();
        }
        let store = LocalStore::open(&path, clock()).unwrap();
        let got = store.get_record_by_id("tasks", "1", &[]).await.unwrap();
        assert_eq!(got.data.unwrap().title.as_deref(), Some("persisted"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_creates_get_distinct_ids() {
        let store = Arc::new(LocalStore::open_in_memory(clock()).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.create_records("tasks", vec![input(&format!("task {}", n))]).await
                })
            })
            .collect();
        let mut ids = Vec::new();
        for handle in handles {
            let resp = handle.await.unwrap().unwrap();
            ids.push(resp.results[0].data.as_ref().unwrap().id.parse::<u64>().unwrap());
        }
        ids.sort();
        assert_eq!(ids, (1..=8).collect::<Vec<u64>>());
    }

    #[test]
    fn legacy_array_slot_is_upgraded() {
        let json = r#"[{"Id": "3", "title": "old"}, {"Id": "7", "title": "older"}]"#;
        let slot: Slot = serde_json::from_str::<StoredSlot>(json).unwrap().into();
        assert_eq!(slot.next_id, 8);
        assert_eq!(slot.records.len(), 2);
    }
}
