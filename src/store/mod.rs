//! Persistence adapters for task records.
//!
//! Both backends speak the same record-oriented API ([`RecordClient`]):
//! queries with field lists, ordering, paging and condition groups, and
//! batch create/update/delete calls answered with per-record results.
//! [`LocalStore`] keeps the whole collection in one key-value slot;
//! [`RemoteStore`] forwards every call to the hosted tabular-data API.

pub mod local;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

pub use local::{LocalStore, LOCAL_SLOT_KEY};
pub use remote::{RemoteConfig, RemoteStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    Directory(String),
    #[error("Failed to (de)serialize records: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("Invalid store configuration: {0}")]
    Config(String),
    #[error("Store lock poisoned")]
    LockPoisoned,
    #[error("Blocking store task failed: {0}")]
    Blocking(String),
}

/// Record-oriented client contract shared by the local and remote stores
#[async_trait]
pub trait RecordClient: Send + Sync {
    async fn fetch_records(&self, table: &str, query: &Query) -> Result<FetchResponse, StoreError>;

    async fn get_record_by_id(
        &self,
        table: &str,
        id: &str,
        fields: &[String],
    ) -> Result<GetResponse, StoreError>;

    async fn create_records(
        &self,
        table: &str,
        records: Vec<RecordInput>,
    ) -> Result<MutationResponse, StoreError>;

    async fn update_records(
        &self,
        table: &str,
        records: Vec<RecordInput>,
    ) -> Result<MutationResponse, StoreError>;

    async fn delete_records(
        &self,
        table: &str,
        ids: Vec<String>,
    ) -> Result<MutationResponse, StoreError>;

    /// Short label for status displays, e.g. "local" or "remote"
    fn describe(&self) -> String;
}

/// A task row in backend field naming
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Id", alias = "id", default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(rename = "Name", default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "Tags", default, deserialize_with = "lenient_string")]
    pub tags: String,
    #[serde(rename = "Owner", default, deserialize_with = "lenient_string")]
    pub owner: String,
    #[serde(rename = "CreatedOn", default, deserialize_with = "lenient_opt_string")]
    pub created_on: Option<String>,
    #[serde(rename = "CreatedBy", default, deserialize_with = "lenient_opt_string")]
    pub created_by: Option<String>,
    #[serde(rename = "ModifiedOn", default, deserialize_with = "lenient_opt_string")]
    pub modified_on: Option<String>,
    #[serde(rename = "ModifiedBy", default, deserialize_with = "lenient_opt_string")]
    pub modified_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub completed_at: Option<String>,
}

impl Record {
    /// Look up a field by its backend name
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "Id" => Some(self.id.as_str()),
            "Name" => Some(self.name.as_str()),
            "Tags" => Some(self.tags.as_str()),
            "Owner" => Some(self.owner.as_str()),
            "CreatedOn" => self.created_on.as_deref(),
            "CreatedBy" => self.created_by.as_deref(),
            "ModifiedOn" => self.modified_on.as_deref(),
            "ModifiedBy" => self.modified_by.as_deref(),
            "title" => self.title.as_deref(),
            "description" => self.description.as_deref(),
            "priority" => self.priority.as_deref(),
            "due_date" => self.due_date.as_deref(),
            "status" => self.status.as_deref(),
            "created_at" => self.created_at.as_deref(),
            "updated_at" => self.updated_at.as_deref(),
            "completed_at" => self.completed_at.as_deref(),
            _ => None,
        }
    }

    /// Overwrite the updateable fields with `input`
    pub fn apply_input(&mut self, input: &RecordInput) {
        self.name = input.name.clone();
        self.tags = input.tags.clone();
        self.owner = input.owner.clone();
        self.title = Some(input.title.clone());
        self.description = Some(input.description.clone());
        self.priority = Some(input.priority.clone());
        self.status = Some(input.status.clone());
        self.due_date = input.due_date.clone();
        self.created_at = Some(input.created_at.clone());
        self.updated_at = Some(input.updated_at.clone());
        self.completed_at = input.completed_at.clone();
    }
}

/// Updateable fields sent on create and update. `id` is only set for updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordInput {
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Tags")]
    pub tags: String,
    #[serde(rename = "Owner")]
    pub owner: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub due_date: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortType {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    #[serde(rename = "SortType")]
    pub sort_type: SortType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingInfo {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// Case-insensitive substring match
    Contains,
    ExactMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    pub operator: Operator,
    pub values: Vec<String>,
}

impl Condition {
    pub fn new(field_name: &str, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.to_string(),
            operator,
            values: vec![value.into()],
        }
    }

    /// Matches when the field satisfies the operator for any of the values
    pub fn matches(&self, record: &Record) -> bool {
        let Some(actual) = record.field(&self.field_name) else {
            return false;
        };
        match self.operator {
            Operator::Contains => {
                let haystack = actual.to_lowercase();
                self.values
                    .iter()
                    .any(|v| haystack.contains(&v.to_lowercase()))
            }
            Operator::ExactMatch => self.values.iter().any(|v| v == actual),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupOperator {
    #[serde(rename = "OR")]
    Or,
    #[serde(rename = "AND")]
    And,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubGroup {
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub operator: String,
}

impl SubGroup {
    /// Conditions inside a sub-group are combined with OR when the operator
    /// says so, otherwise with AND
    fn matches(&self, record: &Record) -> bool {
        if self.operator.eq_ignore_ascii_case("OR") {
            self.conditions.iter().any(|c| c.matches(record))
        } else {
            self.conditions.iter().all(|c| c.matches(record))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereGroup {
    pub operator: GroupOperator,
    #[serde(rename = "subGroups")]
    pub sub_groups: Vec<SubGroup>,
}

impl WhereGroup {
    fn matches(&self, record: &Record) -> bool {
        match self.operator {
            GroupOperator::Or => self.sub_groups.iter().any(|g| g.matches(record)),
            GroupOperator::And => self.sub_groups.iter().all(|g| g.matches(record)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub fields: Vec<String>,
    #[serde(rename = "orderBy", default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(rename = "pagingInfo", default, skip_serializing_if = "Option::is_none")]
    pub paging_info: Option<PagingInfo>,
    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(rename = "whereGroups", default, skip_serializing_if = "Vec::is_empty")]
    pub where_groups: Vec<WhereGroup>,
}

impl Query {
    /// Plain conditions and every group must all hold
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
            && self.where_groups.iter().all(|g| g.matches(record))
    }

    /// Filter, order and page `records` the way the hosted API does
    pub fn evaluate(&self, records: &[Record]) -> Vec<Record> {
        let mut selected: Vec<Record> = records
            .iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();

        if !self.order_by.is_empty() {
            selected.sort_by(|a, b| {
                for order in &self.order_by {
                    let left = a.field(&order.field_name).unwrap_or("");
                    let right = b.field(&order.field_name).unwrap_or("");
                    let ord = match order.sort_type {
                        SortType::Asc => left.cmp(right),
                        SortType::Desc => right.cmp(left),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        match self.paging_info {
            Some(paging) => selected
                .into_iter()
                .skip(paging.offset as usize)
                .take(paging.limit as usize)
                .collect(),
            None => selected,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(rename = "fieldLabel", default)]
    pub field_label: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Record>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MutationResult {
    pub fn ok(data: Option<Record>) -> Self {
        Self {
            success: true,
            data,
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub results: Vec<MutationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Accepts strings, numbers, booleans and null; objects are kept as JSON text
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(id: &str, title: &str, description: &str, created_at: &str) -> Record {
        Record {
            id: id.to_string(),
            title: Some(title.to_string()),
            description: Some(description.to_string()),
            status: Some("pending".to_string()),
            created_at: Some(created_at.to_string()),
            ..Record::default()
        }
    }

    #[test]
    fn record_accepts_numeric_ids_and_object_owner() {
        let json = r#"{
            "Id": 42,
            "Name": "Write report",
            "Owner": {"Id": 7, "Name": "Sam"},
            "title": "Write report",
            "priority": "high",
            "due_date": null
        }"#;
        let rec: Record = serde_json::from_str(json).unwrap();
        assert_eq!(rec.id, "42");
        assert_eq!(rec.owner, r#"{"Id":7,"Name":"Sam"}"#);
        assert_eq!(rec.priority.as_deref(), Some("high"));
        assert_eq!(rec.due_date, None);
        assert_eq!(rec.status, None);
    }

    #[test]
    fn query_serializes_to_record_api_shape() {
        let query = Query {
            fields: vec!["title".to_string()],
            order_by: vec![OrderBy {
                field_name: "created_at".to_string(),
                sort_type: SortType::Desc,
            }],
            paging_info: Some(PagingInfo { limit: 100, offset: 0 }),
            conditions: vec![Condition::new("status", Operator::ExactMatch, "pending")],
            where_groups: vec![],
        };
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "fields": ["title"],
                "orderBy": [{"fieldName": "created_at", "SortType": "DESC"}],
                "pagingInfo": {"limit": 100, "offset": 0},
                "where": [{"fieldName": "status", "operator": "ExactMatch", "values": ["pending"]}]
            })
        );
    }

    #[test]
    fn or_group_matches_title_or_description() {
        let query = Query {
            where_groups: vec![WhereGroup {
                operator: GroupOperator::Or,
                sub_groups: vec![
                    SubGroup {
                        conditions: vec![Condition::new("title", Operator::Contains, "REPORT")],
                        operator: String::new(),
                    },
                    SubGroup {
                        conditions: vec![Condition::new("description", Operator::Contains, "REPORT")],
                        operator: String::new(),
                    },
                ],
            }],
            ..Query::default()
        };
        assert!(query.matches(&record("1", "Write report", "", "")));
        assert!(query.matches(&record("2", "Email", "attach the report", "")));
        assert!(!query.matches(&record("3", "Groceries", "milk", "")));
    }

    #[test]
    fn evaluate_orders_descending_and_pages() {
        let records = vec![
            record("1", "a", "", "2024-01-01T00:00:00.000Z"),
            record("2", "b", "", "2024-03-01T00:00:00.000Z"),
            record("3", "c", "", "2024-02-01T00:00:00.000Z"),
        ];
        let query = Query {
            order_by: vec![OrderBy {
                field_name: "created_at".to_string(),
                sort_type: SortType::Desc,
            }],
            paging_info: Some(PagingInfo { limit: 2, offset: 1 }),
            ..Query::default()
        };
        let ids: Vec<String> = query.evaluate(&records).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["3".to_string(), "1".to_string()]);
    }

    #[test]
    fn mutation_response_parses_field_errors() {
        let json = r#"{
            "success": true,
            "results": [{
                "success": false,
                "errors": [{"fieldLabel": "title", "message": "Title is required"}]
            }]
        }"#;
        let resp: MutationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.results[0].errors[0].field_label, "title");
        assert!(!resp.results[0].success);
    }

    #[test]
    fn fetch_response_tolerates_missing_data() {
        let resp: FetchResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.success);
        assert_eq!(resp.data, None);
    }
}
