//! The CRUD collaborator contract and an in-memory implementation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::request::Fields;

pub type RecordId = i64;

/// A persisted row with named field access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|value| !value.is_null())
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Every non-null filter equals the stored value. Strings compare ASCII case-insensitively.
    pub fn matches(&self, filters: &Fields) -> bool {
        filters
            .iter()
            .filter(|(_, wanted)| !wanted.is_null())
            .all(|(key, wanted)| match (self.get(key), wanted) {
                (Some(Value::String(have)), Value::String(want)) => have.eq_ignore_ascii_case(want),
                (Some(have), want) => have == want,
                (None, _) => false,
            })
    }

    fn mentions(&self, keyword: &str) -> bool {
        self.fields.values().any(|value| match value {
            Value::String(text) => text.to_lowercase().contains(keyword),
            _ => false,
        })
    }
}

/// What a handler needs from persistence. Implementations own their schema.
pub trait RecordStore: Send {
    fn create(&mut self, fields: &Fields) -> Result<RecordId, StoreError>;
    fn get(&self, id: RecordId) -> Result<Option<Record>, StoreError>;
    /// Records matching every non-null filter, newest first.
    fn list(&self, filters: &Fields) -> Result<Vec<Record>, StoreError>;
    /// Overwrites the non-null fields. `false` when the record does not exist.
    fn update(&mut self, id: RecordId, fields: &Fields) -> Result<bool, StoreError>;
    fn delete(&mut self, id: RecordId) -> Result<bool, StoreError>;
    /// Case-insensitive substring search over text fields, newest first.
    fn search(&self, keyword: &str) -> Result<Vec<Record>, StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    next_id: RecordId,
    records: BTreeMap<RecordId, Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn create(&mut self, fields: &Fields) -> Result<RecordId, StoreError> {
        self.next_id += 1;
        let id = self.next_id;
        let now = Utc::now();
        let stored = fields
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self.records.insert(
            id,
            Record {
                id,
                fields: stored,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    fn get(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        Ok(self.records.get(&id).cloned())
    }

    fn list(&self, filters: &Fields) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .records
            .values()
            .rev()
            .filter(|record| record.matches(filters))
            .cloned()
            .collect())
    }

    fn update(&mut self, id: RecordId, fields: &Fields) -> Result<bool, StoreError> {
        let Some(record) = self.records.get_mut(&id) else {
            return Ok(false);
        };
        for (key, value) in fields.iter().filter(|(_, value)| !value.is_null()) {
            record.fields.insert(key.clone(), value.clone());
        }
        record.updated_at = Utc::now();
        Ok(true)
    }

    fn delete(&mut self, id: RecordId) -> Result<bool, StoreError> {
        Ok(self.records.remove(&id).is_some())
    }

    fn search(&self, keyword: &str) -> Result<Vec<Record>, StoreError> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .records
            .values()
            .rev()
            .filter(|record| record.mentions(&keyword))
            .cloned()
            .collect())
    }
}
