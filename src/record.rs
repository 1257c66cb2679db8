//! Checkpointed output records
//!
//! A `Record` is whatever a batch processor produced for one input item. The
//! pipeline only looks at its `id`, which keys deduplication when batches are
//! merged; every other field is carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One unit of batch output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identity used to deduplicate re-processed items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Domain-specific content, opaque to the pipeline
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates an empty record with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            fields: Map::new(),
        }
    }

    /// Creates a record without an id; its serialized form becomes its key
    pub fn anonymous(fields: Map<String, Value>) -> Self {
        Self { id: None, fields }
    }

    /// Sets a field, returning the record for chaining
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field in place
    ///
    /// Writing `id` sets the record's identity rather than an extra field,
    /// so a record never serializes two `id` keys.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if name == "id" {
            self.id = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
            return;
        }
        self.fields.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Key used when merging batches
    ///
    /// Records without an id are keyed by their JSON encoding. `Map` keeps
    /// keys sorted, so two records with equal content always share a key.
    pub fn dedup_key(&self) -> String {
        match &self.id {
            Some(id) => format!("id:{}", id),
            None => format!(
                "json:{}",
                serde_json::to_string(&self.fields).unwrap_or_default()
            ),
        }
    }
}
