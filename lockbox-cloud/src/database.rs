//! Document database contract and an in-memory implementation.
//!
//! The coordinator treats the database purely as durable record storage:
//! no transactions, and queries limited to AND-combined equality and range
//! filters on top-level fields.

use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A stored document and its id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Gte,
    Lt,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    fn matches(&self, data: &Value) -> bool {
        let Some(actual) = data.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::Gte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt => matches!(compare(actual, &self.value), Some(Ordering::Less)),
        }
    }
}

/// Strings compare lexicographically by code point, numbers numerically.
/// Mixed types never match a range filter.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        _ => None,
    }
}

/// AND-combined filters over one collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub filters: Vec<Filter>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Gte, value)
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Lt, value)
    }

    fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn matches(&self, data: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }
}

#[async_trait]
pub trait DocumentDatabase: Send + Sync {
    /// Stores `data` under a new id and returns it.
    async fn insert(&self, collection: &str, data: Value) -> RemoteResult<String>;

    /// Creates or replaces the document at `id`.
    async fn set(&self, collection: &str, id: &str, data: Value) -> RemoteResult<()>;

    async fn get(&self, collection: &str, id: &str) -> RemoteResult<Option<Document>>;

    async fn query(&self, collection: &str, query: &Query) -> RemoteResult<Vec<Document>>;

    /// Shallow-merges `data` into an existing document.
    /// Fails with [`RemoteError::NotFound`] if the document does not exist.
    async fn update(&self, collection: &str, id: &str, data: Value) -> RemoteResult<()>;

    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<()>;
}

type Collection = BTreeMap<String, Value>;

/// Document database held in process memory. Query results come back in id
/// order.
#[derive(Default)]
pub struct MemoryDocumentDatabase {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryDocumentDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

fn require_object(data: &Value) -> RemoteResult<&Map<String, Value>> {
    data.as_object()
        .ok_or_else(|| RemoteError::Api("document body must be a JSON object".to_string()))
}

#[async_trait]
impl DocumentDatabase for MemoryDocumentDatabase {
    async fn insert(&self, collection: &str, data: Value) -> RemoteResult<String> {
        require_object(&data)?;
        let id = Uuid::new_v4().simple().to_string();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> RemoteResult<()> {
        require_object(&data)?;
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> RemoteResult<Option<Document>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn query(&self, collection: &str, query: &Query) -> RemoteResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|(_, data)| query.matches(data))
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> RemoteResult<()> {
        let patch = require_object(&data)?;
        let mut collections = self.collections.write().await;
        let existing = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| RemoteError::NotFound(format!("{collection}/{id}")))?;
        for (key, value) in patch {
            existing.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<()> {
        self.collections
            .write()
            .await
            .get_mut(collection)
            .and_then(|c| c.remove(id))
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(format!("{collection}/{id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn range_filters_compare_strings() {
        let q = Query::new().gte("filePath", "bob@x.io/").lt("filePath", "bob@x.io0");
        assert!(q.matches(&json!({"filePath": "bob@x.io/a.pdf"})));
        assert!(!q.matches(&json!({"filePath": "bob@x.io"})));
        assert!(!q.matches(&json!({"filePath": "bob@x.iz/a.pdf"})));
        assert!(!q.matches(&json!({"other": 1})));
    }

    #[test]
    fn mixed_types_never_match_range() {
        let q = Query::new().gte("n", "a");
        assert!(!q.matches(&json!({"n": 5})));
        assert!(Query::new().lt("n", 10).matches(&json!({"n": 5})));
    }

    #[test]
    fn filter_serializes_lowercase_op() {
        let q = Query::new().eq("userId", "u1");
        assert_eq!(
            serde_json::to_value(&q).unwrap(),
            json!({"filters": [{"field": "userId", "op": "eq", "value": "u1"}]})
        );
    }

    #[tokio::test]
    async fn non_object_documents_are_rejected() {
        let db = MemoryDocumentDatabase::new();
        assert!(db.insert("files", json!([1, 2])).await.is_err());
    }
}
