//! 进程内文档存储
//!
//! 用于测试和嵌入式场景，语义与 MongoDB 的相等过滤、唯一索引保持一致

use super::{DocumentStore, StoreKind};
use crate::config::ConnectionSettings;
use crate::error::{ConnectorError, ConnectorResult};
use crate::types::{DataValue, Document, ObjectId};
use async_trait::async_trait;
use dashmap::DashMap;
use rat_logger::debug;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct MemoryCollection {
    docs: Vec<Document>,
    unique: BTreeSet<String>,
}

impl MemoryCollection {
    fn check_unique(&self, collection: &str, doc: &Document, skip: Option<&ObjectId>) -> ConnectorResult<()> {
        for field in &self.unique {
            let Some(value) = doc.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = self.docs.iter().any(|existing| {
                let same_doc = skip.is_some_and(|id| id_of(existing).as_ref() == Some(id));
                !same_doc && existing.get(field) == Some(value)
            });
            if clash {
                return Err(crate::connector_error!(
                    query,
                    crate::i18n::message(
                        "error.duplicate_key",
                        &[("collection", collection), ("field", field), ("value", &value.to_string())],
                    )
                ));
            }
        }
        Ok(())
    }
}

fn id_of(doc: &Document) -> Option<ObjectId> {
    doc.get("_id").and_then(DataValue::as_object_id)
}

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| match doc.get(key) {
        Some(DataValue::Array(items)) if !matches!(expected, DataValue::Array(_)) => {
            items.contains(expected)
        }
        Some(actual) => actual == expected,
        None => expected.is_null(),
    })
}

/// 内存存储
pub struct MemoryStore {
    database: String,
    collections: DashMap<String, MemoryCollection>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// 创建指定数据库名的内存存储
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collections: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// 从 `memory://<database>` 形式的 URI 创建
    pub fn from_uri(uri: &str, settings: &ConnectionSettings) -> Self {
        let from_path = uri
            .strip_prefix("memory://")
            .map(|rest| rest.split(['?', '/']).next().unwrap_or_default())
            .filter(|name| !name.is_empty());
        let database = settings
            .database
            .clone()
            .or_else(|| from_path.map(str::to_string))
            .unwrap_or_else(|| "test".to_string());
        Self::new(database)
    }

    fn ensure_open(&self) -> ConnectorResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(crate::connector_error!(connection, "内存存储已关闭"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn insert(&self, collection: &str, doc: &Document) -> ConnectorResult<()> {
        self.ensure_open()?;
        let id = id_of(doc).ok_or_else(|| crate::connector_error!(validation, "_id", "插入的文档缺少 _id"))?;

        let mut entry = self.collections.entry(collection.to_string()).or_default();
        if entry.docs.iter().any(|d| id_of(d) == Some(id)) {
            return Err(crate::connector_error!(
                query,
                crate::i18n::message(
                    "error.duplicate_key",
                    &[("collection", collection), ("field", "_id"), ("value", &id.to_hex())],
                )
            ));
        }
        entry.check_unique(collection, doc, None)?;
        entry.docs.push(doc.clone());
        crate::debug_log!("内存存储插入 {}.{}", collection, id);
        Ok(())
    }

    async fn replace(&self, collection: &str, id: &ObjectId, doc: &Document) -> ConnectorResult<bool> {
        self.ensure_open()?;
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        entry.check_unique(collection, doc, Some(id))?;
        let Some(slot) = entry.docs.iter_mut().find(|d| id_of(d).as_ref() == Some(id)) else {
            return Ok(false);
        };
        let mut replacement = doc.clone();
        replacement.insert("_id".to_string(), DataValue::ObjectId(*id));
        *slot = replacement;
        Ok(true)
    }

    async fn find_one(&self, collection: &str, filter: &Document) -> ConnectorResult<Option<Document>> {
        self.ensure_open()?;
        Ok(self
            .collections
            .get(collection)
            .and_then(|entry| entry.docs.iter().find(|d| matches_filter(d, filter)).cloned()))
    }

    async fn find(&self, collection: &str, filter: &Document) -> ConnectorResult<Vec<Document>> {
        self.ensure_open()?;
        Ok(self
            .collections
            .get(collection)
            .map(|entry| entry.docs.iter().filter(|d| matches_filter(d, filter)).cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, collection: &str, filter: &Document) -> ConnectorResult<u64> {
        self.ensure_open()?;
        Ok(self
            .collections
            .get(collection)
            .map_or(0, |entry| entry.docs.iter().filter(|d| matches_filter(d, filter)).count() as u64))
    }

    async fn delete_one(&self, collection: &str, id: &ObjectId) -> ConnectorResult<bool> {
        self.ensure_open()?;
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = entry.docs.len();
        entry.docs.retain(|d| id_of(d).as_ref() != Some(id));
        Ok(entry.docs.len() != before)
    }

    async fn ensure_index(&self, collection: &str, field: &str, unique: bool) -> ConnectorResult<()> {
        self.ensure_open()?;
        let mut entry = self.collections.entry(collection.to_string()).or_default();
        if unique {
            // 已有数据违反唯一约束时拒绝建立索引
            let mut seen: Vec<&DataValue> = Vec::new();
            for value in entry.docs.iter().filter_map(|d| d.get(field)).filter(|v| !v.is_null()) {
                if seen.contains(&value) {
                    return Err(ConnectorError::QueryError {
                        message: crate::i18n::message(
                            "error.duplicate_key",
                            &[("collection", collection), ("field", field), ("value", &value.to_string())],
                        ),
                    });
                }
                seen.push(value);
            }
            entry.unique.insert(field.to_string());
        }
        debug!("内存存储索引 {}.{} (unique: {})", collection, field, unique);
        Ok(())
    }

    async fn close(&self) -> ConnectorResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document;

    #[tokio::test]
    async fn test_insert_find_and_array_match() {
        let store = MemoryStore::new("test");
        let id = ObjectId::new();
        let post = ObjectId::new();
        store
            .insert("accounts", &document! { "_id" => id, "username" => "test", "posts" => vec![post] })
            .await
            .unwrap();

        let found = store.find_one("accounts", &document! { "_id" => id }).await.unwrap();
        assert_eq!(found.unwrap()["username"], DataValue::from("test"));
        assert_eq!(store.count("accounts", &document! { "posts" => post }).await.unwrap(), 1);
        assert!(store.find("missing", &Document::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicates() {
        let store = MemoryStore::new("test");
        store.ensure_index("accounts", "email", true).await.unwrap();
        store
            .insert("accounts", &document! { "_id" => ObjectId::new(), "email" => "a@b.cc" })
            .await
            .unwrap();
        let err = store
            .insert("accounts", &document! { "_id" => ObjectId::new(), "email" => "a@b.cc" })
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::QueryError { .. }));
    }

    #[tokio::test]
    async fn test_replace_and_delete() {
        let store = MemoryStore::new("test");
        let id = ObjectId::new();
        store.insert("posts", &document! { "_id" => id, "title" => "a" }).await.unwrap();
        assert!(store.replace("posts", &id, &document! { "title" => "b" }).await.unwrap());
        let doc = store.find_one("posts", &document! { "_id" => id }).await.unwrap().unwrap();
        assert_eq!(doc["title"], DataValue::from("b"));
        assert!(store.delete_one("posts", &id).await.unwrap());
        assert!(!store.delete_one("posts", &id).await.unwrap());
    }

    #[tokio::test]
    async fn test_operations_fail_after_close() {
        let store = MemoryStore::from_uri("memory://app?x=1", &ConnectionSettings::default());
        assert_eq!(store.database_name(), "app");
        store.close().await.unwrap();
        store.close().await.unwrap();
        assert!(store.is_closed());
        let err = store.count("posts", &Document::new()).await.unwrap_err();
        assert!(matches!(err, ConnectorError::ConnectionError { .. }));
    }
}
