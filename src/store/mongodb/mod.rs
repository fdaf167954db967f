//! MongoDB 存储
//!
//! 基于官方驱动实现 [`DocumentStore`]

mod utils;

use super::{DocumentStore, StoreKind};
use crate::config::ConnectionSettings;
use crate::error::{ConnectorError, ConnectorResult};
use crate::types::{Document, ObjectId};
use ::mongodb::bson::{Document as BsonDocument, doc};
use ::mongodb::options::IndexOptions;
use ::mongodb::{Client, Collection, IndexModel};
use async_trait::async_trait;
use futures::TryStreamExt;
use parking_lot::Mutex;
use rat_logger::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use utils::{bson_to_document, data_map_to_bson, id_filter};

/// MongoDB 存储
pub struct MongoStore {
    database: String,
    client: Mutex<Option<Client>>,
    closed: AtomicBool,
}

fn query_error(action: &str, e: ::mongodb::error::Error) -> ConnectorError {
    ConnectorError::QueryError {
        message: format!("MongoDB{}失败: {}", action, e),
    }
}

impl MongoStore {
    /// 建立连接并执行 ping 确认可用
    pub async fn connect(uri: &str, settings: &ConnectionSettings) -> ConnectorResult<Self> {
        let connection_uri = settings.apply_to_uri(uri);

        let client = Client::with_uri_str(&connection_uri)
            .await
            .map_err(|e| ConnectorError::ConnectionError {
                message: format!("MongoDB连接失败: {}", e),
            })?;

        let database = settings
            .database
            .clone()
            .or_else(|| client.default_database().map(|db| db.name().to_string()))
            .unwrap_or_else(|| "test".to_string());

        client
            .database(&database)
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| ConnectorError::ConnectionError {
                message: format!("MongoDB ping 失败: {}", e),
            })?;

        debug!("MongoDB ping 成功: {}", database);
        Ok(Self {
            database,
            client: Mutex::new(Some(client)),
            closed: AtomicBool::new(false),
        })
    }

    fn collection(&self, name: &str) -> ConnectorResult<Collection<BsonDocument>> {
        let guard = self.client.lock();
        let client = guard
            .as_ref()
            .ok_or_else(|| crate::connector_error!(connection, "MongoDB连接已关闭"))?;
        Ok(client.database(&self.database).collection::<BsonDocument>(name))
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn kind(&self) -> StoreKind {
        StoreKind::MongoDB
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn insert(&self, collection: &str, doc: &Document) -> ConnectorResult<()> {
        let coll = self.collection(collection)?;
        coll.insert_one(data_map_to_bson(doc), None)
            .await
            .map_err(|e| query_error("插入", e))?;
        Ok(())
    }

    async fn replace(&self, collection: &str, id: &ObjectId, doc: &Document) -> ConnectorResult<bool> {
        let coll = self.collection(collection)?;
        let result = coll
            .replace_one(id_filter(id), data_map_to_bson(doc), None)
            .await
            .map_err(|e| query_error("替换", e))?;
        Ok(result.matched_count > 0)
    }

    async fn find_one(&self, collection: &str, filter: &Document) -> ConnectorResult<Option<Document>> {
        let coll = self.collection(collection)?;
        let found = coll
            .find_one(data_map_to_bson(filter), None)
            .await
            .map_err(|e| query_error("查询", e))?;
        Ok(found.as_ref().map(bson_to_document))
    }

    async fn find(&self, collection: &str, filter: &Document) -> ConnectorResult<Vec<Document>> {
        let coll = self.collection(collection)?;
        let cursor = coll
            .find(data_map_to_bson(filter), None)
            .await
            .map_err(|e| query_error("查询", e))?;
        let docs: Vec<BsonDocument> = cursor
            .try_collect()
            .await
            .map_err(|e| query_error("读取游标", e))?;
        Ok(docs.iter().map(bson_to_document).collect())
    }

    async fn count(&self, collection: &str, filter: &Document) -> ConnectorResult<u64> {
        let coll = self.collection(collection)?;
        coll.count_documents(data_map_to_bson(filter), None)
            .await
            .map_err(|e| query_error("计数", e))
    }

    async fn delete_one(&self, collection: &str, id: &ObjectId) -> ConnectorResult<bool> {
        let coll = self.collection(collection)?;
        let result = coll
            .delete_one(id_filter(id), None)
            .await
            .map_err(|e| query_error("删除", e))?;
        Ok(result.deleted_count > 0)
    }

    async fn ensure_index(&self, collection: &str, field: &str, unique: bool) -> ConnectorResult<()> {
        let coll = self.collection(collection)?;
        let mut keys = BsonDocument::new();
        keys.insert(field, 1i32);
        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(unique).build())
            .build();
        coll.create_index(index, None)
            .await
            .map_err(|e| query_error("创建索引", e))?;
        debug!("MongoDB索引 {}.{} (unique: {})", collection, field, unique);
        Ok(())
    }

    async fn close(&self) -> ConnectorResult<()> {
        let client = self.client.lock().take();
        if let Some(client) = client {
            client.shutdown().await;
            info!("MongoDB客户端已关闭: {}", self.database);
        }
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
