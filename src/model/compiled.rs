//! 已编译模型
//!
//! 绑定原生模式、集合名与数据库连接，提供文档的创建、保存、查询与删除

use super::record::Record;
use crate::error::ConnectorResult;
use crate::schema::{HookEvent, PathKind, Schema};
use crate::store::Connection;
use crate::types::{DataValue, Document, ObjectId};
use chrono::Utc;
use rat_logger::{debug, info};
use std::sync::Arc;

/// 已编译模型
pub struct CompiledModel {
    model_name: String,
    collection: String,
    schema: Schema,
    connection: Connection,
}

impl std::fmt::Debug for CompiledModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModel")
            .field("model_name", &self.model_name)
            .field("collection", &self.collection)
            .field("schema", &self.schema)
            .finish()
    }
}

impl CompiledModel {
    pub(crate) fn new(model_name: &str, collection: &str, schema: Schema, connection: Connection) -> Self {
        Self {
            model_name: model_name.to_string(),
            collection: collection.to_string(),
            schema,
            connection,
        }
    }

    /// 编译时使用的模型名
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 持久化集合名
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// 为 unique / index 字段建立存储索引，返回索引数量
    pub async fn ensure_indexes(&self) -> ConnectorResult<usize> {
        let mut created = 0;
        for path in self.schema.paths().filter(|p| p.unique || p.index) {
            self.connection
                .store()
                .ensure_index(&self.collection, &path.name, path.unique)
                .await?;
            created += 1;
        }
        if created > 0 {
            debug!("模型 {} 建立了 {} 个索引", self.model_name, created);
        }
        Ok(created)
    }

    /// 创建新文档（未保存）
    ///
    /// 输入中的 `_id` 被用作文档标识，其余字段按模式转换并填充默认值
    pub fn new_document(self: &Arc<Self>, mut data: Document) -> ConnectorResult<Record> {
        let id = match data.remove("_id") {
            Some(value) => value
                .as_object_id()
                .ok_or_else(|| crate::connector_error!(validation, "_id", format!("无效的文档 ID: {}", value)))?,
            None => ObjectId::new(),
        };
        let mut fields = self.schema.cast_document(data)?;
        self.schema.apply_defaults(&mut fields);
        Ok(Record::new(Arc::clone(self), id, fields, true))
    }

    /// 创建并保存文档
    pub async fn create(self: &Arc<Self>, data: Document) -> ConnectorResult<Record> {
        let mut record = self.new_document(data)?;
        self.save(&mut record).await?;
        Ok(record)
    }

    /// 保存文档
    ///
    /// 顺序：pre validate → 验证 → post validate → pre save → 写入 → post save
    pub async fn save(&self, record: &mut Record) -> ConnectorResult<()> {
        let hooks = self.schema.hooks();
        let id = record.id();
        let mut doc = with_id(record.fields().clone(), id);

        // 投影排除的字段从存储中补回，避免覆盖写入时丢失
        if !record.is_new() && !record.excluded().is_empty() {
            if let Some(stored) = self.fetch_one(&id_filter(&id)).await? {
                for name in record.excluded() {
                    if let (false, Some(value)) = (doc.contains_key(name), stored.get(name)) {
                        doc.insert(name.clone(), value.clone());
                    }
                }
            }
        }

        hooks.run_pre(HookEvent::Validate, &mut doc).await?;
        let mut doc = self.schema.cast_document(doc)?;
        self.schema.validate(&doc).await?;
        hooks.run_post(HookEvent::Validate, &doc).await?;

        hooks.run_pre(HookEvent::Save, &mut doc).await?;
        let mut fields = self.schema.cast_document(doc)?;
        fields.remove("_id");

        if self.schema.options().timestamps {
            let now = DataValue::DateTime(Utc::now());
            if record.is_new() {
                fields.insert("createdAt".to_string(), now.clone());
            }
            fields.insert("updatedAt".to_string(), now);
        }

        let persisted = with_id(fields.clone(), id);
        let store = self.connection.store();
        if record.is_new() {
            store.insert(&self.collection, &persisted).await?;
            debug!("插入文档 {}.{}", self.collection, id);
        } else if !store.replace(&self.collection, &id, &persisted).await? {
            return Err(crate::connector_error!(
                query,
                format!("文档 {} 在集合 {} 中不存在", id, self.collection)
            ));
        }

        record.mark_saved(fields);
        hooks.run_post(HookEvent::Save, &persisted).await?;
        Ok(())
    }

    /// 按 ID 查找，应用默认投影
    pub async fn find_by_id(self: &Arc<Self>, id: &ObjectId) -> ConnectorResult<Option<Record>> {
        let found = self.fetch_one(&id_filter(id)).await?;
        Ok(found.map(|doc| self.to_record(doc, true)))
    }

    /// 按 ID 查找，包含 `select: false` 字段
    pub async fn find_by_id_with_hidden(self: &Arc<Self>, id: &ObjectId) -> ConnectorResult<Option<Record>> {
        let found = self.fetch_one(&id_filter(id)).await?;
        Ok(found.map(|doc| self.to_record(doc, false)))
    }

    /// 查找第一个匹配文档
    pub async fn find_one(self: &Arc<Self>, filter: Document) -> ConnectorResult<Option<Record>> {
        let filter = self.cast_filter(filter)?;
        let found = self.fetch_one(&filter).await?;
        Ok(found.map(|doc| self.to_record(doc, true)))
    }

    /// 查找全部匹配文档
    pub async fn find(self: &Arc<Self>, filter: Document) -> ConnectorResult<Vec<Record>> {
        let filter = self.cast_filter(filter)?;
        let docs = self.connection.store().find(&self.collection, &filter).await?;
        Ok(docs.into_iter().map(|doc| self.to_record(doc, true)).collect())
    }

    /// 统计匹配文档数量
    pub async fn count(&self, filter: Document) -> ConnectorResult<u64> {
        let filter = self.cast_filter(filter)?;
        self.connection.store().count(&self.collection, &filter).await
    }

    /// 指定 ID 的文档是否存在
    pub async fn exists(&self, id: &ObjectId) -> ConnectorResult<bool> {
        let count = self
            .connection
            .store()
            .count(&self.collection, &id_filter(id))
            .await?;
        Ok(count > 0)
    }

    /// 按 ID 删除文档，运行 remove 钩子，返回是否删除
    pub async fn delete_by_id(&self, id: &ObjectId) -> ConnectorResult<bool> {
        let Some(mut doc) = self.fetch_one(&id_filter(id)).await? else {
            return Ok(false);
        };

        let hooks = self.schema.hooks();
        hooks.run_pre(HookEvent::Remove, &mut doc).await?;
        let deleted = self.connection.store().delete_one(&self.collection, id).await?;
        if deleted {
            info!("删除文档 {}.{}", self.collection, id);
            hooks.run_post(HookEvent::Remove, &doc).await?;
        }
        Ok(deleted)
    }

    async fn fetch_one(&self, filter: &Document) -> ConnectorResult<Option<Document>> {
        self.connection.store().find_one(&self.collection, filter).await
    }

    fn to_record(self: &Arc<Self>, mut doc: Document, apply_projection: bool) -> Record {
        let id = doc
            .remove("_id")
            .and_then(|v| v.as_object_id())
            .unwrap_or_else(ObjectId::new);
        let mut excluded = Vec::new();
        if apply_projection {
            for hidden in self.schema.hidden_paths() {
                if doc.remove(hidden).is_some() {
                    excluded.push(hidden.to_string());
                }
            }
        }
        Record::new(Arc::clone(self), id, doc, false).with_excluded(excluded)
    }

    // 过滤值按字段类型转换，数组字段接受单个元素值
    fn cast_filter(&self, filter: Document) -> ConnectorResult<Document> {
        let mut out = Document::with_capacity(filter.len());
        for (key, value) in filter {
            let cast = if key == "_id" {
                value.as_object_id().map(DataValue::ObjectId).unwrap_or(value)
            } else {
                match self.schema.path(&key) {
                    Some(path) => {
                        let element_of_array = matches!(path.kind, PathKind::Array(_))
                            && !matches!(value, DataValue::Array(_));
                        match (&path.item, element_of_array) {
                            (Some(item), true) => item.cast(value)?,
                            _ => path.cast(value)?,
                        }
                    }
                    None => value,
                }
            };
            out.insert(key, cast);
        }
        Ok(out)
    }
}

fn id_filter(id: &ObjectId) -> Document {
    let mut filter = Document::new();
    filter.insert("_id".to_string(), DataValue::ObjectId(*id));
    filter
}

fn with_id(mut doc: Document, id: ObjectId) -> Document {
    doc.insert("_id".to_string(), DataValue::ObjectId(id));
    doc
}
