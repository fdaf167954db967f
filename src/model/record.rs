//! 文档记录
//!
//! 已编译模型的单个文档实例，可读写字段、保存、转换为普通 JSON 值

use super::compiled::CompiledModel;
use crate::error::ConnectorResult;
use crate::types::{DataValue, Document, ObjectId};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// `to_object` 选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToObjectOptions {
    /// 输出虚拟字段（模型类取值器、模式虚拟字段与 `id`）
    pub virtuals: bool,
}

impl ToObjectOptions {
    pub fn with_virtuals() -> Self {
        Self { virtuals: true }
    }
}

/// 文档记录
#[derive(Clone)]
pub struct Record {
    model: Arc<CompiledModel>,
    id: ObjectId,
    fields: Document,
    is_new: bool,
    excluded: Vec<String>,
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model.model_name())
            .field("id", &self.id)
            .field("fields", &self.fields)
            .field("is_new", &self.is_new)
            .finish()
    }
}

impl Record {
    pub(crate) fn new(model: Arc<CompiledModel>, id: ObjectId, fields: Document, is_new: bool) -> Self {
        Self {
            model,
            id,
            fields,
            is_new,
            excluded: Vec::new(),
        }
    }

    pub(crate) fn with_excluded(mut self, excluded: Vec<String>) -> Self {
        self.excluded = excluded;
        self
    }

    pub(crate) fn mark_saved(&mut self, mut fields: Document) {
        for name in &self.excluded {
            fields.remove(name);
        }
        self.fields = fields;
        self.is_new = false;
    }

    /// 文档标识
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// 所属模型
    pub fn model(&self) -> &Arc<CompiledModel> {
        &self.model
    }

    /// 是否尚未持久化
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// 存储字段（不含 `_id`）
    pub fn fields(&self) -> &Document {
        &self.fields
    }

    /// 被默认投影排除的字段名
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    /// 含 `_id` 的完整文档
    pub fn to_document(&self) -> Document {
        let mut doc = self.fields.clone();
        doc.insert("_id".to_string(), DataValue::ObjectId(self.id));
        doc
    }

    /// 读取字段，存储字段优先，其次为虚拟字段
    pub fn get(&self, name: &str) -> Option<DataValue> {
        match name {
            "_id" | "id" => return Some(DataValue::ObjectId(self.id)),
            _ => {}
        }
        if let Some(value) = self.fields.get(name) {
            return Some(value.clone());
        }
        self.model
            .schema()
            .virtual_getter(name)
            .map(|getter| getter(&self.to_document()))
    }

    /// 写入字段，值按模式转换；严格模式下未声明的字段被忽略
    pub fn set(&mut self, name: &str, value: impl Into<DataValue>) -> ConnectorResult<()> {
        let mut input = Document::new();
        input.insert(name.to_string(), value.into());
        let cast = self.model.schema().cast_document(input)?;
        self.fields.extend(cast);
        self.excluded.retain(|n| n != name);
        Ok(())
    }

    /// 调用模型类提供的实例方法
    pub fn call(&self, method: &str, args: &[DataValue]) -> ConnectorResult<DataValue> {
        let Some(func) = self.model.schema().method(method) else {
            return Err(crate::connector_error!(
                config,
                format!("模型 {} 没有方法 {}", self.model.model_name(), method)
            ));
        };
        func(&self.to_document(), args)
    }

    /// 保存到存储
    pub async fn save(&mut self) -> ConnectorResult<()> {
        let model = Arc::clone(&self.model);
        model.save(self).await
    }

    /// 从存储删除
    pub async fn delete(&self) -> ConnectorResult<bool> {
        self.model.delete_by_id(&self.id).await
    }

    /// 转换为普通 JSON 值，`_id` 与引用输出为十六进制字符串
    pub fn to_object(&self, options: ToObjectOptions) -> JsonValue {
        let mut out = Map::new();
        out.insert("_id".to_string(), JsonValue::String(self.id.to_hex()));
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.to_json_value());
        }

        if options.virtuals {
            let doc = self.to_document();
            let schema = self.model.schema();
            for (name, getter) in schema.virtuals() {
                if !out.contains_key(name) {
                    out.insert(name.clone(), getter(&doc).to_json_value());
                }
            }
            if schema.options().id && !out.contains_key("id") {
                out.insert("id".to_string(), JsonValue::String(self.id.to_hex()));
            }
        }

        JsonValue::Object(out)
    }
}
