//! MongoDB工具函数模块
//!
//! DataValue 与 BSON 之间的转换

use crate::types::{DataValue, Document, ObjectId};
use ::mongodb::bson::{self, Bson, Document as BsonDocument};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// 将DataValue转换为BSON值
pub(crate) fn data_value_to_bson(value: &DataValue) -> Bson {
    match value {
        DataValue::Null => Bson::Null,
        DataValue::Bool(b) => Bson::Boolean(*b),
        DataValue::Int(i) => Bson::Int64(*i),
        DataValue::Float(f) => Bson::Double(*f),
        DataValue::String(s) => Bson::String(s.clone()),
        DataValue::DateTime(dt) => Bson::DateTime(bson::DateTime::from_millis(dt.timestamp_millis())),
        DataValue::ObjectId(oid) => Bson::ObjectId(bson::oid::ObjectId::from_bytes(oid.bytes())),
        DataValue::Array(items) => Bson::Array(items.iter().map(data_value_to_bson).collect()),
        DataValue::Object(obj) => Bson::Document(data_map_to_bson(obj)),
    }
}

/// 将文档转换为BSON文档
pub(crate) fn data_map_to_bson(doc: &HashMap<String, DataValue>) -> BsonDocument {
    let mut out = BsonDocument::new();
    for (key, value) in doc {
        out.insert(key.clone(), data_value_to_bson(value));
    }
    out
}

/// 将BSON值转换为DataValue
pub(crate) fn bson_to_data_value(value: &Bson) -> DataValue {
    match value {
        Bson::Null | Bson::Undefined => DataValue::Null,
        Bson::Boolean(b) => DataValue::Bool(*b),
        Bson::Int32(i) => DataValue::Int(i64::from(*i)),
        Bson::Int64(i) => DataValue::Int(*i),
        Bson::Double(f) => DataValue::Float(*f),
        Bson::String(s) => DataValue::String(s.clone()),
        Bson::ObjectId(oid) => DataValue::ObjectId(ObjectId::from_bytes(oid.bytes())),
        Bson::DateTime(dt) => DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
            .map(DataValue::DateTime)
            .unwrap_or(DataValue::Null),
        Bson::Array(items) => DataValue::Array(items.iter().map(bson_to_data_value).collect()),
        Bson::Document(doc) => DataValue::Object(bson_to_document(doc)),
        // 其余类型按字符串保留
        other => DataValue::String(other.to_string()),
    }
}

/// 将BSON文档转换为文档
pub(crate) fn bson_to_document(doc: &BsonDocument) -> Document {
    doc.iter()
        .map(|(key, value)| (key.clone(), bson_to_data_value(value)))
        .collect()
}

/// ID 过滤条件
pub(crate) fn id_filter(id: &ObjectId) -> BsonDocument {
    bson::doc! { "_id": bson::oid::ObjectId::from_bytes(id.bytes()) }
}
