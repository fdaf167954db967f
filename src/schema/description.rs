//! 简化模式描述
//!
//! 调用方使用的字段描述格式，可由代码构建，也可从 JSON / TOML 反序列化。
//! 描述经过引用规范化后再转换为原生 [`Schema`](super::Schema)

use super::validators::{CustomValidator, FieldValidator, ValueValidator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 字段类型标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TypeMarker {
    /// 字符串
    #[serde(alias = "string")]
    String,
    /// 数值
    #[serde(alias = "number")]
    Number,
    /// 布尔
    #[serde(alias = "boolean", alias = "Bool")]
    Boolean,
    /// 日期时间
    #[serde(alias = "date", alias = "DateTime")]
    Date,
    /// 任意值
    #[default]
    #[serde(alias = "mixed")]
    Mixed,
    /// 符号化的引用标记，规范化后变为 [`TypeMarker::Reference`]
    #[serde(alias = "objectId", alias = "objectid")]
    ObjectId,
    /// 原生引用类型
    Reference,
}

impl TypeMarker {
    /// 是否为引用（符号标记或原生类型）
    pub fn is_reference(&self) -> bool {
        matches!(self, TypeMarker::ObjectId | TypeMarker::Reference)
    }
}

/// 单个字段描述
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct FieldSpec {
    /// 字段类型
    #[serde(rename = "type", default)]
    pub field_type: TypeMarker,
    /// 引用的模型名（别名或首字母大写的名称）
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// 保存时检查被引用文档是否存在
    #[serde(
        rename = "validateExistance",
        alias = "validateExistence",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub validate_existence: bool,
    /// 必填
    #[serde(default)]
    pub required: bool,
    /// 唯一索引
    #[serde(default)]
    pub unique: bool,
    /// 普通索引
    #[serde(default)]
    pub index: bool,
    /// 是否出现在默认查询结果中
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<bool>,
    /// 默认值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// 最小长度（字符串）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minlength: Option<usize>,
    /// 最大长度（字符串）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxlength: Option<usize>,
    /// 最小值（数值）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// 最大值（数值）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// 正则匹配（字符串）
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// 可选值列表（字符串）
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// 转小写
    #[serde(default)]
    pub lowercase: bool,
    /// 去除首尾空白
    #[serde(default)]
    pub trim: bool,
    /// 附加验证器（不参与序列化）
    #[serde(skip)]
    pub validators: Vec<FieldValidator>,
}

impl std::fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSpec")
            .field("type", &self.field_type)
            .field("ref", &self.reference)
            .field("validate_existence", &self.validate_existence)
            .field("required", &self.required)
            .field("unique", &self.unique)
            .field("select", &self.select)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl FieldSpec {
    /// 创建指定类型的字段描述
    pub fn new(field_type: TypeMarker) -> Self {
        Self {
            field_type,
            ..Default::default()
        }
    }

    /// 字符串字段
    pub fn string() -> Self {
        Self::new(TypeMarker::String)
    }

    /// 数值字段
    pub fn number() -> Self {
        Self::new(TypeMarker::Number)
    }

    /// 布尔字段
    pub fn boolean() -> Self {
        Self::new(TypeMarker::Boolean)
    }

    /// 日期字段
    pub fn date() -> Self {
        Self::new(TypeMarker::Date)
    }

    /// 任意值字段
    pub fn mixed() -> Self {
        Self::new(TypeMarker::Mixed)
    }

    /// 引用字段（使用符号化 ObjectId 标记）
    pub fn object_id(target: &str) -> Self {
        Self {
            field_type: TypeMarker::ObjectId,
            reference: Some(target.to_string()),
            ..Default::default()
        }
    }

    /// 设置为必填字段
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// 设置为唯一字段
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// 设置为索引字段
    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    /// 设置默认查询是否返回该字段
    pub fn select(mut self, select: bool) -> Self {
        self.select = Some(select);
        self
    }

    /// 设置默认值
    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    /// 设置字符串长度范围
    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.minlength = min;
        self.maxlength = max;
        self
    }

    /// 设置数值范围
    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// 设置正则匹配
    pub fn matches(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    /// 设置可选值
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// 写入时转小写
    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    /// 写入时去除首尾空白
    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    /// 设置引用目标
    pub fn reference(mut self, target: &str) -> Self {
        self.reference = Some(target.to_string());
        self
    }

    /// 开启引用存在性检查
    pub fn validate_existence(mut self) -> Self {
        self.validate_existence = true;
        self
    }

    /// 添加自定义验证器
    ///
    /// `message` 支持 `{PATH}` 与 `{VALUE}` 占位符
    pub fn validator<V>(mut self, validator: V, message: Option<&str>) -> Self
    where
        V: ValueValidator + 'static,
    {
        self.validators.push(FieldValidator::Custom(CustomValidator {
            check: Arc::new(validator),
            message: message.map(|m| m.to_string()),
        }));
        self
    }

    /// 字段是否带有存在性验证器
    pub fn has_existence_validator(&self) -> bool {
        self.validators
            .iter()
            .any(|v| matches!(v, FieldValidator::Existence(_)))
    }
}

/// 字段条目：单值或数组
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldEntry {
    /// 数组字段，每个元素独立描述
    Array(Vec<FieldSpec>),
    /// 单值字段
    Single(FieldSpec),
}

impl From<FieldSpec> for FieldEntry {
    fn from(spec: FieldSpec) -> Self {
        FieldEntry::Single(spec)
    }
}

impl From<Vec<FieldSpec>> for FieldEntry {
    fn from(specs: Vec<FieldSpec>) -> Self {
        FieldEntry::Array(specs)
    }
}

/// 模式描述：字段名到字段条目的映射
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDescription {
    fields: BTreeMap<String, FieldEntry>,
}

impl SchemaDescription {
    /// 创建空描述
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加单值字段
    pub fn field(mut self, name: &str, spec: FieldSpec) -> Self {
        self.fields.insert(name.to_string(), FieldEntry::Single(spec));
        self
    }

    /// 添加数组字段
    pub fn array(mut self, name: &str, spec: FieldSpec) -> Self {
        self.fields.insert(name.to_string(), FieldEntry::Array(vec![spec]));
        self
    }

    /// 插入任意条目
    pub fn insert(&mut self, name: &str, entry: impl Into<FieldEntry>) {
        self.fields.insert(name.to_string(), entry.into());
    }

    /// 读取字段条目
    pub fn get(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.get(name)
    }

    /// 遍历字段
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldEntry)> {
        self.fields.iter()
    }

    /// 可变遍历字段
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut FieldEntry)> {
        self.fields.iter_mut()
    }

    /// 字段数量
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_json_description() {
        let json = serde_json::json!({
            "title": { "type": "String", "required": true },
            "author": { "type": "ObjectId", "ref": "Account", "validateExistance": true },
            "posts": [ { "type": "ObjectId", "ref": "Post" } ],
            "password": { "type": "String", "select": false }
        });
        let desc: SchemaDescription = serde_json::from_value(json).unwrap();
        assert_eq!(desc.len(), 4);

        match desc.get("author").unwrap() {
            FieldEntry::Single(spec) => {
                assert_eq!(spec.field_type, TypeMarker::ObjectId);
                assert_eq!(spec.reference.as_deref(), Some("Account"));
                assert!(spec.validate_existence);
            }
            other => panic!("unexpected entry: {:?}", other),
        }
        assert!(matches!(desc.get("posts"), Some(FieldEntry::Array(items)) if items.len() == 1));
        match desc.get("password").unwrap() {
            FieldEntry::Single(spec) => assert_eq!(spec.select, Some(false)),
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_toml_description() {
        let text = r#"
            [username]
            type = "String"
            trim = true

            [email]
            type = "String"
            unique = true
            match = "^.+@.+$"
        "#;
        let desc: SchemaDescription = toml::from_str(text).unwrap();
        match desc.get("email").unwrap() {
            FieldEntry::Single(spec) => {
                assert!(spec.unique);
                assert_eq!(spec.pattern.as_deref(), Some("^.+@.+$"));
            }
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[test]
    fn test_builder_chain() {
        let spec = FieldSpec::object_id("Account").validate_existence().required();
        assert!(spec.field_type.is_reference());
        assert!(spec.validate_existence);
        assert!(spec.required);
        assert!(!spec.has_existence_validator());
    }
}
