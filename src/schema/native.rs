//! 原生模式
//!
//! 由规范化后的描述构建，负责字段类型转换、默认值、验证、虚拟字段与钩子

use super::description::{FieldEntry, FieldSpec, SchemaDescription, TypeMarker};
use super::hooks::{HookEvent, HookSet, PostHook, PreHook};
use super::validators::FieldValidator;
use crate::error::{ConnectorError, ConnectorResult};
use crate::model::ModelClass;
use crate::types::{DataValue, Document, ObjectId, json_value_to_data_value};
use chrono::{DateTime, Utc};
use rat_logger::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 虚拟字段取值函数
pub type VirtualGetter = Arc<dyn Fn(&Document) -> DataValue + Send + Sync>;

/// 实例方法
pub type InstanceMethod = Arc<dyn Fn(&Document, &[DataValue]) -> ConnectorResult<DataValue> + Send + Sync>;

/// 虚拟字段扩展函数，注册模型时以模式为参数调用
pub type Virtualizer = Arc<dyn Fn(&mut Schema) + Send + Sync>;

/// 模式选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaOptions {
    /// 覆盖持久化集合名
    #[serde(default)]
    pub collection: Option<String>,
    /// 严格模式：丢弃模式中未声明的字段
    #[serde(default = "default_true")]
    pub strict: bool,
    /// 自动维护 createdAt / updatedAt
    #[serde(default)]
    pub timestamps: bool,
    /// 在 to_object(virtuals) 中输出 `id` 虚拟字段
    #[serde(default = "default_true")]
    pub id: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            collection: None,
            strict: true,
            timestamps: false,
            id: true,
        }
    }
}

/// 字段路径类型
#[derive(Debug, Clone, PartialEq)]
pub enum PathKind {
    String,
    Number,
    Boolean,
    Date,
    Mixed,
    Reference,
    Array(Box<PathKind>),
}

impl PathKind {
    fn name(&self) -> &'static str {
        match self {
            PathKind::String => "String",
            PathKind::Number => "Number",
            PathKind::Boolean => "Boolean",
            PathKind::Date => "Date",
            PathKind::Mixed => "Mixed",
            PathKind::Reference => "ObjectId",
            PathKind::Array(_) => "Array",
        }
    }
}

/// 模式中的单个字段路径
#[derive(Clone)]
pub struct SchemaPath {
    pub name: String,
    pub kind: PathKind,
    pub reference: Option<String>,
    pub required: bool,
    pub unique: bool,
    pub index: bool,
    pub select: bool,
    pub default: Option<DataValue>,
    pub minlength: Option<usize>,
    pub maxlength: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<Regex>,
    pub enum_values: Option<Vec<String>>,
    pub lowercase: bool,
    pub trim: bool,
    pub validators: Vec<FieldValidator>,
    /// 数组元素的路径描述
    pub item: Option<Box<SchemaPath>>,
}

impl std::fmt::Debug for SchemaPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaPath")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("ref", &self.reference)
            .field("required", &self.required)
            .field("select", &self.select)
            .field("validators", &self.validators)
            .finish()
    }
}

impl SchemaPath {
    fn from_spec(name: &str, spec: &FieldSpec) -> ConnectorResult<Self> {
        let kind = match spec.field_type {
            TypeMarker::String => PathKind::String,
            TypeMarker::Number => PathKind::Number,
            TypeMarker::Boolean => PathKind::Boolean,
            TypeMarker::Date => PathKind::Date,
            TypeMarker::Mixed => PathKind::Mixed,
            TypeMarker::ObjectId | TypeMarker::Reference => PathKind::Reference,
        };

        if spec.reference.is_some() && kind != PathKind::Reference {
            return Err(schema_error(name, format!("ref 只能用于 ObjectId 字段，实际类型为 {}", kind.name())));
        }

        if spec.validate_existence {
            match &spec.reference {
                None => {
                    return Err(schema_error(name, "validateExistance 需要同时指定 ref"));
                }
                Some(target) if !spec.has_existence_validator() => {
                    warn!("字段 {} 的存在性检查 ({}) 未经连接器规范化，已忽略", name, target);
                }
                Some(_) => {}
            }
        }

        if let (Some(min), Some(max)) = (spec.minlength, spec.maxlength) {
            if min > max {
                return Err(schema_error(name, format!("minlength {} 大于 maxlength {}", min, max)));
            }
        }
        if let (Some(min), Some(max)) = (spec.min, spec.max) {
            if min > max {
                return Err(schema_error(name, format!("min {} 大于 max {}", min, max)));
            }
        }

        let pattern = match &spec.pattern {
            Some(p) => Some(
                Regex::new(p).map_err(|e| schema_error(name, format!("正则表达式无效: {}", e)))?,
            ),
            None => None,
        };

        let mut path = Self {
            name: name.to_string(),
            kind,
            reference: spec.reference.clone(),
            required: spec.required,
            unique: spec.unique,
            index: spec.index,
            select: spec.select.unwrap_or(true),
            default: None,
            minlength: spec.minlength,
            maxlength: spec.maxlength,
            min: spec.min,
            max: spec.max,
            pattern,
            enum_values: spec.enum_values.clone(),
            lowercase: spec.lowercase,
            trim: spec.trim,
            validators: spec.validators.clone(),
            item: None,
        };

        if let Some(raw) = &spec.default {
            let value = json_value_to_data_value(raw.clone());
            let cast = path
                .cast(value)
                .map_err(|e| schema_error(name, format!("默认值无效: {}", e)))?;
            path.default = Some(cast);
        }

        Ok(path)
    }

    fn array_from_specs(name: &str, specs: &[FieldSpec]) -> ConnectorResult<Self> {
        let item = match specs {
            [] => Self::from_spec(name, &FieldSpec::mixed())?,
            [single] => Self::from_spec(name, single)?,
            _ => {
                return Err(schema_error(
                    name,
                    format!("数组字段只能声明一种元素类型，实际声明了 {} 种", specs.len()),
                ));
            }
        };

        Ok(Self {
            name: name.to_string(),
            kind: PathKind::Array(Box::new(item.kind.clone())),
            reference: item.reference.clone(),
            required: false,
            unique: item.unique,
            index: item.index,
            select: item.select,
            default: None,
            minlength: None,
            maxlength: None,
            min: None,
            max: None,
            pattern: None,
            enum_values: None,
            lowercase: false,
            trim: false,
            validators: Vec::new(),
            item: Some(Box::new(item)),
        })
    }

    /// 按路径类型转换值
    pub fn cast(&self, value: DataValue) -> ConnectorResult<DataValue> {
        if value.is_null() {
            return Ok(DataValue::Null);
        }

        match &self.kind {
            PathKind::Array(_) => {
                let items = match value {
                    DataValue::Array(items) => items,
                    single => vec![single],
                };
                let cast: ConnectorResult<Vec<DataValue>> = match &self.item {
                    Some(item) => items.into_iter().map(|v| item.cast(v)).collect(),
                    None => Ok(items),
                };
                Ok(DataValue::Array(cast?))
            }
            PathKind::String => {
                let mut s = match value {
                    DataValue::String(s) => s,
                    DataValue::Int(i) => i.to_string(),
                    DataValue::Float(f) => f.to_string(),
                    DataValue::Bool(b) => b.to_string(),
                    DataValue::ObjectId(oid) => oid.to_hex(),
                    DataValue::DateTime(dt) => dt.to_rfc3339(),
                    other => return Err(self.cast_error(&other)),
                };
                if self.trim {
                    s = s.trim().to_string();
                }
                if self.lowercase {
                    s = s.to_lowercase();
                }
                Ok(DataValue::String(s))
            }
            PathKind::Number => match value {
                DataValue::Int(_) | DataValue::Float(_) => Ok(value),
                DataValue::Bool(b) => Ok(DataValue::Int(i64::from(b))),
                DataValue::String(ref s) => {
                    let trimmed = s.trim();
                    if let Ok(i) = trimmed.parse::<i64>() {
                        Ok(DataValue::Int(i))
                    } else if let Ok(f) = trimmed.parse::<f64>() {
                        Ok(DataValue::Float(f))
                    } else {
                        Err(self.cast_error(&value))
                    }
                }
                other => Err(self.cast_error(&other)),
            },
            PathKind::Boolean => match value {
                DataValue::Bool(_) => Ok(value),
                DataValue::Int(1) => Ok(DataValue::Bool(true)),
                DataValue::Int(0) => Ok(DataValue::Bool(false)),
                DataValue::String(ref s) => match s.as_str() {
                    "true" | "1" | "yes" => Ok(DataValue::Bool(true)),
                    "false" | "0" | "no" => Ok(DataValue::Bool(false)),
                    _ => Err(self.cast_error(&value)),
                },
                other => Err(self.cast_error(&other)),
            },
            PathKind::Date => match value {
                DataValue::DateTime(_) => Ok(value),
                DataValue::String(ref s) => DateTime::parse_from_rfc3339(s)
                    .map(|dt| DataValue::DateTime(dt.with_timezone(&Utc)))
                    .map_err(|_| self.cast_error(&value)),
                DataValue::Int(ms) => DateTime::<Utc>::from_timestamp_millis(ms)
                    .map(DataValue::DateTime)
                    .ok_or_else(|| self.cast_error(&value)),
                other => Err(self.cast_error(&other)),
            },
            PathKind::Reference => match value {
                DataValue::ObjectId(_) => Ok(value),
                DataValue::String(ref s) => ObjectId::parse_str(s)
                    .map(DataValue::ObjectId)
                    .map_err(|_| self.cast_error(&value)),
                DataValue::Object(ref obj) => obj
                    .get("_id")
                    .and_then(DataValue::as_object_id)
                    .map(DataValue::ObjectId)
                    .ok_or_else(|| self.cast_error(&value)),
                other => Err(self.cast_error(&other)),
            },
            PathKind::Mixed => Ok(value),
        }
    }

    fn cast_error(&self, value: &DataValue) -> ConnectorError {
        ConnectorError::ValidationError {
            field: self.name.clone(),
            message: format!(
                "Cast to {} failed for value \"{}\" at path \"{}\"",
                self.kind.name(),
                value,
                self.name
            ),
        }
    }

    fn fail(&self, message: String) -> ConnectorError {
        ConnectorError::ValidationError {
            field: self.name.clone(),
            message,
        }
    }

    fn is_missing(&self, value: &DataValue) -> bool {
        match value {
            DataValue::Null => true,
            DataValue::String(s) => self.kind == PathKind::String && s.is_empty(),
            _ => false,
        }
    }

    /// 验证已转换的值
    pub async fn validate(&self, value: &DataValue) -> ConnectorResult<()> {
        if self.required && self.is_missing(value) {
            return Err(self.fail(crate::i18n::message("error.required", &[("field", &self.name)])));
        }
        if value.is_null() {
            return Ok(());
        }

        if let (PathKind::Array(_), Some(item)) = (&self.kind, &self.item) {
            if let DataValue::Array(items) = value {
                for element in items.iter().filter(|v| !v.is_null()) {
                    item.validate_scalar(element).await?;
                }
            }
            return Ok(());
        }

        self.validate_scalar(value).await
    }

    async fn validate_scalar(&self, value: &DataValue) -> ConnectorResult<()> {
        if let DataValue::String(s) = value {
            let len = s.chars().count();
            if let Some(min) = self.minlength {
                if len < min {
                    return Err(self.fail(format!(
                        "Path `{}` (`{}`) is shorter than the minimum allowed length ({})",
                        self.name, s, min
                    )));
                }
            }
            if let Some(max) = self.maxlength {
                if len > max {
                    return Err(self.fail(format!(
                        "Path `{}` (`{}`) is longer than the maximum allowed length ({})",
                        self.name, s, max
                    )));
                }
            }
            if let Some(pattern) = &self.pattern {
                if !pattern.is_match(s) {
                    return Err(self.fail(format!("Path `{}` is invalid ({})", self.name, s)));
                }
            }
            if let Some(values) = &self.enum_values {
                if !values.iter().any(|v| v == s) {
                    return Err(self.fail(format!(
                        "`{}` is not a valid enum value for path `{}`",
                        s, self.name
                    )));
                }
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.min {
                if n < min {
                    return Err(self.fail(format!(
                        "Path `{}` ({}) is less than minimum allowed value ({})",
                        self.name, n, min
                    )));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Err(self.fail(format!(
                        "Path `{}` ({}) is more than maximum allowed value ({})",
                        self.name, n, max
                    )));
                }
            }
        }

        for validator in &self.validators {
            validator.run(&self.name, value).await?;
        }
        Ok(())
    }
}

fn schema_error(field: &str, message: impl Into<String>) -> ConnectorError {
    ConnectorError::SchemaError {
        field: field.to_string(),
        message: message.into(),
    }
}

/// 原生模式
#[derive(Clone)]
pub struct Schema {
    paths: BTreeMap<String, SchemaPath>,
    options: SchemaOptions,
    virtuals: BTreeMap<String, VirtualGetter>,
    methods: BTreeMap<String, InstanceMethod>,
    classes: Vec<String>,
    hooks: HookSet,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("paths", &self.paths.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .field("virtuals", &self.virtuals.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("classes", &self.classes)
            .finish()
    }
}

impl Schema {
    /// 从模式描述构建原生模式
    pub fn from_description(description: &SchemaDescription, options: SchemaOptions) -> ConnectorResult<Self> {
        let mut paths = BTreeMap::new();
        for (name, entry) in description.iter() {
            let path = match entry {
                FieldEntry::Single(spec) => SchemaPath::from_spec(name, spec)?,
                FieldEntry::Array(specs) => SchemaPath::array_from_specs(name, specs)?,
            };
            paths.insert(name.clone(), path);
        }

        debug!("构建模式: {} 个字段", paths.len());
        Ok(Self {
            paths,
            options,
            virtuals: BTreeMap::new(),
            methods: BTreeMap::new(),
            classes: Vec::new(),
            hooks: HookSet::default(),
        })
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn path(&self, name: &str) -> Option<&SchemaPath> {
        self.paths.get(name)
    }

    pub fn paths(&self) -> impl Iterator<Item = &SchemaPath> {
        self.paths.values()
    }

    /// 默认查询中隐藏的字段
    pub fn hidden_paths(&self) -> Vec<&str> {
        self.paths
            .values()
            .filter(|p| !p.select)
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn hooks(&self) -> &HookSet {
        &self.hooks
    }

    /// 挂载前置钩子
    pub fn pre(&mut self, event: HookEvent, hook: Arc<dyn PreHook>) -> &mut Self {
        self.hooks.add_pre(event, hook);
        self
    }

    /// 挂载后置钩子
    pub fn post(&mut self, event: HookEvent, hook: Arc<dyn PostHook>) -> &mut Self {
        self.hooks.add_post(event, hook);
        self
    }

    /// 添加虚拟字段（不持久化，仅在取值和 to_object 时计算）
    pub fn virtual_field<F>(&mut self, name: &str, getter: F) -> &mut Self
    where
        F: Fn(&Document) -> DataValue + Send + Sync + 'static,
    {
        if self.paths.contains_key(name) {
            warn!("虚拟字段 {} 与已声明字段同名，取值时以存储值优先", name);
        }
        self.virtuals.insert(name.to_string(), Arc::new(getter));
        self
    }

    pub fn virtuals(&self) -> impl Iterator<Item = (&String, &VirtualGetter)> {
        self.virtuals.iter()
    }

    pub fn virtual_getter(&self, name: &str) -> Option<&VirtualGetter> {
        self.virtuals.get(name)
    }

    pub fn method(&self, name: &str) -> Option<&InstanceMethod> {
        self.methods.get(name)
    }

    /// 装载模型类：取值器成为虚拟字段，方法成为实例方法
    pub fn load_class(&mut self, class: &dyn ModelClass) -> &mut Self {
        for (name, getter) in class.getters() {
            self.virtuals.insert(name, getter);
        }
        for (name, method) in class.methods() {
            self.methods.insert(name, method);
        }
        self.classes.push(class.name().to_string());
        debug!("模式装载类 {}", class.name());
        self
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// 转换输入文档，严格模式下丢弃未声明字段
    pub fn cast_document(&self, input: Document) -> ConnectorResult<Document> {
        let mut out = Document::with_capacity(input.len());
        for (key, value) in input {
            match self.paths.get(&key) {
                Some(path) => {
                    out.insert(key, path.cast(value)?);
                }
                None if key == "_id" || !self.options.strict || self.is_timestamp_key(&key) => {
                    out.insert(key, value);
                }
                None => {
                    debug!("严格模式丢弃未声明字段 {}", key);
                }
            }
        }
        Ok(out)
    }

    fn is_timestamp_key(&self, key: &str) -> bool {
        self.options.timestamps && (key == "createdAt" || key == "updatedAt")
    }

    /// 为缺失字段填充默认值
    pub fn apply_defaults(&self, doc: &mut Document) {
        for path in self.paths.values() {
            if let Some(default) = &path.default {
                let missing = doc.get(&path.name).is_none_or(DataValue::is_null);
                if missing {
                    doc.insert(path.name.clone(), default.clone());
                }
            }
        }
    }

    /// 按字段名顺序验证文档，返回第一个失败
    pub async fn validate(&self, doc: &Document) -> ConnectorResult<()> {
        for path in self.paths.values() {
            let value = doc.get(&path.name).unwrap_or(&DataValue::Null);
            path.validate(value).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document;
    use crate::schema::description::FieldSpec;

    fn account_schema() -> Schema {
        let desc = SchemaDescription::new()
            .field("username", FieldSpec::string().trim())
            .field("password", FieldSpec::string().select(false).required())
            .field(
                "email",
                FieldSpec::string()
                    .unique()
                    .required()
                    .validator(
                        |v: &DataValue| {
                            v.as_str()
                                .is_some_and(|s| Regex::new(r"^.+@.{2,}\..{2,}$").is_ok_and(|r| r.is_match(s)))
                        },
                        Some("{VALUE} is not a valid email!"),
                    ),
            )
            .field("role", FieldSpec::string().one_of(&["admin", "user"]).default_value(serde_json::json!("user")))
            .field("age", FieldSpec::number().range(Some(0.0), Some(150.0)))
            .array("posts", FieldSpec::new(TypeMarker::Reference).reference("Post"))
            .field("createdAtUTC", FieldSpec::date());
        Schema::from_description(&desc, SchemaOptions::default()).unwrap()
    }

    #[test]
    fn test_hidden_paths() {
        let schema = account_schema();
        assert_eq!(schema.hidden_paths(), vec!["password"]);
    }

    #[test]
    fn test_cast_document_strict_and_types() {
        let schema = account_schema();
        let doc = schema
            .cast_document(document! {
                "username" => "  test  ",
                "age" => "42",
                "posts" => "65f1c0ffee0000000000beef",
                "createdAtUTC" => "2024-03-01T10:00:00Z",
                "unknown" => true,
            })
            .unwrap();
        assert_eq!(doc["username"], DataValue::from("test"));
        assert_eq!(doc["age"], DataValue::Int(42));
        assert!(matches!(&doc["posts"], DataValue::Array(items) if matches!(items[0], DataValue::ObjectId(_))));
        assert!(matches!(doc["createdAtUTC"], DataValue::DateTime(_)));
        assert!(!doc.contains_key("unknown"));
    }

    #[test]
    fn test_cast_failure_is_validation_error() {
        let schema = account_schema();
        let err = schema.cast_document(document! { "age" => "old" }).unwrap_err();
        assert_eq!(err.field(), Some("age"));
        let err = schema
            .cast_document(document! { "posts" => vec!["not-an-id"] })
            .unwrap_err();
        assert_eq!(err.field(), Some("posts"));
    }

    #[test]
    fn test_defaults_applied() {
        let schema = account_schema();
        let mut doc = Document::new();
        schema.apply_defaults(&mut doc);
        assert_eq!(doc["role"], DataValue::from("user"));
    }

    #[tokio::test]
    async fn test_validate_required_and_custom() {
        let schema = account_schema();
        let err = schema
            .validate(&document! { "email" => "test@example.com" })
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("password"));

        let err = schema
            .validate(&document! { "email" => "bad", "password" => "pass" })
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("email"));
        assert!(err.to_string().contains("bad is not a valid email!"));

        schema
            .validate(&document! { "email" => "test@example.com", "password" => "pass" })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_validate_enum_and_range() {
        let schema = account_schema();
        let base = document! { "email" => "a@bb.cc", "password" => "x" };

        let mut doc = base.clone();
        doc.insert("role".into(), DataValue::from("root"));
        assert_eq!(schema.validate(&doc).await.unwrap_err().field(), Some("role"));

        let mut doc = base.clone();
        doc.insert("age".into(), DataValue::Int(200));
        assert_eq!(schema.validate(&doc).await.unwrap_err().field(), Some("age"));
    }

    #[test]
    fn test_malformed_descriptions() {
        let desc = SchemaDescription::new().field("n", FieldSpec::number().reference("Account"));
        assert!(matches!(
            Schema::from_description(&desc, SchemaOptions::default()),
            Err(ConnectorError::SchemaError { .. })
        ));

        let desc = SchemaDescription::new().field("s", FieldSpec::string().matches("(unclosed"));
        assert!(Schema::from_description(&desc, SchemaOptions::default()).is_err());

        let desc = SchemaDescription::new().field("s", FieldSpec::string().length(Some(5), Some(1)));
        assert!(Schema::from_description(&desc, SchemaOptions::default()).is_err());

        let mut desc = SchemaDescription::new();
        desc.insert("multi", vec![FieldSpec::string(), FieldSpec::number()]);
        assert!(Schema::from_description(&desc, SchemaOptions::default()).is_err());

        let desc = SchemaDescription::new().field(
            "owner",
            FieldSpec::new(TypeMarker::ObjectId).validate_existence(),
        );
        let err = Schema::from_description(&desc, SchemaOptions::default()).unwrap_err();
        assert_eq!(err.field(), Some("owner"));
    }

    #[test]
    fn test_virtual_field() {
        let mut schema = account_schema();
        schema.virtual_field("display", |doc: &Document| {
            DataValue::from(format!("@{}", doc.get("username").map(|v| v.to_string()).unwrap_or_default()))
        });
        let getter = schema.virtual_getter("display").unwrap();
        assert_eq!(getter(&document! { "username" => "test" }), DataValue::from("@test"));
    }
}
