//! 模型定义
//!
//! 调用方提供的单个持久化实体描述：名称、模式与可选行为

use super::class::ModelClass;
use crate::schema::{HookSlot, PostHook, PreHook, SchemaDescription, SchemaOptions, Virtualizer};
use crate::error::ConnectorResult;
use crate::schema::Schema;
use crate::types::Document;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 模型定义
#[derive(Clone)]
pub struct ModelDefinition {
    /// 模型名
    pub name: String,
    /// 别名，作为装饰对象中的键
    pub alias: Option<String>,
    /// 简化模式描述
    pub schema: SchemaDescription,
    /// 传递给原生模式的选项
    pub options: SchemaOptions,
    /// 模型类（取值器与实例方法）
    pub class: Option<Arc<dyn ModelClass>>,
    /// 虚拟字段扩展
    pub virtualize: Option<Virtualizer>,
    /// 前置钩子，键为事件名
    pub pre: BTreeMap<String, HookSlot<dyn PreHook>>,
    /// 后置钩子，键为事件名
    pub post: BTreeMap<String, HookSlot<dyn PostHook>>,
}

impl std::fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("schema", &self.schema)
            .field("options", &self.options)
            .field("class", &self.class.as_ref().map(|c| c.name().to_string()))
            .field("virtualize", &self.virtualize.is_some())
            .field("pre", &self.pre)
            .field("post", &self.post)
            .finish()
    }
}

impl ModelDefinition {
    pub fn new(name: &str, schema: SchemaDescription) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
            schema,
            options: SchemaOptions::default(),
            class: None,
            virtualize: None,
            pre: BTreeMap::new(),
            post: BTreeMap::new(),
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn class<C: ModelClass + 'static>(mut self, class: C) -> Self {
        self.class = Some(Arc::new(class));
        self
    }

    /// 注册时以原生模式为参数调用，用于添加虚拟字段
    pub fn virtualize<F>(mut self, virtualize: F) -> Self
    where
        F: Fn(&mut Schema) + Send + Sync + 'static,
    {
        self.virtualize = Some(Arc::new(virtualize));
        self
    }

    pub fn pre_hook(mut self, event: &str, hook: Arc<dyn PreHook>) -> Self {
        self.pre.insert(event.to_string(), HookSlot::Callable(hook));
        self
    }

    pub fn post_hook(mut self, event: &str, hook: Arc<dyn PostHook>) -> Self {
        self.post.insert(event.to_string(), HookSlot::Callable(hook));
        self
    }

    /// 以闭包形式添加前置钩子
    pub fn pre_fn<F>(self, event: &str, hook: F) -> Self
    where
        F: Fn(&mut Document) -> ConnectorResult<()> + Send + Sync + 'static,
    {
        self.pre_hook(event, Arc::new(hook))
    }

    /// 以闭包形式添加后置钩子
    pub fn post_fn<F>(self, event: &str, hook: F) -> Self
    where
        F: Fn(&Document) -> ConnectorResult<()> + Send + Sync + 'static,
    {
        self.post_hook(event, Arc::new(hook))
    }

    pub fn pre_slot(mut self, event: &str, slot: HookSlot<dyn PreHook>) -> Self {
        self.pre.insert(event.to_string(), slot);
        self
    }

    pub fn post_slot(mut self, event: &str, slot: HookSlot<dyn PostHook>) -> Self {
        self.post.insert(event.to_string(), slot);
        self
    }

    /// 别名是否为空
    pub fn has_alias(&self) -> bool {
        self.alias.as_deref().is_some_and(|a| !a.trim().is_empty())
    }

    /// 名称首字母大写，作为没有别名时的键
    pub fn capitalized_name(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}
