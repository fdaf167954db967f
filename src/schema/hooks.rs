//! 生命周期钩子
//!
//! `pre` 钩子在操作前运行，可修改文档，返回错误即中止操作；
//! `post` 钩子在存储层确认后运行

use crate::error::{ConnectorError, ConnectorResult};
use crate::model::ModelDefinition;
use crate::types::Document;
use async_trait::async_trait;
use rat_logger::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

use super::Schema;

/// 钩子事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    Validate,
    Save,
    Remove,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::Validate => "validate",
            HookEvent::Save => "save",
            HookEvent::Remove => "remove",
        }
    }
}

impl std::str::FromStr for HookEvent {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "validate" => Ok(HookEvent::Validate),
            "save" => Ok(HookEvent::Save),
            "remove" | "delete" | "deleteOne" => Ok(HookEvent::Remove),
            other => Err(crate::connector_error!(
                config,
                format!("未知的钩子事件: {}", other)
            )),
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 前置钩子
#[async_trait]
pub trait PreHook: Send + Sync {
    async fn run(&self, doc: &mut Document) -> ConnectorResult<()>;
}

#[async_trait]
impl<F> PreHook for F
where
    F: Fn(&mut Document) -> ConnectorResult<()> + Send + Sync,
{
    async fn run(&self, doc: &mut Document) -> ConnectorResult<()> {
        (self)(doc)
    }
}

/// 后置钩子
#[async_trait]
pub trait PostHook: Send + Sync {
    async fn run(&self, doc: &Document) -> ConnectorResult<()>;
}

#[async_trait]
impl<F> PostHook for F
where
    F: Fn(&Document) -> ConnectorResult<()> + Send + Sync,
{
    async fn run(&self, doc: &Document) -> ConnectorResult<()> {
        (self)(doc)
    }
}

/// 钩子槽位
///
/// 来自模型文件的钩子按名称解析，解析失败的槽位为 `Unresolved`，挂载时跳过
pub enum HookSlot<H: ?Sized> {
    Callable(Arc<H>),
    Unresolved(String),
}

impl<H: ?Sized> Clone for HookSlot<H> {
    fn clone(&self) -> Self {
        match self {
            HookSlot::Callable(hook) => HookSlot::Callable(Arc::clone(hook)),
            HookSlot::Unresolved(name) => HookSlot::Unresolved(name.clone()),
        }
    }
}

impl<H: ?Sized> std::fmt::Debug for HookSlot<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookSlot::Callable(_) => f.write_str("Callable"),
            HookSlot::Unresolved(name) => write!(f, "Unresolved({})", name),
        }
    }
}

/// 模式上挂载的全部钩子
#[derive(Clone, Default)]
pub struct HookSet {
    pre: HashMap<HookEvent, Vec<Arc<dyn PreHook>>>,
    post: HashMap<HookEvent, Vec<Arc<dyn PostHook>>>,
}

impl HookSet {
    pub fn add_pre(&mut self, event: HookEvent, hook: Arc<dyn PreHook>) {
        self.pre.entry(event).or_default().push(hook);
    }

    pub fn add_post(&mut self, event: HookEvent, hook: Arc<dyn PostHook>) {
        self.post.entry(event).or_default().push(hook);
    }

    pub fn pre_count(&self, event: HookEvent) -> usize {
        self.pre.get(&event).map_or(0, Vec::len)
    }

    pub fn post_count(&self, event: HookEvent) -> usize {
        self.post.get(&event).map_or(0, Vec::len)
    }

    /// 按挂载顺序执行前置钩子
    pub async fn run_pre(&self, event: HookEvent, doc: &mut Document) -> ConnectorResult<()> {
        if let Some(hooks) = self.pre.get(&event) {
            for hook in hooks {
                hook.run(doc).await.map_err(|e| wrap_hook_error(event, e))?;
            }
        }
        Ok(())
    }

    /// 按挂载顺序执行后置钩子
    pub async fn run_post(&self, event: HookEvent, doc: &Document) -> ConnectorResult<()> {
        if let Some(hooks) = self.post.get(&event) {
            for hook in hooks {
                hook.run(doc).await.map_err(|e| wrap_hook_error(event, e))?;
            }
        }
        Ok(())
    }
}

// 验证错误保持原样，其余错误包装为钩子错误
fn wrap_hook_error(event: HookEvent, e: ConnectorError) -> ConnectorError {
    match e {
        ConnectorError::ValidationError { .. } | ConnectorError::HookError { .. } => e,
        other => ConnectorError::HookError {
            event: event.to_string(),
            message: other.to_string(),
        },
    }
}

/// 将模型定义中的 `pre` / `post` 钩子挂载到模式上，返回挂载数量
///
/// 未解析的槽位被跳过；未知事件名为配置错误
pub fn attach_hooks(schema: &mut Schema, definition: &ModelDefinition) -> ConnectorResult<usize> {
    let mut attached = 0;

    for (event_name, slot) in &definition.pre {
        let event: HookEvent = event_name.parse()?;
        match slot {
            HookSlot::Callable(hook) => {
                schema.pre(event, Arc::clone(hook));
                attached += 1;
            }
            HookSlot::Unresolved(name) => {
                warn!("模型 {} 的 pre.{} 钩子 '{}' 不可调用，已跳过", definition.name, event, name);
            }
        }
    }

    for (event_name, slot) in &definition.post {
        let event: HookEvent = event_name.parse()?;
        match slot {
            HookSlot::Callable(hook) => {
                schema.post(event, Arc::clone(hook));
                attached += 1;
            }
            HookSlot::Unresolved(name) => {
                warn!("模型 {} 的 post.{} 钩子 '{}' 不可调用，已跳过", definition.name, event, name);
            }
        }
    }

    debug!("模型 {} 挂载了 {} 个钩子", definition.name, attached);
    Ok(attached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, SchemaDescription, SchemaOptions};
    use crate::types::DataValue;

    fn schema() -> Schema {
        let desc = SchemaDescription::new().field("someField", FieldSpec::string());
        Schema::from_description(&desc, SchemaOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_attach_skips_unresolved_slots() {
        let definition = ModelDefinition::new("preandpost", SchemaDescription::new())
            .pre_fn("save", |doc: &mut Document| {
                doc.insert("someField".into(), DataValue::from("not a dummy!"));
                Ok(())
            })
            .pre_slot("validate", HookSlot::Unresolved("missingHook".into()))
            .post_fn("save", |_doc: &Document| Ok(()));

        let mut schema = schema();
        let attached = attach_hooks(&mut schema, &definition).unwrap();
        assert_eq!(attached, 2);
        assert_eq!(schema.hooks().pre_count(HookEvent::Save), 1);
        assert_eq!(schema.hooks().pre_count(HookEvent::Validate), 0);
        assert_eq!(schema.hooks().post_count(HookEvent::Save), 1);

        let mut doc = Document::new();
        schema.hooks().run_pre(HookEvent::Save, &mut doc).await.unwrap();
        assert_eq!(doc["someField"], DataValue::from("not a dummy!"));
    }

    #[test]
    fn test_unknown_event_is_config_error() {
        let definition = ModelDefinition::new("x", SchemaDescription::new())
            .pre_fn("explode", |_doc: &mut Document| Ok(()));
        let mut schema = schema();
        let err = attach_hooks(&mut schema, &definition).unwrap_err();
        assert!(matches!(err, ConnectorError::ConfigError { .. }));
    }

    #[tokio::test]
    async fn test_pre_hook_error_is_wrapped() {
        let mut hooks = HookSet::default();
        hooks.add_pre(
            HookEvent::Save,
            Arc::new(|_doc: &mut Document| -> ConnectorResult<()> {
                Err(crate::connector_error!(query, "boom"))
            }),
        );
        let err = hooks
            .run_pre(HookEvent::Save, &mut Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::HookError { ref event, .. } if event == "save"));
    }
}
