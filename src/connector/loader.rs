//! 模型加载器
//!
//! 递归遍历模型目录，将 TOML / JSON 清单解析为模型定义。
//! 清单中的类、虚拟字段扩展与钩子按名称从 [`BehaviorRegistry`] 解析

use crate::config::CollisionPolicy;
use crate::error::{ConnectorError, ConnectorResult};
use crate::model::{ModelClass, ModelDefinition};
use crate::schema::{HookSlot, PostHook, PreHook, Schema, SchemaDescription, SchemaOptions, Virtualizer};
use crate::types::Document;
use rat_logger::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

/// 模型清单文件内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub schema: SchemaDescription,
    #[serde(default)]
    pub options: Option<SchemaOptions>,
    /// 注册表中的类名
    #[serde(default)]
    pub class: Option<String>,
    /// 注册表中的虚拟字段扩展名
    #[serde(default)]
    pub virtualize: Option<String>,
    /// 事件名 -> 注册表中的前置钩子名
    #[serde(default)]
    pub pre: BTreeMap<String, String>,
    /// 事件名 -> 注册表中的后置钩子名
    #[serde(default)]
    pub post: BTreeMap<String, String>,
}

/// 可按名称引用的行为注册表
#[derive(Clone, Default)]
pub struct BehaviorRegistry {
    classes: HashMap<String, Arc<dyn ModelClass>>,
    virtualizers: HashMap<String, Virtualizer>,
    pre_hooks: HashMap<String, Arc<dyn PreHook>>,
    post_hooks: HashMap<String, Arc<dyn PostHook>>,
}

impl std::fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorRegistry")
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .field("virtualizers", &self.virtualizers.keys().collect::<Vec<_>>())
            .field("pre_hooks", &self.pre_hooks.keys().collect::<Vec<_>>())
            .field("post_hooks", &self.post_hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class<C: ModelClass + 'static>(mut self, name: &str, class: C) -> Self {
        self.classes.insert(name.to_string(), Arc::new(class));
        self
    }

    pub fn virtualizer<F>(mut self, name: &str, virtualize: F) -> Self
    where
        F: Fn(&mut Schema) + Send + Sync + 'static,
    {
        self.virtualizers.insert(name.to_string(), Arc::new(virtualize));
        self
    }

    pub fn pre<F>(mut self, name: &str, hook: F) -> Self
    where
        F: Fn(&mut Document) -> ConnectorResult<()> + Send + Sync + 'static,
    {
        self.pre_hooks.insert(name.to_string(), Arc::new(hook));
        self
    }

    pub fn post<F>(mut self, name: &str, hook: F) -> Self
    where
        F: Fn(&Document) -> ConnectorResult<()> + Send + Sync + 'static,
    {
        self.post_hooks.insert(name.to_string(), Arc::new(hook));
        self
    }

    /// 注册实现了钩子trait的异步前置钩子
    pub fn pre_hook(mut self, name: &str, hook: Arc<dyn PreHook>) -> Self {
        self.pre_hooks.insert(name.to_string(), hook);
        self
    }

    /// 注册实现了钩子trait的异步后置钩子
    pub fn post_hook(mut self, name: &str, hook: Arc<dyn PostHook>) -> Self {
        self.post_hooks.insert(name.to_string(), hook);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.virtualizers.is_empty()
            && self.pre_hooks.is_empty()
            && self.post_hooks.is_empty()
    }
}

impl ModelManifest {
    /// 解析为模型定义；无法解析的类与扩展被跳过，钩子保留为未解析槽位
    pub fn resolve(self, behaviors: &BehaviorRegistry) -> ModelDefinition {
        let mut definition = ModelDefinition::new(&self.name, self.schema);
        definition.alias = self.alias;
        if let Some(options) = self.options {
            definition.options = options;
        }

        if let Some(class) = &self.class {
            match behaviors.classes.get(class) {
                Some(c) => definition.class = Some(Arc::clone(c)),
                None => warn!("模型 {} 引用的类 '{}' 未注册，已跳过", self.name, class),
            }
        }
        if let Some(name) = &self.virtualize {
            match behaviors.virtualizers.get(name) {
                Some(v) => definition.virtualize = Some(Arc::clone(v)),
                None => warn!("模型 {} 引用的虚拟字段扩展 '{}' 未注册，已跳过", self.name, name),
            }
        }

        for (event, hook) in self.pre {
            let slot = match behaviors.pre_hooks.get(&hook) {
                Some(h) => HookSlot::Callable(Arc::clone(h)),
                None => HookSlot::Unresolved(hook),
            };
            definition.pre.insert(event, slot);
        }
        for (event, hook) in self.post {
            let slot = match behaviors.post_hooks.get(&hook) {
                Some(h) => HookSlot::Callable(Arc::clone(h)),
                None => HookSlot::Unresolved(hook),
            };
            definition.post.insert(event, slot);
        }

        definition
    }
}

/// 解析单个清单文件
pub fn load_manifest(path: &Path) -> ConnectorResult<ModelManifest> {
    let content = std::fs::read_to_string(path)?;
    let parsed = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str::<ModelManifest>(&content).map_err(|e| e.to_string()),
        _ => serde_json::from_str::<ModelManifest>(&content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| {
        let path = path.display().to_string();
        crate::connector_error!(
            config,
            crate::i18n::message("error.model_file", &[("path", &path), ("message", &message)])
        )
    })
}

/// 递归加载目录中的全部模型清单
///
/// 同一目录内按文件名排序，深度优先；非 `.toml` / `.json` 文件被跳过
pub fn load_models(dir: &Path, behaviors: &BehaviorRegistry) -> ConnectorResult<Vec<ModelDefinition>> {
    if !dir.is_dir() {
        return Err(ConnectorError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("模型目录不存在: {}", dir.display()),
        )));
    }

    let mut definitions = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| ConnectorError::IoError(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") | Some("json") => {
                let manifest = load_manifest(path)?;
                debug!("加载模型清单 {} -> {}", path.display(), manifest.name);
                definitions.push(manifest.resolve(behaviors));
            }
            _ => warn!("跳过非模型文件: {}", path.display()),
        }
    }

    info!("从 {} 加载了 {} 个模型", dir.display(), definitions.len());
    Ok(definitions)
}

/// 合并目录模型与显式模型，目录模型在前
pub fn merge_definitions(
    loaded: Vec<ModelDefinition>,
    explicit: Vec<ModelDefinition>,
    policy: CollisionPolicy,
) -> ConnectorResult<Vec<ModelDefinition>> {
    let merged: Vec<ModelDefinition> = loaded.into_iter().chain(explicit).collect();

    let mut seen = HashSet::new();
    for definition in &merged {
        if !seen.insert(definition.name.as_str()) {
            match policy {
                CollisionPolicy::Reject => {
                    return Err(crate::connector_error!(
                        config,
                        crate::i18n::message("error.duplicate_model", &[("name", &definition.name)])
                    ));
                }
                CollisionPolicy::LastWriteWins => {
                    warn!("模型 {} 重复定义，后注册的定义将覆盖先前的定义", definition.name);
                }
            }
        }
    }
    Ok(merged)
}
