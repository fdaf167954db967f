//! 连接器 / 注册器
//!
//! 打开数据库连接，编译全部模型定义，把连接与模型发布到装饰对象

use super::decorations::Decorations;
use super::loader::{load_models, merge_definitions};
use super::options::ConnectorOptions;
use crate::config::{CollisionPolicy, NamingPolicy};
use crate::error::ConnectorResult;
use crate::host::{ConnectionCloseHook, PluginHost};
use crate::model::{CompiledModel, ModelDefinition};
use crate::schema::{Schema, attach_hooks, normalize_references};
use crate::store::Connection;
use rat_logger::{debug, error, info, warn};
use std::sync::Arc;

/// 宿主中发布装饰对象的能力名
pub const DECORATOR_NAME: &str = "mongo";

/// 装饰对象中连接句柄的键
pub const INSTANCE_KEY: &str = "instance";

/// 模型在装饰对象中的键、编译名与集合名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelNames {
    pub key: String,
    pub model_name: String,
    pub collection: String,
}

/// 按命名策略确定模型的键与名称
pub fn resolve_names(definition: &ModelDefinition, policy: NamingPolicy) -> ConnectorResult<ModelNames> {
    let names = match policy {
        NamingPolicy::NameAndAlias => {
            let alias = definition
                .alias
                .as_deref()
                .filter(|_| definition.has_alias())
                .ok_or_else(|| alias_required(definition))?;
            ModelNames {
                key: alias.to_string(),
                model_name: alias.to_string(),
                collection: definition.name.clone(),
            }
        }
        NamingPolicy::Plain => ModelNames {
            key: if definition.has_alias() {
                definition.alias.clone().unwrap_or_default()
            } else {
                definition.capitalized_name()
            },
            model_name: definition.name.clone(),
            collection: definition.name.clone(),
        },
    };

    Ok(match &definition.options.collection {
        Some(collection) => ModelNames {
            collection: collection.clone(),
            ..names
        },
        None => names,
    })
}

fn alias_required(definition: &ModelDefinition) -> crate::error::ConnectorError {
    crate::connector_error!(
        config,
        crate::i18n::message("error.alias_required", &[("name", &definition.name)])
    )
}

/// 编译单个模型定义
///
/// 模式描述先复制再规范化，定义本身不被修改
pub fn compile_model(
    decorations: &Decorations,
    connection: &Connection,
    definition: &ModelDefinition,
    policy: NamingPolicy,
) -> ConnectorResult<(String, Arc<CompiledModel>)> {
    let names = resolve_names(definition, policy)?;

    let mut description = definition.schema.clone();
    let rewritten = normalize_references(decorations, &mut description);
    if rewritten > 0 {
        debug!("模型 {} 规范化了 {} 个引用字段", definition.name, rewritten);
    }

    let mut schema = Schema::from_description(&description, definition.options.clone())?;
    if let Some(class) = &definition.class {
        schema.load_class(class.as_ref());
    }
    if let Some(virtualize) = &definition.virtualize {
        virtualize(&mut schema);
    }
    attach_hooks(&mut schema, definition)?;

    let model = CompiledModel::new(&names.model_name, &names.collection, schema, connection.clone());
    Ok((names.key, Arc::new(model)))
}

/// 连接数据库并注册全部模型，返回装饰对象句柄
///
/// 注册失败时已打开的连接会被关闭
pub async fn connect(options: ConnectorOptions) -> ConnectorResult<Decorations> {
    let ConnectorOptions {
        config,
        models,
        behaviors,
    } = options;

    let connection = Connection::open(&config.uri, &config.settings).await?;
    info!("连接器已连接: {}", connection.uri());

    let loaded = match &config.model_dir_path {
        Some(dir) => load_models(dir, &behaviors),
        None => Ok(Vec::new()),
    };

    let result = match loaded {
        Ok(loaded) => register_models(&connection, loaded, models, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(decorations) => Ok(decorations),
        Err(e) => {
            error!("注册模型失败: {}", e);
            if let Err(close_err) = connection.close().await {
                warn!("关闭连接失败: {}", close_err);
            }
            Err(e)
        }
    }
}

async fn register_models(
    connection: &Connection,
    loaded: Vec<ModelDefinition>,
    explicit: Vec<ModelDefinition>,
    config: &crate::config::ConnectorConfig,
) -> ConnectorResult<Decorations> {
    let definitions = merge_definitions(loaded, explicit, config.collision_policy)?;

    // 任何模型编译前先检查别名
    if config.naming_policy == NamingPolicy::NameAndAlias {
        if let Some(missing) = definitions.iter().find(|d| !d.has_alias()) {
            return Err(alias_required(missing));
        }
    }

    let decorations = Decorations::new(connection.clone());
    if let Err(e) = compile_all(&decorations, connection, &definitions, config).await {
        // 已编译的模型持有装饰对象，移除后才能释放
        decorations.clear_models();
        return Err(e);
    }

    info!("注册了 {} 个模型", decorations.models().len());
    Ok(decorations)
}

async fn compile_all(
    decorations: &Decorations,
    connection: &Connection,
    definitions: &[ModelDefinition],
    config: &crate::config::ConnectorConfig,
) -> ConnectorResult<()> {
    for definition in definitions {
        let (key, model) = compile_model(decorations, connection, definition, config.naming_policy)?;

        if key == INSTANCE_KEY {
            return Err(crate::connector_error!(
                config,
                format!("模型 {} 的键不能为保留字 '{}'", definition.name, INSTANCE_KEY)
            ));
        }
        if config.collision_policy == CollisionPolicy::Reject && decorations.contains(&key) {
            return Err(crate::connector_error!(
                config,
                crate::i18n::message("error.duplicate_model", &[("name", &key)])
            ));
        }

        if config.settings.auto_index {
            model.ensure_indexes().await?;
        }

        if decorations.insert_model(&key, model).is_some() {
            warn!("装饰对象键 {} 被后注册的模型覆盖", key);
        }
    }

    Ok(())
}

/// 向宿主注册连接器：建立连接、注册模型、添加关闭钩子并发布装饰对象
pub async fn register<H: PluginHost + ?Sized>(host: &mut H, options: ConnectorOptions) -> ConnectorResult<Decorations> {
    let decorations = connect(options).await?;

    if let Err(e) = host.decorate(DECORATOR_NAME, Arc::new(decorations.clone())) {
        if let Err(close_err) = decorations.close().await {
            warn!("关闭连接失败: {}", close_err);
        }
        return Err(e);
    }
    host.on_close(Arc::new(ConnectionCloseHook::new(decorations.clone())));

    info!("连接器已发布为 '{}'", DECORATOR_NAME);
    Ok(decorations)
}
