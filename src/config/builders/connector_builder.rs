//! # 连接器选项构建器模块
//!
//! 链式设置连接 URI、驱动设置、命名策略、模型目录与显式模型

use crate::config::core::{
    CollisionPolicy, ConnectionSettings, ConnectorConfig, LoggingConfig, NamingPolicy,
};
use crate::connector::{BehaviorRegistry, ConnectorOptions};
use crate::error::ConnectorResult;
use crate::model::ModelDefinition;
use crate::store::redact_uri;
use rat_logger::info;
use std::path::PathBuf;

/// 连接器选项构建器
///
/// `uri` 为必填项，其余选项均有明确的缺省语义
#[derive(Debug, Default)]
pub struct ConnectorOptionsBuilder {
    uri: Option<String>,
    settings: Option<ConnectionSettings>,
    naming_policy: Option<NamingPolicy>,
    model_dir_path: Option<PathBuf>,
    collision_policy: Option<CollisionPolicy>,
    logging: Option<LoggingConfig>,
    models: Vec<ModelDefinition>,
    behaviors: Option<BehaviorRegistry>,
}

impl ConnectorOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置数据库连接 URI
    pub fn uri<S: Into<String>>(mut self, uri: S) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// 设置驱动连接设置
    pub fn settings(mut self, settings: ConnectionSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn naming_policy(mut self, policy: NamingPolicy) -> Self {
        self.naming_policy = Some(policy);
        self
    }

    /// 开启时以别名编译模型、以名称作为集合名
    pub fn use_name_and_alias(self, enabled: bool) -> Self {
        self.naming_policy(if enabled {
            NamingPolicy::NameAndAlias
        } else {
            NamingPolicy::Plain
        })
    }

    /// 设置模型目录，目录下的 `.toml` / `.json` 清单会被递归加载
    pub fn model_dir_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.model_dir_path = Some(path.into());
        self
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = Some(policy);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// 追加一个显式模型定义
    pub fn model(mut self, definition: ModelDefinition) -> Self {
        self.models.push(definition);
        self
    }

    /// 追加多个显式模型定义
    pub fn models<I: IntoIterator<Item = ModelDefinition>>(mut self, definitions: I) -> Self {
        self.models.extend(definitions);
        self
    }

    /// 设置模型清单引用的行为注册表
    pub fn behaviors(mut self, behaviors: BehaviorRegistry) -> Self {
        self.behaviors = Some(behaviors);
        self
    }

    /// 构建连接器选项
    ///
    /// # 错误
    ///
    /// 未设置 URI 或 URI 为空时返回配置错误
    pub fn build(self) -> ConnectorResult<ConnectorOptions> {
        let uri = self
            .uri
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| crate::connector_error!(config, "数据库连接URI必须设置"))?;

        let config = ConnectorConfig {
            uri,
            settings: self.settings.unwrap_or_default(),
            naming_policy: self.naming_policy.unwrap_or_default(),
            model_dir_path: self.model_dir_path,
            collision_policy: self.collision_policy.unwrap_or_default(),
            logging: self.logging,
        };

        info!(
            "创建连接器选项: uri={}, 命名策略={:?}, 显式模型={}",
            redact_uri(&config.uri),
            config.naming_policy,
            self.models.len()
        );

        Ok(ConnectorOptions {
            config,
            models: self.models,
            behaviors: self.behaviors.unwrap_or_default(),
        })
    }
}
