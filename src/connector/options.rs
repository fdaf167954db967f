//! 连接器选项

use super::loader::BehaviorRegistry;
use crate::config::{ConnectorConfig, ConnectorOptionsBuilder};
use crate::model::ModelDefinition;

/// 注册连接器所需的全部输入
#[derive(Debug, Clone)]
pub struct ConnectorOptions {
    /// 连接与注册配置
    pub config: ConnectorConfig,
    /// 显式提供的模型定义
    pub models: Vec<ModelDefinition>,
    /// 模型清单引用的行为
    pub behaviors: BehaviorRegistry,
}

impl ConnectorOptions {
    /// 创建选项构建器
    pub fn builder() -> ConnectorOptionsBuilder {
        ConnectorOptionsBuilder::new()
    }

    /// 从配置创建，不含显式模型
    pub fn from_config(config: ConnectorConfig) -> Self {
        Self {
            config,
            models: Vec::new(),
            behaviors: BehaviorRegistry::default(),
        }
    }

    pub fn with_models(mut self, models: Vec<ModelDefinition>) -> Self {
        self.models = models;
        self
    }

    pub fn with_behaviors(mut self, behaviors: BehaviorRegistry) -> Self {
        self.behaviors = behaviors;
        self
    }
}
