//! # 配置管理模块 - 核心配置类型
//!
//! 连接器配置可由构建器创建，也可从 TOML / JSON 文件加载

use crate::error::{ConnectorError, ConnectorResult};
use rat_logger::{LevelFilter, LoggerBuilder, handler::term::TermConfig, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

/// 模型命名策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// 以名称编译和持久化，键为别名或首字母大写的名称
    #[default]
    Plain,
    /// 以别名编译并作为键，以名称作为集合名；每个模型必须提供别名
    NameAndAlias,
}

/// 模型名冲突策略（目录模型与显式模型同名时）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// 后注册的覆盖先注册的
    #[default]
    LastWriteWins,
    /// 发现重名即报错
    Reject,
}

/// 传递给驱动的连接设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// 数据库名，未设置时使用 URI 中的默认库
    #[serde(default)]
    pub database: Option<String>,
    /// 应用名
    #[serde(default)]
    pub app_name: Option<String>,
    /// 连接池最大连接数
    #[serde(default)]
    pub max_pool_size: Option<u32>,
    /// 连接池最小连接数
    #[serde(default)]
    pub min_pool_size: Option<u32>,
    /// 连接超时（毫秒）
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// 服务器选择超时（毫秒）
    #[serde(default)]
    pub server_selection_timeout_ms: Option<u64>,
    /// 直接连接
    #[serde(default)]
    pub direct_connection: Option<bool>,
    /// 注册模型时为 unique / index 字段建立索引
    #[serde(default = "default_true")]
    pub auto_index: bool,
    /// 其余驱动选项，原样追加到 URI 查询参数
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            database: None,
            app_name: None,
            max_pool_size: None,
            min_pool_size: None,
            connect_timeout_ms: None,
            server_selection_timeout_ms: None,
            direct_connection: None,
            auto_index: true,
            options: BTreeMap::new(),
        }
    }
}

impl ConnectionSettings {
    /// 将设置作为查询参数合并到连接 URI
    pub fn apply_to_uri(&self, uri: &str) -> String {
        let mut params = Vec::new();

        if let Some(app_name) = &self.app_name {
            params.push(format!("appName={}", urlencoding::encode(app_name)));
        }
        if let Some(max) = self.max_pool_size {
            params.push(format!("maxPoolSize={}", max));
        }
        if let Some(min) = self.min_pool_size {
            params.push(format!("minPoolSize={}", min));
        }
        if let Some(ms) = self.connect_timeout_ms {
            params.push(format!("connectTimeoutMS={}", ms));
        }
        if let Some(ms) = self.server_selection_timeout_ms {
            params.push(format!("serverSelectionTimeoutMS={}", ms));
        }
        if let Some(direct) = self.direct_connection {
            params.push(format!("directConnection={}", direct));
        }
        for (key, value) in &self.options {
            params.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            ));
        }

        if params.is_empty() {
            return uri.to_string();
        }

        let mut out = uri.to_string();
        if out.contains('?') {
            if !out.ends_with('?') && !out.ends_with('&') {
                out.push('&');
            }
        } else {
            // mongodb://host 没有路径时需要补 `/` 才能追加查询参数
            let has_path = out
                .split_once("://")
                .is_some_and(|(_, rest)| rest.contains('/'));
            if !has_path {
                out.push('/');
            }
            out.push('?');
        }
        out.push_str(&params.join("&"));
        out
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,
    /// 是否输出到终端
    pub console: bool,
}

/// 按日志配置初始化 rat_logger
///
/// 连接器本身从不初始化日志，由调用方决定是否调用
pub fn init_logging(config: &LoggingConfig) -> ConnectorResult<()> {
    let mut builder = LoggerBuilder::new().with_level(config.level.into());
    if config.console {
        builder = builder.add_terminal_with_config(TermConfig::default());
    }
    builder
        .init()
        .map_err(|e| crate::connector_error!(config, format!("初始化日志系统失败: {}", e)))?;
    Ok(())
}

/// 连接器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// 数据库连接 URI
    pub uri: String,
    /// 驱动设置
    #[serde(default)]
    pub settings: ConnectionSettings,
    /// 模型命名策略
    #[serde(default)]
    pub naming_policy: NamingPolicy,
    /// 模型目录
    #[serde(default)]
    pub model_dir_path: Option<PathBuf>,
    /// 模型名冲突策略
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    /// 日志配置
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl ConnectorConfig {
    /// 从配置文件加载配置，`.toml` 按 TOML 解析，其余按 JSON 解析
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> ConnectorResult<Self> {
        let path = config_path.as_ref();
        let content = std::fs::read_to_string(path).map_err(ConnectorError::IoError)?;

        let config: ConnectorConfig = if is_toml(path) {
            toml::from_str(&content)
                .map_err(|e| crate::connector_error!(config, format!("解析TOML配置文件失败: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| crate::connector_error!(config, format!("解析JSON配置文件失败: {}", e)))?
        };

        info!("从文件加载配置: {:?}", path);
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, config_path: P) -> ConnectorResult<()> {
        let path = config_path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)
                .map_err(|e| crate::connector_error!(config, format!("序列化TOML配置失败: {}", e)))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| crate::connector_error!(config, format!("序列化JSON配置失败: {}", e)))?
        };

        std::fs::write(path, content).map_err(ConnectorError::IoError)?;
        info!("保存配置到文件: {:?}", path);
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("toml")
}
