//! 错误处理模块
//!
//! 定义连接器的统一错误类型，所有公开操作都返回 [`ConnectorResult`]

use thiserror::Error;

/// 连接器统一结果类型
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// 连接器错误类型
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// 数据库连接失败（致命，注册中止）
    #[error("数据库连接失败: {message}")]
    ConnectionError { message: String },

    /// 配置错误（例如严格命名策略下缺少别名）
    #[error("配置错误: {message}")]
    ConfigError { message: String },

    /// 文档字段验证失败
    #[error("模型验证失败: {field} - {message}")]
    ValidationError { field: String, message: String },

    /// 模式描述无法转换为原生模式
    #[error("模式构建失败: {field} - {message}")]
    SchemaError { field: String, message: String },

    /// 生命周期钩子执行失败
    #[error("钩子执行失败: {event} - {message}")]
    HookError { event: String, message: String },

    /// 存储层查询或写入失败
    #[error("查询执行失败: {message}")]
    QueryError { message: String },

    /// 序列化失败
    #[error("数据序列化失败: {message}")]
    SerializationError { message: String },

    /// 装饰对象中不存在该模型
    #[error("模型 '{name}' 未注册")]
    ModelNotFound { name: String },

    /// 不支持的存储类型
    #[error("不支持的存储类型: {scheme}")]
    UnsupportedStore { scheme: String },

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ConnectorError {
    /// 是否为字段级验证错误
    pub fn is_validation(&self) -> bool {
        matches!(self, ConnectorError::ValidationError { .. })
    }

    /// 出错字段名（仅验证和模式错误）
    pub fn field(&self) -> Option<&str> {
        match self {
            ConnectorError::ValidationError { field, .. }
            | ConnectorError::SchemaError { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(e: serde_json::Error) -> Self {
        ConnectorError::SerializationError {
            message: e.to_string(),
        }
    }
}

/// 快速构建常用错误
///
/// ```ignore
/// connector_error!(config, "缺少别名");
/// connector_error!(validation, "email", "格式不正确");
/// ```
#[macro_export]
macro_rules! connector_error {
    (connection, $msg:expr) => {
        $crate::error::ConnectorError::ConnectionError { message: $msg.to_string() }
    };
    (config, $msg:expr) => {
        $crate::error::ConnectorError::ConfigError { message: $msg.to_string() }
    };
    (query, $msg:expr) => {
        $crate::error::ConnectorError::QueryError { message: $msg.to_string() }
    };
    (serialization, $msg:expr) => {
        $crate::error::ConnectorError::SerializationError { message: $msg.to_string() }
    };
    (validation, $field:expr, $msg:expr) => {
        $crate::error::ConnectorError::ValidationError {
            field: $field.to_string(),
            message: $msg.to_string(),
        }
    };
    (schema, $field:expr, $msg:expr) => {
        $crate::error::ConnectorError::SchemaError {
            field: $field.to_string(),
            message: $msg.to_string(),
        }
    };
    (hook, $event:expr, $msg:expr) => {
        $crate::error::ConnectorError::HookError {
            event: $event.to_string(),
            message: $msg.to_string(),
        }
    };
    (model_not_found, $name:expr) => {
        $crate::error::ConnectorError::ModelNotFound { name: $name.to_string() }
    };
    (unsupported_store, $scheme:expr) => {
        $crate::error::ConnectorError::UnsupportedStore { scheme: $scheme.to_string() }
    };
}
