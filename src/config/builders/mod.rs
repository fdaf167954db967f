//! # 配置构建器模块
//!
//! 提供所有配置类型的构建器实现，支持链式调用和严格验证

pub mod connector_builder;
pub mod logging_builder;

pub use connector_builder::ConnectorOptionsBuilder;
pub use logging_builder::LoggingConfigBuilder;
