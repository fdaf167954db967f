//! # 配置管理模块
//!
//! 连接器配置、驱动设置与日志配置，支持构建器与配置文件两种方式

pub mod builders;
pub mod core;

pub use builders::{ConnectorOptionsBuilder, LoggingConfigBuilder};
pub use core::{
    CollisionPolicy, ConnectionSettings, ConnectorConfig, LogLevel, LoggingConfig, NamingPolicy,
    init_logging,
};
