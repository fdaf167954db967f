//! rat_mongo_connector - 文档数据库连接器插件
//!
//! 在宿主框架启动时建立数据库连接，按模式描述编译模型，
//! 并以装饰对象的形式把连接与模型发布给宿主。
//! 支持引用字段的存在性校验、模型目录加载、类与虚拟字段、生命周期钩子，
//! 宿主关闭时自动断开连接

// 导出所有公共模块
pub mod config;
pub mod connector;
pub mod error;
pub mod host;
pub mod i18n;
pub mod model;
pub mod schema;
pub mod store;
pub mod types;

// 重新导出常用类型和函数
pub use config::{
    CollisionPolicy, ConnectionSettings, ConnectorConfig, ConnectorOptionsBuilder, LogLevel,
    LoggingConfig, LoggingConfigBuilder, NamingPolicy, init_logging,
};
pub use connector::{
    BehaviorRegistry, DECORATOR_NAME, Decoration, Decorations, INSTANCE_KEY, ConnectorOptions,
    ModelManifest, connect, load_models, register,
};
pub use error::{ConnectorError, ConnectorResult};
pub use host::{App, ConnectionCloseHook, OnClose, PluginHost};
pub use model::{CompiledModel, ModelClass, ModelDefinition, Record, SimpleClass, ToObjectOptions};
pub use schema::{
    FieldEntry, FieldSpec, HookEvent, HookSlot, PostHook, PreHook, Schema, SchemaDescription,
    SchemaOptions, TypeMarker,
};
pub use store::{Connection, DocumentStore, MemoryStore, StoreKind};
pub use types::{DataValue, Document, ObjectId};

// 条件编译调试宏 - 只有在 debug 模式下才输出调试信息
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        rat_logger::debug!($($arg)*);
    };
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

/// 初始化连接器库
///
/// 注册多语言错误消息。日志系统由调用者自行初始化，参见 [`init_logging`]
pub fn init() {
    i18n::ErrorMessageI18n::init();
}

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 获取库信息
pub fn get_info() -> String {
    format!("{} v{}", NAME, VERSION)
}
