//! 连接器模块
//!
//! 建立数据库连接、加载并编译模型，以装饰对象的形式发布给宿主

pub mod decorations;
pub mod loader;
pub mod options;
pub mod registrar;

pub use decorations::{Decoration, Decorations};
pub use loader::{BehaviorRegistry, ModelManifest, load_manifest, load_models, merge_definitions};
pub use options::ConnectorOptions;
pub use registrar::{
    DECORATOR_NAME, INSTANCE_KEY, ModelNames, compile_model, connect, register, resolve_names,
};
