//! 模式模块
//!
//! 简化描述、引用规范化、原生模式以及生命周期钩子

pub mod description;
pub mod hooks;
pub mod native;
pub mod normalize;
pub mod validators;

pub use description::{FieldEntry, FieldSpec, SchemaDescription, TypeMarker};
pub use hooks::{HookEvent, HookSet, HookSlot, PostHook, PreHook, attach_hooks};
pub use native::{
    InstanceMethod, PathKind, Schema, SchemaOptions, SchemaPath, VirtualGetter, Virtualizer,
};
pub use normalize::normalize_references;
pub use validators::{CustomValidator, ExistenceValidator, FieldValidator, ValueValidator};
