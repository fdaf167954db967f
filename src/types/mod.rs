//! 通用数据类型
//!
//! 定义文档值、文档标识符等跨模块共享的类型

pub mod data_value;
pub mod object_id;

// 重新导出所有公共类型以保持API兼容性
pub use data_value::{DataValue, Document, json_to_document, json_value_to_data_value};
pub use object_id::ObjectId;
