//! 模型类
//!
//! 以组合方式为文档附加计算属性和实例方法

use crate::error::ConnectorResult;
use crate::schema::{InstanceMethod, VirtualGetter};
use crate::types::{DataValue, Document};
use std::sync::Arc;

/// 模型类
///
/// 取值器在装载时成为模式的虚拟字段，方法通过 [`Record::call`](super::Record::call) 调用
pub trait ModelClass: Send + Sync {
    /// 类名，用于日志和调试
    fn name(&self) -> &str;

    /// 计算属性
    fn getters(&self) -> Vec<(String, VirtualGetter)>;

    /// 实例方法
    fn methods(&self) -> Vec<(String, InstanceMethod)> {
        Vec::new()
    }
}

/// 由闭包组装的模型类
#[derive(Clone)]
pub struct SimpleClass {
    name: String,
    getters: Vec<(String, VirtualGetter)>,
    methods: Vec<(String, InstanceMethod)>,
}

impl SimpleClass {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            getters: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// 添加计算属性
    pub fn getter<F>(mut self, name: &str, getter: F) -> Self
    where
        F: Fn(&Document) -> DataValue + Send + Sync + 'static,
    {
        self.getters.push((name.to_string(), Arc::new(getter)));
        self
    }

    /// 添加实例方法
    pub fn method<F>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&Document, &[DataValue]) -> ConnectorResult<DataValue> + Send + Sync + 'static,
    {
        self.methods.push((name.to_string(), Arc::new(method)));
        self
    }
}

impl ModelClass for SimpleClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn getters(&self) -> Vec<(String, VirtualGetter)> {
        self.getters.clone()
    }

    fn methods(&self) -> Vec<(String, InstanceMethod)> {
        self.methods.clone()
    }
}

impl std::fmt::Debug for SimpleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleClass")
            .field("name", &self.name)
            .field("getters", &self.getters.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("methods", &self.methods.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}
