//! 宿主框架接口
//!
//! 插件通过 [`PluginHost`] 发布装饰对象并注册关闭回调。
//! [`App`] 是一个最小的宿主实现，可直接用于服务或测试

pub mod lifecycle;

pub use lifecycle::{ConnectionCloseHook, OnClose};

use crate::error::ConnectorResult;
use parking_lot::{Mutex, RwLock};
use rat_logger::{debug, error, info};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 宿主框架能力
pub trait PluginHost {
    /// 以指定名称发布共享对象
    fn decorate(&mut self, name: &str, value: Arc<dyn Any + Send + Sync>) -> ConnectorResult<()>;

    /// 注册宿主关闭时运行的回调
    fn on_close(&mut self, hook: Arc<dyn OnClose>);
}

/// 最小宿主实现
#[derive(Default)]
pub struct App {
    decorations: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    close_hooks: Mutex<Vec<Arc<dyn OnClose>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("decorations", &self.decorations.read().keys().collect::<Vec<_>>())
            .field("close_hooks", &self.close_hooks.lock().len())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已发布指定名称
    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorations.read().contains_key(name)
    }

    /// 按类型取已发布对象
    pub fn decoration<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let value = self.decorations.read().get(name).cloned()?;
        value.downcast::<T>().ok()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 按注册顺序运行关闭回调，每个回调只运行一次
    ///
    /// 某个回调失败不影响其余回调，返回第一个错误
    pub async fn close(&self) -> ConnectorResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("宿主已关闭，跳过");
            return Ok(());
        }

        let hooks = std::mem::take(&mut *self.close_hooks.lock());
        let mut first_error = None;
        for hook in hooks {
            if let Err(e) = hook.on_close().await {
                error!("关闭回调 {} 失败: {}", hook.name(), e);
                first_error.get_or_insert(e);
            }
        }

        info!("宿主已关闭");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl PluginHost for App {
    fn decorate(&mut self, name: &str, value: Arc<dyn Any + Send + Sync>) -> ConnectorResult<()> {
        let mut decorations = self.decorations.write();
        if decorations.contains_key(name) {
            return Err(crate::connector_error!(
                config,
                format!("宿主已存在名为 '{}' 的装饰", name)
            ));
        }
        decorations.insert(name.to_string(), value);
        debug!("宿主发布装饰 {}", name);
        Ok(())
    }

    fn on_close(&mut self, hook: Arc<dyn OnClose>) {
        debug!("注册关闭回调 {}", hook.name());
        self.close_hooks.lock().push(hook);
    }
}
