//! 装饰对象
//!
//! 字符串键到 {连接, 已编译模型} 的显式映射。注册期间由注册器写入，关闭时移除模型

use super::registrar::INSTANCE_KEY;
use crate::error::ConnectorResult;
use crate::model::CompiledModel;
use crate::store::Connection;
use parking_lot::RwLock;
use rat_logger::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 装饰对象中的条目
#[derive(Debug, Clone)]
pub enum Decoration {
    /// 数据库连接句柄（键 `instance`）
    Instance(Connection),
    /// 已编译模型
    Model(Arc<CompiledModel>),
}

impl Decoration {
    pub fn as_model(&self) -> Option<&Arc<CompiledModel>> {
        match self {
            Decoration::Model(model) => Some(model),
            Decoration::Instance(_) => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Connection> {
        match self {
            Decoration::Instance(conn) => Some(conn),
            Decoration::Model(_) => None,
        }
    }
}

struct DecorationTable {
    connection: Connection,
    entries: RwLock<BTreeMap<String, Decoration>>,
}

/// 装饰对象句柄
#[derive(Clone)]
pub struct Decorations {
    inner: Arc<DecorationTable>,
}

impl std::fmt::Debug for Decorations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decorations")
            .field("connection", &self.inner.connection)
            .field("keys", &self.keys())
            .finish()
    }
}

impl Decorations {
    pub(crate) fn new(connection: Connection) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(INSTANCE_KEY.to_string(), Decoration::Instance(connection.clone()));
        Self {
            inner: Arc::new(DecorationTable {
                connection,
                entries: RwLock::new(entries),
            }),
        }
    }

    /// 写入模型，返回被覆盖的旧条目
    pub(crate) fn insert_model(&self, key: &str, model: Arc<CompiledModel>) -> Option<Decoration> {
        debug!("装饰对象写入 {} -> {}", key, model.model_name());
        self.inner
            .entries
            .write()
            .insert(key.to_string(), Decoration::Model(model))
    }

    pub fn get(&self, key: &str) -> Option<Decoration> {
        self.inner.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.entries.read().contains_key(key)
    }

    /// 按键取已编译模型
    pub fn model(&self, key: &str) -> ConnectorResult<Arc<CompiledModel>> {
        self.get(key)
            .and_then(|d| d.as_model().cloned())
            .ok_or_else(|| crate::connector_error!(model_not_found, key))
    }

    /// 数据库连接句柄
    pub fn instance(&self) -> Connection {
        self.inner.connection.clone()
    }

    /// 全部键（有序）
    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.read().keys().cloned().collect()
    }

    /// 全部模型
    pub fn models(&self) -> Vec<(String, Arc<CompiledModel>)> {
        self.inner
            .entries
            .read()
            .iter()
            .filter_map(|(k, d)| d.as_model().map(|m| (k.clone(), Arc::clone(m))))
            .collect()
    }

    /// 条目数量（含 `instance`）
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 关闭数据库连接并移除全部模型
    ///
    /// 模型的存在性验证器持有装饰对象，移除模型后引用环断开
    pub async fn close(&self) -> ConnectorResult<()> {
        let result = self.inner.connection.close().await;
        self.clear_models();
        result
    }

    /// 移除全部模型，只保留 `instance`
    pub(crate) fn clear_models(&self) -> usize {
        let mut entries = self.inner.entries.write();
        let before = entries.len();
        entries.retain(|_, d| d.as_instance().is_some());
        let removed = before - entries.len();
        if removed > 0 {
            debug!("装饰对象移除了 {} 个模型", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;
    use crate::schema::{Schema, SchemaDescription, SchemaOptions};
    use crate::store::MemoryStore;

    fn connection() -> Connection {
        Connection::from_store("memory://test", Arc::new(MemoryStore::new("test")))
    }

    fn model(name: &str, conn: &Connection) -> Arc<CompiledModel> {
        let schema = Schema::from_description(&SchemaDescription::new(), SchemaOptions::default()).unwrap();
        Arc::new(CompiledModel::new(name, name, schema, conn.clone()))
    }

    #[test]
    fn test_instance_and_models() {
        let conn = connection();
        let decorations = Decorations::new(conn.clone());
        assert!(decorations.get(INSTANCE_KEY).unwrap().as_instance().is_some());
        assert!(decorations.model(INSTANCE_KEY).is_err());

        assert!(decorations.insert_model("Post", model("posts", &conn)).is_none());
        let previous = decorations.insert_model("Post", model("posts_v2", &conn));
        assert_eq!(previous.unwrap().as_model().unwrap().model_name(), "posts");
        assert_eq!(decorations.model("Post").unwrap().model_name(), "posts_v2");
        assert_eq!(decorations.keys(), vec!["Post".to_string(), INSTANCE_KEY.to_string()]);
        assert_eq!(decorations.models().len(), 1);
        assert!(matches!(
            decorations.model("Account"),
            Err(ConnectorError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn test_lookup_resolves_later_insertions() {
        let conn = connection();
        let decorations = Decorations::new(conn.clone());
        let held = decorations.clone();
        assert!(held.model("Account").is_err());

        decorations.insert_model("Account", model("accounts", &conn));
        drop(decorations);
        assert_eq!(held.model("Account").unwrap().collection_name(), "accounts");
    }

    #[tokio::test]
    async fn test_close_clears_models_and_keeps_instance() {
        let conn = connection();
        let decorations = Decorations::new(conn.clone());
        decorations.insert_model("Account", model("accounts", &conn));

        decorations.close().await.unwrap();
        assert!(conn.is_closed());
        assert_eq!(decorations.keys(), vec![INSTANCE_KEY.to_string()]);
        assert!(decorations.model("Account").is_err());

        decorations.close().await.unwrap();
    }
}
