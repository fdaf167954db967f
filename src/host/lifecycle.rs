//! 生命周期钩子
//!
//! 宿主关闭时运行的回调

use crate::error::ConnectorResult;
use crate::connector::Decorations;
use async_trait::async_trait;
use rat_logger::info;

/// 宿主关闭回调
#[async_trait]
pub trait OnClose: Send + Sync {
    /// 回调名，用于日志
    fn name(&self) -> &str;

    /// 宿主关闭时调用，返回前必须完成清理
    async fn on_close(&self) -> ConnectorResult<()>;
}

/// 关闭数据库连接并释放已注册模型的回调
pub struct ConnectionCloseHook {
    decorations: Decorations,
}

impl ConnectionCloseHook {
    pub fn new(decorations: Decorations) -> Self {
        Self { decorations }
    }
}

#[async_trait]
impl OnClose for ConnectionCloseHook {
    fn name(&self) -> &str {
        "mongo-connection-close"
    }

    async fn on_close(&self) -> ConnectorResult<()> {
        info!("宿主关闭，断开数据库连接: {}", self.decorations.instance().uri());
        // 重复关闭为空操作
        self.decorations.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionSettings;
    use crate::store::Connection;

    #[tokio::test]
    async fn test_close_hook_is_idempotent() {
        let connection = Connection::open("memory://test", &ConnectionSettings::default())
            .await
            .unwrap();
        let decorations = Decorations::new(connection.clone());
        let hook = ConnectionCloseHook::new(decorations.clone());
        hook.on_close().await.unwrap();
        assert!(connection.is_closed());
        assert_eq!(decorations.len(), 1);
        hook.on_close().await.unwrap();
    }
}
