use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// 优雅关闭管理器
#[derive(Clone)]
pub struct ShutdownManager {
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,
    is_shutdown: Arc<RwLock<bool>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            shutdown_tx: Arc::new(RwLock::new(Some(shutdown_tx))),
            is_shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// 订阅关闭信号
    pub async fn subscribe(&self) -> broadcast::Receiver<()> {
        let shutdown_tx = self.shutdown_tx.read().await;
        if let Some(ref tx) = *shutdown_tx {
            tx.subscribe()
        } else {
            // 已经关闭时返回立即触发的接收器
            let (tx, rx) = broadcast::channel(1);
            let _ = tx.send(());
            rx
        }
    }

    /// 触发关闭，重复调用无效果
    pub async fn shutdown(&self) {
        let mut is_shutdown = self.is_shutdown.write().await;
        if *is_shutdown {
            debug!("关闭管理器已经触发过关闭");
            return;
        }

        info!("触发系统关闭");
        *is_shutdown = true;

        let mut shutdown_tx = self.shutdown_tx.write().await;
        if let Some(tx) = shutdown_tx.take() {
            debug!("发送关闭信号给 {} 个订阅者", tx.receiver_count());
            let _ = tx.send(());
        }

        info!("关闭信号已发送");
    }

    pub async fn is_shutdown(&self) -> bool {
        *self.is_shutdown.read().await
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_notifies_subscribers() {
        let manager = ShutdownManager::new();
        let mut rx1 = manager.subscribe().await;
        let mut rx2 = manager.clone().subscribe().await;

        assert!(!manager.is_shutdown().await);
        manager.shutdown().await;
        assert!(manager.is_shutdown().await);

        tokio::time::timeout(Duration::from_secs(1), rx1.recv())
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), rx2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_after_shutdown_fires_immediately() {
        let manager = ShutdownManager::new();
        manager.shutdown().await;
        manager.shutdown().await;

        let mut rx = manager.subscribe().await;
        tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
    }
}
