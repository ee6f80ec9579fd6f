// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_message::QueueMessage;
use crate::infrastructure::metrics::LEASE_EXTENSIONS_TOTAL;
use crate::queue::message_queue::MessageQueue;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 可见性心跳
///
/// 处理器运行期间在后台周期性续约消息租约。
/// 续约失败只记录日志：错过一次续约最多导致重复投递，而处理器可以安全重跑
pub struct VisibilityHeartbeat {
    stop: CancellationToken,
    handle: Option<JoinHandle<u32>>,
}

impl VisibilityHeartbeat {
    /// 启动心跳任务
    ///
    /// 每等待 `interval` 仍未收到停止信号，就把租约延长到 `extend_timeout`
    pub fn start(
        queue: Arc<dyn MessageQueue>,
        message: QueueMessage,
        interval: Duration,
        extend_timeout: Duration,
    ) -> Self {
        let stop = CancellationToken::new();
        let token = stop.clone();

        let handle = tokio::spawn(async move {
            let mut renewals = 0u32;
            loop {
                if tokio::time::timeout(interval, token.cancelled()).await.is_ok() {
                    break;
                }
                match queue.extend_lease(&message, extend_timeout).await {
                    Ok(()) => {
                        renewals += 1;
                        counter!(LEASE_EXTENSIONS_TOTAL, "outcome" => "ok").increment(1);
                        debug!(
                            message_id = %message.message_id,
                            "Extended visibility by {:?}", extend_timeout
                        );
                    }
                    Err(e) => {
                        counter!(LEASE_EXTENSIONS_TOTAL, "outcome" => "error").increment(1);
                        warn!(
                            message_id = %message.message_id,
                            "Failed to extend visibility: {}", e
                        );
                    }
                }
            }
            renewals
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// 停止心跳并等待任务退出，返回成功续约次数
    ///
    /// 停止时不做最后一次续约
    pub async fn stop(mut self) -> u32 {
        self.stop.cancel();
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                warn!("Heartbeat task ended abnormally: {}", e);
                0
            }),
            None => 0,
        }
    }
}

impl Drop for VisibilityHeartbeat {
    fn drop(&mut self) {
        // a dropped guard must not keep the lease alive forever
        self.stop.cancel();
    }
}
